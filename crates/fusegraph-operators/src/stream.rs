//! Host stream for the reference backend.

use fusegraph_core::{Engine, EngineKind, Result, Stream};

/// Sequential in-order stream on a CPU engine.
///
/// Reference kernels finish their work before `execute` returns, so `wait`
/// has nothing to synchronize.
#[derive(Debug, Clone, Copy)]
pub struct HostStream {
    engine: Engine,
}

impl HostStream {
    /// Stream on the first CPU engine.
    pub fn new() -> Self {
        Self::with_index(0)
    }

    /// Stream on the CPU engine with the given index.
    pub fn with_index(index: usize) -> Self {
        Self {
            engine: Engine::new(EngineKind::Cpu, index),
        }
    }
}

impl Default for HostStream {
    fn default() -> Self {
        Self::new()
    }
}

impl Stream for HostStream {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn wait(&self) -> Result<()> {
        Ok(())
    }
}
