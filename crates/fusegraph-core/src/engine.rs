//! Engines and the stream contract.
//!
//! The core never creates streams. A stream is handed in by the caller and
//! passed through untouched to the kernel that runs on it.

use crate::Result;
use std::fmt;

/// Family of devices a partition targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    /// Not tied to a device family.
    Any,
    Cpu,
    Gpu,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineKind::Any => "any",
            EngineKind::Cpu => "cpu",
            EngineKind::Gpu => "gpu",
        };
        f.write_str(name)
    }
}

/// A concrete device a partition is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Engine {
    /// Device family.
    pub kind: EngineKind,

    /// Device index within the family.
    pub index: usize,
}

impl Engine {
    /// Create an engine.
    pub fn new(kind: EngineKind, index: usize) -> Self {
        Self { kind, index }
    }

    /// The first host engine.
    pub fn cpu() -> Self {
        Self::new(EngineKind::Cpu, 0)
    }
}

/// Execution context a kernel runs on.
///
/// A stream may be a sequential host queue or an asynchronous device queue.
/// Kernels may return before their work completes; callers must `wait()`
/// before reading output buffers.
pub trait Stream: Send + Sync {
    /// The engine this stream submits work to.
    fn engine(&self) -> Engine;

    /// Block until all work submitted to this stream has completed.
    fn wait(&self) -> Result<()>;
}
