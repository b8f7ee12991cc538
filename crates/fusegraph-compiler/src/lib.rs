//! Partition compiler and dispatcher for fusegraph.
//!
//! This crate turns a `Partition` (a fused group of nodes bound to one
//! backend) into a `CompiledPartition` and runs it:
//! 1. **Matching** - pick one caller candidate per required operand id
//! 2. **Layout inference** - give `any` outputs a backend layout, verify the rest
//! 3. **Kernel selection** - ask the bound backend for one kernel
//! 4. **Dispatch** - bind runtime tensors by id and invoke the kernel
//!
//! # Example
//!
//! ```ignore
//! use fusegraph_compiler::Partition;
//! use fusegraph_core::{BackendRegistry, DataType, Engine, EngineKind, LogicalTensor, Node, OpKind};
//!
//! let registry = BackendRegistry::new();
//! fusegraph_operators::register_reference_backend(&registry);
//!
//! let src = LogicalTensor::new(1, &[1, 1, 3, 3], DataType::F32);
//! let dst = LogicalTensor::any(2, &[1, 1, 3, 3], DataType::F32);
//! let mut relu = Node::new(OpKind::ReLU).with_backend("ref");
//! relu.add_inputs(&[src.clone()]).add_outputs(&[dst.clone()]);
//!
//! let partition = Partition::init(vec![relu], EngineKind::Cpu, &registry)?;
//! let compiled = partition.compile(&[&src], &[&dst], &Engine::cpu())?;
//! assert_eq!(compiled.query_logical_tensor(dst.id)?.size_bytes(), Some(36));
//! ```

pub mod compiled;
mod layout;
mod matching;
pub mod partition;
mod scheduler;

#[cfg(test)]
mod testing;

pub use compiled::CompiledPartition;
pub use partition::{Partition, PartitionId};

use fusegraph_core::{Engine, EngineKind, Error, LogicalTensor, ResolvedOperands, Result};
use matching::Side;
use std::sync::Arc;

/// Options controlling compilation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Reject engines whose kind differs from the partition's engine kind.
    pub check_engine_kind: bool,

    /// Ask the backend to verify caller-fixed strided layouts at compile time.
    ///
    /// When disabled, unsupported strides surface from kernel creation instead.
    pub verify_strided_layouts: bool,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_engine_kind(mut self, enabled: bool) -> Self {
        self.check_engine_kind = enabled;
        self
    }

    pub fn verify_strided_layouts(mut self, enabled: bool) -> Self {
        self.verify_strided_layouts = enabled;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            check_engine_kind: true,
            verify_strided_layouts: true,
        }
    }
}

/// Compiles partitions against an engine and a pool of candidate descriptors.
///
/// Compilation is pure: neither the partition nor the candidates are modified,
/// and on failure nothing is produced.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    /// Create a compiler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compiler with custom options.
    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile `partition` for `engine`.
    ///
    /// # Errors
    ///
    /// - `MissingOperand` if a required id has no candidate, or the backend
    ///   refuses an aliased input
    /// - `InvalidArgument` for malformed candidates, unusable input layouts or
    ///   an engine of the wrong kind
    /// - `Unimplemented` if the backend has no kernel for the partition
    #[tracing::instrument(
        skip_all,
        fields(partition = %partition.id(), backend = partition.backend_name(), engine = ?engine)
    )]
    pub fn compile(
        &self,
        partition: &Arc<Partition>,
        inputs: &[&LogicalTensor],
        outputs: &[&LogicalTensor],
        engine: &Engine,
    ) -> Result<CompiledPartition> {
        self.check_engine(partition, engine)?;

        let backend = partition.backend();
        if !backend.supports_engine(engine.kind) {
            return Err(Error::Unimplemented(format!(
                "Backend '{}' has no kernels for {} engines",
                backend.name(),
                engine.kind
            )));
        }

        let matched_inputs = matching::match_operands(partition, Side::Input, inputs)?;
        let matched_outputs = matching::match_operands(partition, Side::Output, outputs)?;

        let resolved = ResolvedOperands::new(
            layout::finalize(backend.as_ref(), Side::Input, matched_inputs, &self.options)?,
            layout::finalize(backend.as_ref(), Side::Output, matched_outputs, &self.options)?,
        );

        let kernel = backend.produce_kernel(partition.nodes(), &resolved, engine)?;
        tracing::debug!(kernel = kernel.name(), "kernel produced");

        Ok(CompiledPartition::new(
            Arc::clone(partition),
            kernel,
            resolved,
            *engine,
        ))
    }

    fn check_engine(&self, partition: &Partition, engine: &Engine) -> Result<()> {
        let expected = partition.engine_kind();
        if self.options.check_engine_kind && expected != EngineKind::Any && engine.kind != expected
        {
            return Err(Error::InvalidArgument(format!(
                "{} targets {expected} engines, got {}",
                partition.id(),
                engine.kind
            )));
        }
        Ok(())
    }
}
