//! The reference host backend.

use fusegraph_core::{
    Backend, Engine, EngineKind, Error, Kernel, KernelCtx, KernelRegistry, Layout, LogicalTensor,
    Node, OpaqueLayout, ResolvedOperands, Result, TensorId,
};
use std::collections::HashMap;

use crate::config::ReferenceBackendConfig;
use crate::fused::{BufferRef, FusedKernel, Step};
use crate::registry::reference_kernel_registry;

/// Name the reference backend registers under.
pub const REFERENCE_BACKEND: &str = "ref";

/// Opaque layout id: dense row-major data followed by padding.
pub const PADDED_DENSE_LAYOUT: u64 = 1;

/// Portable host backend whose kernels are plain Rust loops.
///
/// Opaque layouts assigned by this backend hold dense row-major data,
/// rounded up to `ReferenceBackendConfig::opaque_alignment` bytes.
pub struct ReferenceBackend {
    config: ReferenceBackendConfig,
    kernels: KernelRegistry,
}

impl ReferenceBackend {
    /// Backend with the default configuration.
    pub fn new() -> Self {
        Self::build(ReferenceBackendConfig::default())
    }

    /// Backend with a custom configuration.
    pub fn with_config(config: ReferenceBackendConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Construct from a configuration that has already been validated.
    pub(crate) fn build(config: ReferenceBackendConfig) -> Self {
        Self {
            kernels: reference_kernel_registry(&config),
            config,
        }
    }

    pub fn config(&self) -> &ReferenceBackendConfig {
        &self.config
    }

    /// Descriptor the kernels of one node slot are built against.
    ///
    /// Partition operands use their finalized descriptor; intermediates are
    /// materialized densely and must have a byte size that fits in `usize`.
    fn slot_descriptor(
        &self,
        declared: &LogicalTensor,
        operands: &ResolvedOperands,
    ) -> Result<LogicalTensor> {
        if let Some(resolved) = operands.get(declared.id) {
            return Ok(resolved.clone());
        }
        if declared.plain_size().is_none() {
            return Err(Error::InvalidArgument(format!(
                "Intermediate tensor {} with dims {:?} is too large to materialize",
                declared.id, declared.dims
            )));
        }
        match declared.layout {
            Layout::Strided(_) if !declared.is_dense() => Err(Error::Unimplemented(format!(
                "Intermediate tensor {} has non-dense strides",
                declared.id
            ))),
            _ => Ok(LogicalTensor::new(
                declared.id.value(),
                &declared.dims,
                declared.dtype,
            )),
        }
    }

    /// Reject layouts the kernels cannot address.
    fn check_addressable(&self, lt: &LogicalTensor) -> Result<()> {
        match &lt.layout {
            Layout::Strided(_) if lt.is_dense() => Ok(()),
            Layout::Strided(strides) => Err(Error::Unimplemented(format!(
                "Reference kernels need dense strides, tensor {} has {strides:?}",
                lt.id
            ))),
            Layout::Opaque(opaque)
                if opaque.backend == REFERENCE_BACKEND
                    && opaque.layout_id == PADDED_DENSE_LAYOUT
                    && lt.plain_size().is_some_and(|plain| opaque.size_bytes >= plain) =>
            {
                Ok(())
            }
            Layout::Opaque(_) => Err(Error::InvalidArgument(format!(
                "Tensor {} carries an opaque layout this backend did not assign",
                lt.id
            ))),
            Layout::Any | Layout::Undefined => Err(Error::InvalidArgument(format!(
                "Tensor {} has no concrete layout",
                lt.id
            ))),
        }
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ReferenceBackend {
    fn name(&self) -> &str {
        REFERENCE_BACKEND
    }

    fn kernel_registry(&self) -> &KernelRegistry {
        &self.kernels
    }

    fn supports_engine(&self, kind: EngineKind) -> bool {
        matches!(kind, EngineKind::Cpu | EngineKind::Any)
    }

    fn assign_layout(&self, tensor: &LogicalTensor) -> Result<LogicalTensor> {
        if !tensor.dtype.is_defined() {
            return Err(Error::InvalidArgument(format!(
                "Cannot lay out tensor {} without a data type",
                tensor.id
            )));
        }
        let size_bytes = tensor
            .plain_size()
            .and_then(|plain| self.config.padded_size(plain))
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Tensor {} with dims {:?} is too large to lay out",
                    tensor.id, tensor.dims
                ))
            })?;
        Ok(tensor.clone().with_layout(Layout::Opaque(OpaqueLayout {
            backend: REFERENCE_BACKEND.to_string(),
            layout_id: PADDED_DENSE_LAYOUT,
            size_bytes,
        })))
    }

    fn verify_layout(&self, tensor: &LogicalTensor) -> Result<()> {
        self.check_addressable(tensor)
    }

    #[tracing::instrument(skip_all, fields(num_nodes = nodes.len()))]
    fn produce_kernel(
        &self,
        nodes: &[Node],
        operands: &ResolvedOperands,
        engine: &Engine,
    ) -> Result<Box<dyn Kernel>> {
        if !self.supports_engine(engine.kind) {
            return Err(Error::Unimplemented(format!(
                "Reference backend cannot run on {} engines",
                engine.kind
            )));
        }
        for lt in operands.inputs().iter().chain(operands.outputs()) {
            self.check_addressable(lt)?;
        }

        let mut scratch_index: HashMap<TensorId, usize> = HashMap::new();
        let mut scratch_sizes = Vec::new();
        let mut steps = Vec::with_capacity(nodes.len());

        for node in nodes {
            let factory = self.kernels.get(node.op_kind).ok_or_else(|| {
                Error::Unimplemented(format!("No reference kernel for {}", node.op_kind))
            })?;
            if node.has_aliased_inputs() && !factory.allows_input_aliasing() {
                return Err(Error::MissingOperand(format!(
                    "{} does not accept the same tensor in more than one input slot",
                    node.label()
                )));
            }

            let inputs = node
                .inputs
                .iter()
                .map(|lt| self.slot_descriptor(lt, operands))
                .collect::<Result<Vec<_>>>()?;
            let outputs = node
                .outputs
                .iter()
                .map(|lt| self.slot_descriptor(lt, operands))
                .collect::<Result<Vec<_>>>()?;

            let ctx = KernelCtx::new(node, engine, inputs.iter().collect(), outputs.iter().collect());
            let kernel = factory.create_kernel(&ctx)?;

            let input_refs = node
                .inputs
                .iter()
                .map(|lt| {
                    if let Some(position) = operands.input_position(lt.id) {
                        Ok(BufferRef::Input(position))
                    } else if let Some(&index) = scratch_index.get(&lt.id) {
                        Ok(BufferRef::Scratch(index))
                    } else {
                        Err(Error::MissingOperand(format!(
                            "{} reads tensor {} which nothing provides",
                            node.label(),
                            lt.id
                        )))
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            let mut output_refs = Vec::with_capacity(outputs.len());
            for lt in &outputs {
                if let Some(position) = operands.output_position(lt.id) {
                    output_refs.push(BufferRef::Output(position));
                } else {
                    let size = lt.plain_size().ok_or_else(|| {
                        Error::InvalidArgument(format!("Scratch tensor {} is too large", lt.id))
                    })?;
                    let index = scratch_sizes.len();
                    scratch_sizes.push(size);
                    scratch_index.insert(lt.id, index);
                    output_refs.push(BufferRef::Scratch(index));
                }
            }

            tracing::debug!(node = %node.label(), kernel = kernel.name(), "node kernel created");
            steps.push(Step {
                kernel,
                inputs: input_refs,
                outputs: output_refs,
            });
        }

        Ok(Box::new(FusedKernel::new(steps, scratch_sizes)))
    }
}
