//! Compiled partitions and their execution.

use crate::partition::Partition;
use fusegraph_core::{
    Engine, EngineKind, Error, Kernel, LogicalTensor, ResolvedOperands, Result, Stream, Tensor,
    TensorId, TensorMut,
};
use std::fmt;
use std::sync::Arc;

/// Immutable, reusable result of compiling a partition.
///
/// Holds the backend kernel and exactly one finalized descriptor per required
/// operand id. It can be executed any number of times, from any thread, with
/// caller-owned buffers.
pub struct CompiledPartition {
    partition: Arc<Partition>,
    kernel: Box<dyn Kernel>,
    operands: ResolvedOperands,
    engine: Engine,
}

impl CompiledPartition {
    pub(crate) fn new(
        partition: Arc<Partition>,
        kernel: Box<dyn Kernel>,
        operands: ResolvedOperands,
        engine: Engine,
    ) -> Self {
        Self {
            partition,
            kernel,
            operands,
            engine,
        }
    }

    /// Finalized descriptor of a required operand, inputs searched first.
    pub fn query_logical_tensor(&self, id: TensorId) -> Result<&LogicalTensor> {
        self.operands.get(id).ok_or_else(|| {
            Error::NotFound(format!(
                "Tensor {id} is not an operand of {}",
                self.partition.id()
            ))
        })
    }

    /// The partition this was compiled from.
    pub fn src_partition(&self) -> &Arc<Partition> {
        &self.partition
    }

    /// Finalized input descriptors in required order.
    pub fn inputs(&self) -> &[LogicalTensor] {
        self.operands.inputs()
    }

    /// Finalized output descriptors in required order.
    pub fn outputs(&self) -> &[LogicalTensor] {
        self.operands.outputs()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn kernel_name(&self) -> &str {
        self.kernel.name()
    }

    /// Run the kernel on caller-owned buffers.
    ///
    /// `inputs` and `outputs` may be in any order and may contain tensors the
    /// partition does not use; for each required id the first tensor with
    /// that id is bound. All operands are matched and checked before the
    /// kernel is invoked. The kernel may complete asynchronously on `stream`.
    ///
    /// # Errors
    ///
    /// - `MissingOperand` if a required id has no tensor
    /// - `InvalidArgument` if a bound tensor has no buffer, a buffer smaller
    ///   than its finalized size, or the stream belongs to another engine kind
    ///   (a partition compiled for an `any` engine runs on every stream)
    /// - any error the kernel reports, unchanged
    #[tracing::instrument(
        skip_all,
        fields(partition = %self.partition.id(), kernel = self.kernel.name())
    )]
    pub fn execute(
        &self,
        stream: &dyn Stream,
        inputs: &[Tensor<'_>],
        outputs: &mut [TensorMut<'_>],
    ) -> Result<()> {
        let stream_engine = stream.engine();
        if self.engine.kind != EngineKind::Any && stream_engine.kind != self.engine.kind {
            return Err(Error::InvalidArgument(format!(
                "Stream runs on a {} engine but the partition was compiled for {}",
                stream_engine.kind, self.engine.kind
            )));
        }

        let mut input_buffers: Vec<&[u8]> = Vec::with_capacity(self.operands.inputs().len());
        for lt in self.operands.inputs() {
            let tensor = inputs.iter().find(|t| t.id() == lt.id).ok_or_else(|| {
                Error::MissingOperand(format!("No input tensor for {}", lt.id))
            })?;
            let data = tensor.data().ok_or_else(|| {
                Error::InvalidArgument(format!("Input tensor {} has no buffer", lt.id))
            })?;
            check_buffer(lt, data.len())?;
            input_buffers.push(data);
        }

        let mut bound: Vec<Option<&mut [u8]>> =
            self.operands.outputs().iter().map(|_| None).collect();
        for tensor in outputs.iter_mut() {
            let id = tensor.id();
            let Some(position) = self.operands.output_position(id) else {
                continue;
            };
            if bound[position].is_some() {
                continue;
            }
            let data = tensor.data_mut().ok_or_else(|| {
                Error::InvalidArgument(format!("Output tensor {id} has no buffer"))
            })?;
            check_buffer(&self.operands.outputs()[position], data.len())?;
            bound[position] = Some(data);
        }

        let mut output_buffers: Vec<&mut [u8]> = bound
            .into_iter()
            .zip(self.operands.outputs())
            .map(|(data, lt)| {
                data.ok_or_else(|| {
                    Error::MissingOperand(format!("No output tensor for {}", lt.id))
                })
            })
            .collect::<Result<_>>()?;

        tracing::debug!(
            inputs = input_buffers.len(),
            outputs = output_buffers.len(),
            "dispatching kernel"
        );
        self.kernel
            .execute(stream, &input_buffers, &mut output_buffers)
    }
}

impl fmt::Debug for CompiledPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPartition")
            .field("partition", &self.partition.id())
            .field("kernel", &self.kernel.name())
            .field("engine", &self.engine)
            .field("operands", &self.operands)
            .finish()
    }
}

fn check_buffer(lt: &LogicalTensor, len: usize) -> Result<()> {
    let required = lt.size_bytes().ok_or_else(|| {
        Error::InvalidArgument(format!("Tensor {} has no concrete size", lt.id))
    })?;
    if len < required {
        return Err(Error::InvalidArgument(format!(
            "Buffer for tensor {} holds {len} bytes, {required} required",
            lt.id
        )));
    }
    Ok(())
}
