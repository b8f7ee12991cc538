//! Kernel traits.
//!
//! Backends register a `KernelFactory` per operation kind. At compile time the
//! factory turns one node, with fully resolved operand layouts, into a
//! `Kernel`. The kernel captures everything it needs and is invoked at
//! runtime with raw byte buffers only.

use crate::Result;
use crate::engine::Stream;
use crate::kernel_ctx::KernelCtx;
use crate::types::{LogicalTensor, TensorId};

/// An executable computation produced by a backend.
///
/// Buffers are positional. A kernel built for a single node receives one
/// buffer per operand slot in slot order (an aliased input appears once per
/// slot). A kernel produced for a whole partition receives buffers in the
/// partition's required-input and required-output order.
///
/// # Example
///
/// ```ignore
/// struct ReluKernel;
///
/// impl Kernel for ReluKernel {
///     fn name(&self) -> &str {
///         "ReLU"
///     }
///
///     fn execute(
///         &self,
///         _stream: &dyn Stream,
///         inputs: &[&[u8]],
///         outputs: &mut [&mut [u8]],
///     ) -> Result<()> {
///         let src: &[f32] = bytemuck::cast_slice(inputs[0]);
///         let dst: &mut [f32] = bytemuck::cast_slice_mut(outputs[0]);
///         for (d, s) in dst.iter_mut().zip(src) {
///             *d = s.max(0.0);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Kernel: Send + Sync {
    /// Name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Run the computation, writing results into `outputs`.
    ///
    /// Work may be enqueued on `stream` and completed later.
    fn execute(
        &self,
        stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()>;
}

/// Produces kernels for one operation kind.
pub trait KernelFactory: Send + Sync {
    /// Factory name (usually the operation name).
    fn name(&self) -> &str;

    /// Whether one tensor may fill more than one input slot of a node.
    ///
    /// Commutative operations used as "square" (`x * x`) allow this; most
    /// operations do not.
    fn allows_input_aliasing(&self) -> bool {
        false
    }

    /// Build a kernel for the node described by `ctx`.
    ///
    /// Returns `Error::Unimplemented` for unsupported dtype, shape, layout or
    /// attribute combinations.
    fn create_kernel(&self, ctx: &KernelCtx) -> Result<Box<dyn Kernel>>;
}

/// Finalized descriptors for a partition's required operands, in required order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedOperands {
    inputs: Vec<LogicalTensor>,
    outputs: Vec<LogicalTensor>,
}

impl ResolvedOperands {
    /// Create from descriptors already in required order.
    pub fn new(inputs: Vec<LogicalTensor>, outputs: Vec<LogicalTensor>) -> Self {
        Self { inputs, outputs }
    }

    /// Input descriptors in required order.
    pub fn inputs(&self) -> &[LogicalTensor] {
        &self.inputs
    }

    /// Output descriptors in required order.
    pub fn outputs(&self) -> &[LogicalTensor] {
        &self.outputs
    }

    /// Position of `id` among the required inputs.
    pub fn input_position(&self, id: TensorId) -> Option<usize> {
        self.inputs.iter().position(|lt| lt.id == id)
    }

    /// Position of `id` among the required outputs.
    pub fn output_position(&self, id: TensorId) -> Option<usize> {
        self.outputs.iter().position(|lt| lt.id == id)
    }

    /// Look up a descriptor, inputs first.
    pub fn get(&self, id: TensorId) -> Option<&LogicalTensor> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .find(|lt| lt.id == id)
    }
}
