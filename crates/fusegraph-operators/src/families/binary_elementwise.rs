//! Binary elementwise kernel family.
//!
//! Covers: Add, Subtract, Multiply, Maximum, Minimum

use fusegraph_core::{Error, Kernel, KernelCtx, KernelFactory, Result, Stream};

use crate::helpers::{
    broadcast_shapes, broadcast_strides, buffer, element_count, f32_slice, f32_slice_mut,
    require_dims, require_f32,
};

/// Binary elementwise kernel family.
///
/// All members share the same structure:
/// - Two f32 inputs with NumPy-style broadcasting
/// - One output with the broadcast shape
/// - One scalar function applied per output element
///
/// Commutative members accept the same tensor in both input slots, so that
/// `x * x` can be expressed as a Multiply node with one aliased input.
pub struct BinaryElementwiseKernels {
    name: &'static str,
    op: fn(f32, f32) -> f32,
    commutative: bool,
}

impl BinaryElementwiseKernels {
    /// Create an Add factory.
    pub fn add() -> Self {
        Self {
            name: "Add",
            op: |a, b| a + b,
            commutative: true,
        }
    }

    /// Create a Subtract factory.
    pub fn sub() -> Self {
        Self {
            name: "Subtract",
            op: |a, b| a - b,
            commutative: false,
        }
    }

    /// Create a Multiply factory.
    pub fn mul() -> Self {
        Self {
            name: "Multiply",
            op: |a, b| a * b,
            commutative: true,
        }
    }

    /// Create a Maximum factory.
    pub fn max() -> Self {
        Self {
            name: "Maximum",
            op: f32::max,
            commutative: true,
        }
    }

    /// Create a Minimum factory.
    pub fn min() -> Self {
        Self {
            name: "Minimum",
            op: f32::min,
            commutative: true,
        }
    }
}

impl KernelFactory for BinaryElementwiseKernels {
    fn name(&self) -> &str {
        self.name
    }

    fn allows_input_aliasing(&self) -> bool {
        self.commutative
    }

    fn create_kernel(&self, ctx: &KernelCtx) -> Result<Box<dyn Kernel>> {
        ctx.expect_arity(2, 1)?;
        require_f32(ctx)?;

        let a = ctx.input(0)?;
        let b = ctx.input(1)?;
        let out_dims = broadcast_shapes(&a.dims, &b.dims)?;
        let out = ctx.output(0)?;
        require_dims(ctx, out, &out_dims)?;

        Ok(Box::new(BinaryKernel {
            name: self.name,
            op: self.op,
            a_len: element_count(a)?,
            b_len: element_count(b)?,
            out_len: element_count(out)?,
            a_strides: broadcast_strides(&a.dims, &out_dims),
            b_strides: broadcast_strides(&b.dims, &out_dims),
            same_shape: a.dims == b.dims,
            out_dims,
        }))
    }
}

struct BinaryKernel {
    name: &'static str,
    op: fn(f32, f32) -> f32,
    a_len: usize,
    b_len: usize,
    out_len: usize,
    out_dims: Vec<usize>,
    a_strides: Vec<usize>,
    b_strides: Vec<usize>,
    same_shape: bool,
}

impl BinaryKernel {
    /// Source offsets of the output element at flat index `index`.
    fn offsets(&self, mut index: usize) -> (usize, usize) {
        let mut a_offset = 0;
        let mut b_offset = 0;
        for axis in (0..self.out_dims.len()).rev() {
            let dim = self.out_dims[axis];
            let coord = index % dim;
            index /= dim;
            a_offset += coord * self.a_strides[axis];
            b_offset += coord * self.b_strides[axis];
        }
        (a_offset, b_offset)
    }
}

impl Kernel for BinaryKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(
        &self,
        _stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let a = f32_slice(buffer(inputs, 0, self.name)?, self.a_len)?;
        let b = f32_slice(buffer(inputs, 1, self.name)?, self.b_len)?;
        let Some(out) = outputs.first_mut() else {
            return Err(Error::Kernel(format!(
                "{} expected an output buffer",
                self.name
            )));
        };
        let dst = f32_slice_mut(out, self.out_len)?;

        if self.same_shape {
            for ((d, &x), &y) in dst.iter_mut().zip(a).zip(b) {
                *d = (self.op)(x, y);
            }
        } else {
            for (index, d) in dst.iter_mut().enumerate() {
                let (ia, ib) = self.offsets(index);
                *d = (self.op)(a[ia], b[ib]);
            }
        }
        Ok(())
    }
}
