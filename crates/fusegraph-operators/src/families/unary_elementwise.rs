//! Unary elementwise kernel family.
//!
//! Covers: Abs, ReLU, Sigmoid, Tanh

use fusegraph_core::{Error, Kernel, KernelCtx, KernelFactory, Result, Stream};

use crate::helpers::{
    buffer, element_count, f32_slice, f32_slice_mut, require_dims, require_f32,
};

/// Unary elementwise kernel family.
///
/// All members share the same structure:
/// - One input and one output of identical shape
/// - f32 element type
/// - One scalar function applied per element
///
/// The only difference is the scalar function.
pub struct UnaryElementwiseKernels {
    name: &'static str,
    op: fn(f32) -> f32,
}

impl UnaryElementwiseKernels {
    /// Create an Abs factory.
    pub fn abs() -> Self {
        Self {
            name: "Abs",
            op: f32::abs,
        }
    }

    /// Create a ReLU factory.
    pub fn relu() -> Self {
        Self {
            name: "ReLU",
            op: |x| x.max(0.0),
        }
    }

    /// Create a Sigmoid factory.
    pub fn sigmoid() -> Self {
        Self {
            name: "Sigmoid",
            op: |x| 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Create a Tanh factory.
    pub fn tanh() -> Self {
        Self {
            name: "Tanh",
            op: f32::tanh,
        }
    }
}

impl KernelFactory for UnaryElementwiseKernels {
    fn name(&self) -> &str {
        self.name
    }

    fn create_kernel(&self, ctx: &KernelCtx) -> Result<Box<dyn Kernel>> {
        ctx.expect_arity(1, 1)?;
        require_f32(ctx)?;

        let input = ctx.input(0)?;
        require_dims(ctx, ctx.output(0)?, &input.dims)?;

        Ok(Box::new(UnaryKernel {
            name: self.name,
            op: self.op,
            len: element_count(input)?,
        }))
    }
}

struct UnaryKernel {
    name: &'static str,
    op: fn(f32) -> f32,
    len: usize,
}

impl Kernel for UnaryKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn execute(
        &self,
        _stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let src = f32_slice(buffer(inputs, 0, self.name)?, self.len)?;
        let Some(out) = outputs.first_mut() else {
            return Err(Error::Kernel(format!(
                "{} expected an output buffer",
                self.name
            )));
        };
        let dst = f32_slice_mut(out, self.len)?;

        for (d, &s) in dst.iter_mut().zip(src) {
            *d = (self.op)(s);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::HostStream;
    use fusegraph_core::{DataType, Engine, Error, LogicalTensor, Node, OpKind};

    fn run(factory: &UnaryElementwiseKernels, input: &[f32]) -> Vec<f32> {
        let src = LogicalTensor::new(1, &[input.len()], DataType::F32);
        let dst = LogicalTensor::new(2, &[input.len()], DataType::F32);
        let node = Node::new(OpKind::Abs);
        let engine = Engine::cpu();
        let kernel = factory
            .create_kernel(&KernelCtx::new(&node, &engine, vec![&src], vec![&dst]))
            .unwrap();

        let mut out = vec![0.0f32; input.len()];
        kernel
            .execute(
                &HostStream::new(),
                &[bytemuck::cast_slice::<f32, u8>(input)],
                &mut [bytemuck::cast_slice_mut::<f32, u8>(&mut out)],
            )
            .unwrap();
        out
    }

    #[test]
    fn test_relu() {
        let out = run(&UnaryElementwiseKernels::relu(), &[-2.0, -0.5, 0.0, 1.5]);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 1.5]);
    }

    #[test]
    fn test_abs_and_tanh() {
        assert_eq!(run(&UnaryElementwiseKernels::abs(), &[-3.0, 2.0]), vec![3.0, 2.0]);

        let out = run(&UnaryElementwiseKernels::tanh(), &[0.0, 1.0]);
        assert_eq!(out[0], 0.0);
        assert!((out[1] - 1.0f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid() {
        let out = run(&UnaryElementwiseKernels::sigmoid(), &[0.0, 10.0]);
        assert!((out[0] - 0.5).abs() < 1e-6);
        assert!(out[1] > 0.9999);
    }

    #[test]
    fn test_rejects_non_f32() {
        let src = LogicalTensor::new(1, &[4], DataType::S32);
        let dst = LogicalTensor::new(2, &[4], DataType::S32);
        let node = Node::new(OpKind::ReLU);
        let engine = Engine::cpu();

        let result = UnaryElementwiseKernels::relu()
            .create_kernel(&KernelCtx::new(&node, &engine, vec![&src], vec![&dst]));
        assert!(matches!(result, Err(Error::Unimplemented(_))));
    }

    #[test]
    fn test_rejects_shape_change() {
        let src = LogicalTensor::new(1, &[4], DataType::F32);
        let dst = LogicalTensor::new(2, &[2, 2], DataType::F32);
        let node = Node::new(OpKind::ReLU);
        let engine = Engine::cpu();

        let result = UnaryElementwiseKernels::relu()
            .create_kernel(&KernelCtx::new(&node, &engine, vec![&src], vec![&dst]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
