//! Matrix multiplication kernels.

use fusegraph_core::{Error, Kernel, KernelCtx, KernelFactory, Result, Stream};

use crate::helpers::{buffer, f32_slice, f32_slice_mut, require_dims, require_f32};

/// F32 matrix multiplication.
///
/// Computes C = op(A) × op(B) where:
/// - A: [..., M, K] (or [..., K, M] with `transpose_a`)
/// - B: [..., K, N] (or [..., N, K] with `transpose_b`)
/// - C: [..., M, N]
///
/// Batch dimensions of A and B must match, or B may be a plain matrix shared
/// by every batch. Both input slots must hold distinct tensors.
pub struct MatMulKernels {
    block: usize,
}

impl MatMulKernels {
    /// Create a factory whose kernels tile the loop nest by `block`.
    pub fn new(block: usize) -> Self {
        Self {
            block: block.max(1),
        }
    }
}

impl KernelFactory for MatMulKernels {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn create_kernel(&self, ctx: &KernelCtx) -> Result<Box<dyn Kernel>> {
        ctx.expect_arity(2, 1)?;
        require_f32(ctx)?;

        let transpose_a = ctx.attr_bool_or("transpose_a", false)?;
        let transpose_b = ctx.attr_bool_or("transpose_b", false)?;

        let a_dims = &ctx.input(0)?.dims;
        let b_dims = &ctx.input(1)?.dims;
        if a_dims.len() < 2 || b_dims.len() < 2 {
            return Err(Error::InvalidArgument(format!(
                "MatMul requires at least 2D tensors, got A: {a_dims:?}, B: {b_dims:?}"
            )));
        }

        let (a_batch, a_mat) = a_dims.split_at(a_dims.len() - 2);
        let (b_batch, b_mat) = b_dims.split_at(b_dims.len() - 2);
        let (m, k) = if transpose_a {
            (a_mat[1], a_mat[0])
        } else {
            (a_mat[0], a_mat[1])
        };
        let (k_b, n) = if transpose_b {
            (b_mat[1], b_mat[0])
        } else {
            (b_mat[0], b_mat[1])
        };
        if k != k_b {
            return Err(Error::InvalidArgument(format!(
                "MatMul inner dimensions differ: A {a_dims:?}, B {b_dims:?}"
            )));
        }

        let shared_b = b_batch.is_empty();
        if !shared_b && a_batch != b_batch {
            return Err(Error::Unimplemented(format!(
                "MatMul batch dimensions {a_batch:?} and {b_batch:?} are not supported"
            )));
        }

        let mut out_dims = a_batch.to_vec();
        out_dims.extend([m, n]);
        require_dims(ctx, ctx.output(0)?, &out_dims)?;

        // every per-batch and total buffer extent must be addressable
        let batches = a_batch
            .iter()
            .try_fold(1usize, |count, &dim| count.checked_mul(dim));
        let batches = batches
            .filter(|&batches| {
                [(m, k), (k, n), (m, n)].iter().all(|&(rows, cols)| {
                    rows.checked_mul(cols)
                        .and_then(|size| size.checked_mul(batches))
                        .is_some()
                })
            })
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "MatMul operands A: {a_dims:?}, B: {b_dims:?} are too large"
                ))
            })?;

        Ok(Box::new(MatMulKernel {
            batches,
            m,
            k,
            n,
            transpose_a,
            transpose_b,
            shared_b,
            block: self.block,
        }))
    }
}

struct MatMulKernel {
    batches: usize,
    m: usize,
    k: usize,
    n: usize,
    transpose_a: bool,
    transpose_b: bool,
    shared_b: bool,
    block: usize,
}

impl MatMulKernel {
    fn a_at(&self, a: &[f32], i: usize, kk: usize) -> f32 {
        if self.transpose_a {
            a[kk * self.m + i]
        } else {
            a[i * self.k + kk]
        }
    }

    fn b_at(&self, b: &[f32], kk: usize, j: usize) -> f32 {
        if self.transpose_b {
            b[j * self.k + kk]
        } else {
            b[kk * self.n + j]
        }
    }

    fn multiply(&self, a: &[f32], b: &[f32], c: &mut [f32]) {
        let (m, k, n, block) = (self.m, self.k, self.n, self.block);
        c.fill(0.0);

        for i0 in (0..m).step_by(block) {
            for k0 in (0..k).step_by(block) {
                for j0 in (0..n).step_by(block) {
                    for i in i0..(i0 + block).min(m) {
                        for kk in k0..(k0 + block).min(k) {
                            let a_ik = self.a_at(a, i, kk);
                            for j in j0..(j0 + block).min(n) {
                                c[i * n + j] += a_ik * self.b_at(b, kk, j);
                            }
                        }
                    }
                }
            }
        }
    }
}

impl Kernel for MatMulKernel {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn execute(
        &self,
        _stream: &dyn Stream,
        inputs: &[&[u8]],
        outputs: &mut [&mut [u8]],
    ) -> Result<()> {
        let a_size = self.m * self.k;
        let b_size = self.k * self.n;
        let c_size = self.m * self.n;
        let b_batches = if self.shared_b { 1 } else { self.batches };

        let a = f32_slice(buffer(inputs, 0, "MatMul")?, self.batches * a_size)?;
        let b = f32_slice(buffer(inputs, 1, "MatMul")?, b_batches * b_size)?;
        let Some(out) = outputs.first_mut() else {
            return Err(Error::Kernel("MatMul expected an output buffer".to_string()));
        };
        let c = f32_slice_mut(out, self.batches * c_size)?;

        for batch in 0..self.batches {
            let b_offset = if self.shared_b { 0 } else { batch * b_size };
            self.multiply(
                &a[batch * a_size..(batch + 1) * a_size],
                &b[b_offset..b_offset + b_size],
                &mut c[batch * c_size..(batch + 1) * c_size],
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::HostStream;
    use fusegraph_core::{DataType, Engine, LogicalTensor, Node, OpKind};

    fn run(
        node: &Node,
        block: usize,
        (a_dims, a): (&[usize], &[f32]),
        (b_dims, b): (&[usize], &[f32]),
        out_dims: &[usize],
    ) -> Vec<f32> {
        let lhs = LogicalTensor::new(1, a_dims, DataType::F32);
        let rhs = LogicalTensor::new(2, b_dims, DataType::F32);
        let dst = LogicalTensor::new(3, out_dims, DataType::F32);
        let engine = Engine::cpu();
        let kernel = MatMulKernels::new(block)
            .create_kernel(&KernelCtx::new(node, &engine, vec![&lhs, &rhs], vec![&dst]))
            .unwrap();

        let mut out = vec![0.0f32; dst.num_elements().unwrap()];
        kernel
            .execute(
                &HostStream::new(),
                &[bytemuck::cast_slice::<f32, u8>(a), bytemuck::cast_slice::<f32, u8>(b)],
                &mut [bytemuck::cast_slice_mut::<f32, u8>(&mut out)],
            )
            .unwrap();
        out
    }

    #[test]
    fn test_matmul_2x3_3x2() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let node = Node::new(OpKind::MatMul);

        let expected = vec![58.0, 64.0, 139.0, 154.0];
        assert_eq!(run(&node, 64, (&[2, 3], &a), (&[3, 2], &b), &[2, 2]), expected);
        // blocking must not change the result
        assert_eq!(run(&node, 1, (&[2, 3], &a), (&[3, 2], &b), &[2, 2]), expected);
        assert_eq!(run(&node, 2, (&[2, 3], &a), (&[3, 2], &b), &[2, 2]), expected);
    }

    #[test]
    fn test_matmul_transposed() {
        // A^T stored as [3, 2], B^T stored as [2, 3]
        let a_t = [1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
        let b_t = [7.0, 9.0, 11.0, 8.0, 10.0, 12.0];
        let mut node = Node::new(OpKind::MatMul);
        node.set_attr("transpose_a", true).set_attr("transpose_b", true);

        let out = run(&node, 64, (&[3, 2], &a_t), (&[2, 3], &b_t), &[2, 2]);
        assert_eq!(out, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_batched_shared_rhs() {
        // two batches of 1x2 times one shared 2x1
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [10.0, 1.0];
        let node = Node::new(OpKind::MatMul);

        let out = run(&node, 64, (&[2, 1, 2], &a), (&[2, 1], &b), &[2, 1, 1]);
        assert_eq!(out, vec![12.0, 34.0]);
    }

    #[test]
    fn test_matmul_rejects_bad_shapes() {
        let engine = Engine::cpu();
        let node = Node::new(OpKind::MatMul);
        let factory = MatMulKernels::new(64);

        let lhs = LogicalTensor::new(1, &[2, 3], DataType::F32);
        let rhs = LogicalTensor::new(2, &[2, 3], DataType::F32);
        let dst = LogicalTensor::new(3, &[2, 3], DataType::F32);
        let result = factory.create_kernel(&KernelCtx::new(&node, &engine, vec![&lhs, &rhs], vec![&dst]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));

        let vector = LogicalTensor::new(1, &[3], DataType::F32);
        let result =
            factory.create_kernel(&KernelCtx::new(&node, &engine, vec![&vector, &rhs], vec![&dst]));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_matmul_forbids_aliasing() {
        assert!(!MatMulKernels::new(64).allows_input_aliasing());
    }
}
