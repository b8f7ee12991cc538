//! Individual kernels that do not fit into a family.

pub mod matmul;

pub use matmul::MatMulKernels;
