//! Collapsed kernel families.
//!
//! These families group similar operations together, implementing shared logic
//! once and parameterizing only the scalar function.

pub mod binary_elementwise;
pub mod unary_elementwise;

pub use binary_elementwise::BinaryElementwiseKernels;
pub use unary_elementwise::UnaryElementwiseKernels;
