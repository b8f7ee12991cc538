//! Reference host backend for fusegraph.
//!
//! This crate provides a portable CPU backend whose kernels are plain Rust
//! loops over f32 data, registered under the name `"ref"`.
//!
//! # Kernel Families
//!
//! - **Unary elementwise**: Abs, ReLU, Sigmoid, Tanh
//! - **Binary elementwise**: Add, Subtract, Multiply, Maximum, Minimum
//!
//! # Individual Kernels
//!
//! - Matrix multiplication (MatMul, with optional transposes and batching)
//!
//! Partitions with several nodes are compiled into one fused kernel that runs
//! the node kernels in order and keeps intermediates in scratch memory.
//!
//! # Example
//!
//! ```ignore
//! use fusegraph_core::BackendRegistry;
//! use fusegraph_operators::register_reference_backend;
//!
//! let registry = BackendRegistry::new();
//! register_reference_backend(&registry);
//! let backend = registry.get_backend("ref")?;
//! assert_eq!(backend.kernel_registry().count(), 10);
//! ```

pub mod families;
pub mod operators;

mod backend;
mod config;
mod fused;
mod helpers;
mod registry;
mod stream;

pub use backend::{PADDED_DENSE_LAYOUT, REFERENCE_BACKEND, ReferenceBackend};
pub use config::ReferenceBackendConfig;
pub use families::{BinaryElementwiseKernels, UnaryElementwiseKernels};
pub use operators::MatMulKernels;
pub use registry::{
    reference_kernel_registry, register_reference_backend, register_reference_backend_with_config,
};
pub use stream::HostStream;
