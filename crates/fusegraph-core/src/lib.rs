//! Core types and extension traits for fusegraph.
//!
//! This crate provides the foundational abstractions the compiler and every
//! backend depend on:
//! - Logical tensor model (`LogicalTensor`, `Layout`, `DataType`)
//! - Node IR (`Node`, `OpKind`, `AttributeValue`)
//! - Engines and streams (`Engine`, `Stream`)
//! - Kernel traits and the per-backend `KernelRegistry`
//! - The `Backend` trait and the injectable `BackendRegistry`
//! - Runtime tensor views over caller-owned buffers

pub mod backend;
pub mod engine;
pub mod ir;
pub mod kernel;
pub mod kernel_ctx;
pub mod registry;
pub mod tensor;
pub mod types;

pub use backend::{Backend, BackendFactory, BackendRegistry};
pub use engine::{Engine, EngineKind, Stream};
pub use ir::{AttributeValue, BACKEND_ATTR, Node, OpKind};
pub use kernel::{Kernel, KernelFactory, ResolvedOperands};
pub use kernel_ctx::KernelCtx;
pub use registry::KernelRegistry;
pub use tensor::{Tensor, TensorMut};
pub use types::{DataType, Layout, LayoutType, LogicalTensor, OpaqueLayout, TensorId};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the compiler, the executor and every backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A required operand has no match, or a node aliases operands its
    /// operation does not allow.
    #[error("Missing operand: {0}")]
    MissingOperand(String),

    /// No kernel exists for the requested op/attribute/layout/dtype combination.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Unknown backend name or logical tensor id.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed shapes, dtypes, layouts or buffers.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by a kernel while running.
    #[error("Kernel failure: {0}")]
    Kernel(String),
}

impl Error {
    /// The status code this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Error::MissingOperand(_) => Status::MissingOperand,
            Error::Unimplemented(_) => Status::Unimplemented,
            Error::NotFound(_) => Status::NotFound,
            Error::InvalidArgument(_) => Status::InvalidArgument,
            Error::Kernel(_) => Status::KernelFailure,
        }
    }
}

/// Flat status-code view of an operation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    MissingOperand,
    Unimplemented,
    NotFound,
    InvalidArgument,
    KernelFailure,
}

impl Status {
    /// Collapse a result into its status code.
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }
}
