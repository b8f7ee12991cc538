//! Reference kernel registry and backend registration.

use fusegraph_core::{BackendRegistry, KernelRegistry, OpKind, Result};

use crate::backend::{REFERENCE_BACKEND, ReferenceBackend};
use crate::config::ReferenceBackendConfig;
use crate::families::{BinaryElementwiseKernels, UnaryElementwiseKernels};
use crate::operators::MatMulKernels;

/// Returns a kernel registry pre-populated with every reference kernel.
///
/// The registry includes:
/// - 4 unary elementwise kernels (Abs, ReLU, Sigmoid, Tanh)
/// - 5 binary elementwise kernels (Add, Subtract, Multiply, Maximum, Minimum)
/// - 1 matrix kernel (MatMul)
pub fn reference_kernel_registry(config: &ReferenceBackendConfig) -> KernelRegistry {
    let mut registry = KernelRegistry::new();

    // Unary elementwise kernels
    registry
        .register(OpKind::Abs, UnaryElementwiseKernels::abs())
        .register(OpKind::ReLU, UnaryElementwiseKernels::relu())
        .register(OpKind::Sigmoid, UnaryElementwiseKernels::sigmoid())
        .register(OpKind::Tanh, UnaryElementwiseKernels::tanh());

    // Binary elementwise kernels
    registry
        .register(OpKind::Add, BinaryElementwiseKernels::add())
        .register(OpKind::Subtract, BinaryElementwiseKernels::sub())
        .register(OpKind::Multiply, BinaryElementwiseKernels::mul())
        .register(OpKind::Maximum, BinaryElementwiseKernels::max())
        .register(OpKind::Minimum, BinaryElementwiseKernels::min());

    // Matrix kernels
    registry.register(OpKind::MatMul, MatMulKernels::new(config.matmul_block));

    registry
}

/// Register the reference backend under `"ref"` with the default configuration.
///
/// Returns `false` if a backend is already registered under that name.
pub fn register_reference_backend(registry: &BackendRegistry) -> bool {
    registry.register_backend(REFERENCE_BACKEND, ReferenceBackend::new)
}

/// Register the reference backend under `"ref"` with a custom configuration.
///
/// The configuration is validated before registration; construction still
/// happens on first lookup.
pub fn register_reference_backend_with_config(
    registry: &BackendRegistry,
    config: ReferenceBackendConfig,
) -> Result<bool> {
    config.validate()?;
    Ok(registry.register_backend(REFERENCE_BACKEND, move || ReferenceBackend::build(config)))
}
