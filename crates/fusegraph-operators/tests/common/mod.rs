//! Common test utilities for reference backend tests.
//!
//! This module provides shared node builders, registry setup and buffer
//! helpers used across the end-to-end tests.

#![allow(dead_code, unused_imports)]

use fusegraph_core::{BackendRegistry, DataType, LogicalTensor, Node, OpKind};

// Re-export types commonly used in tests
pub use fusegraph_compiler::{CompiledPartition, Compiler, CompileOptions, Partition};
pub use fusegraph_core::{Engine, EngineKind, Error, Tensor, TensorId, TensorMut};
pub use fusegraph_operators::{HostStream, REFERENCE_BACKEND};

/// Install a test subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// A fresh registry with the reference backend registered.
pub fn reference_registry() -> BackendRegistry {
    let registry = BackendRegistry::new();
    fusegraph_operators::register_reference_backend(&registry);
    registry
}

/// Dense f32 descriptor.
pub fn f32_tensor(id: u64, dims: &[usize]) -> LogicalTensor {
    LogicalTensor::new(id, dims, DataType::F32)
}

/// f32 descriptor whose layout is left to the backend.
pub fn f32_any(id: u64, dims: &[usize]) -> LogicalTensor {
    LogicalTensor::any(id, dims, DataType::F32)
}

/// A node bound to the reference backend.
///
/// Slots are declared with the given descriptors, in order; repeat a
/// descriptor to alias one tensor into several slots.
pub fn make_node(op: OpKind, inputs: &[&LogicalTensor], outputs: &[&LogicalTensor]) -> Node {
    let mut node = Node::new(op).with_backend(REFERENCE_BACKEND);
    let inputs: Vec<LogicalTensor> = inputs.iter().map(|&lt| lt.clone()).collect();
    let outputs: Vec<LogicalTensor> = outputs.iter().map(|&lt| lt.clone()).collect();
    node.add_inputs(&inputs).add_outputs(&outputs);
    node
}

/// Centred ramp `i - n / 2` with integer halving.
pub fn centred_ramp(n: usize) -> Vec<f32> {
    let half = (n / 2) as i64;
    (0..n as i64).map(|i| (i - half) as f32).collect()
}

/// Zeroed f32 storage covering `size_bytes`.
pub fn zeroed_f32(size_bytes: usize) -> Vec<f32> {
    vec![0.0; size_bytes.div_ceil(4)]
}
