//! Per-backend kernel registry.

use crate::ir::OpKind;
use crate::kernel::KernelFactory;
use std::collections::HashMap;

/// Registry of kernel factories owned by one backend.
///
/// Maps operation kinds (e.g. `ReLU`, `MatMul`) to the factory that builds
/// kernels for them. The backend consults it when asked to produce a kernel.
///
/// # Example
///
/// ```ignore
/// let mut registry = KernelRegistry::new();
/// registry
///     .register(OpKind::ReLU, UnaryElementwiseKernels::relu())
///     .register(OpKind::MatMul, MatMulKernels::new(64));
///
/// assert_eq!(registry.count(), 2);
/// ```
pub struct KernelRegistry {
    /// Map from operation kind to factory.
    factories: HashMap<OpKind, Box<dyn KernelFactory>>,
}

impl KernelRegistry {
    /// Create a new empty kernel registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, replacing any previous one for `op_kind`.
    ///
    /// Returns `self` for method chaining.
    pub fn register<F>(&mut self, op_kind: OpKind, factory: F) -> &mut Self
    where
        F: KernelFactory + 'static,
    {
        self.factories.insert(op_kind, Box::new(factory));
        self
    }

    /// Look up the factory for an operation kind.
    pub fn get(&self, op_kind: OpKind) -> Option<&dyn KernelFactory> {
        self.factories.get(&op_kind).map(|f| f.as_ref())
    }

    /// Check if a factory is registered for `op_kind`.
    pub fn contains(&self, op_kind: OpKind) -> bool {
        self.factories.contains_key(&op_kind)
    }

    /// Number of registered kernel factories.
    pub fn count(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered operation kinds, sorted.
    pub fn op_kinds(&self) -> Vec<OpKind> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for KernelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
