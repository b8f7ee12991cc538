//! Backend trait and the name-keyed backend registry.
//!
//! Backends are registered by name with a constructor and built lazily on
//! first lookup. The registry is an ordinary value so that the compiler can
//! receive it by reference; `BackendRegistry::global()` offers a process-wide
//! instance for clients that want one.

use crate::engine::{Engine, EngineKind};
use crate::ir::Node;
use crate::kernel::{Kernel, ResolvedOperands};
use crate::registry::KernelRegistry;
use crate::types::LogicalTensor;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// A named provider of kernels for a device family.
pub trait Backend: Send + Sync {
    /// Name the backend is registered under.
    fn name(&self) -> &str;

    /// Kernel factories owned by this backend.
    fn kernel_registry(&self) -> &KernelRegistry;

    /// Whether kernels of this backend can run on engines of `kind`.
    fn supports_engine(&self, kind: EngineKind) -> bool {
        let _ = kind;
        true
    }

    /// Choose a concrete layout for a tensor whose layout is `Any`.
    ///
    /// The returned descriptor has an `Opaque` layout whose size is at least
    /// the plain size of the tensor.
    fn assign_layout(&self, tensor: &LogicalTensor) -> Result<LogicalTensor>;

    /// Check that a caller-fixed (`Strided`) or previously assigned
    /// (`Opaque`) layout can be consumed or produced by this backend.
    fn verify_layout(&self, tensor: &LogicalTensor) -> Result<()>;

    /// Build one kernel computing all `nodes` (in execution order).
    ///
    /// `operands` holds the finalized descriptors of the partition's required
    /// inputs and outputs. The returned kernel receives buffers in that order.
    fn produce_kernel(
        &self,
        nodes: &[Node],
        operands: &ResolvedOperands,
        engine: &Engine,
    ) -> Result<Box<dyn Kernel>>;
}

/// Constructor stored for a registered backend.
pub type BackendFactory = Box<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

/// A registered backend: its constructor and, once built, the singleton.
struct BackendEntry {
    factory: BackendFactory,
    instance: OnceLock<Arc<dyn Backend>>,
}

/// Name-keyed registry of backend singletons.
pub struct BackendRegistry {
    entries: RwLock<HashMap<String, Arc<BackendEntry>>>,
}

// Process-wide registry instance
static GLOBAL_REGISTRY: OnceLock<BackendRegistry> = OnceLock::new();

impl BackendRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static BackendRegistry {
        GLOBAL_REGISTRY.get_or_init(BackendRegistry::new)
    }

    /// Register a backend constructor under `name`.
    ///
    /// The backend is not built until the first `get_backend(name)`. Returns
    /// `false` if `name` is already registered; the existing entry is kept.
    ///
    /// # Example
    /// ```ignore
    /// let registry = BackendRegistry::new();
    /// assert!(registry.register_backend("ref", ReferenceBackend::new));
    /// assert!(!registry.register_backend("ref", ReferenceBackend::new));
    /// ```
    pub fn register_backend<B, F>(&self, name: &str, constructor: F) -> bool
    where
        B: Backend + 'static,
        F: Fn() -> B + Send + Sync + 'static,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            tracing::warn!(backend = name, "backend already registered");
            return false;
        }

        let factory: BackendFactory = Box::new(move || Arc::new(constructor()) as Arc<dyn Backend>);
        entries.insert(
            name.to_string(),
            Arc::new(BackendEntry {
                factory,
                instance: OnceLock::new(),
            }),
        );
        tracing::info!(backend = name, "backend registered");
        true
    }

    /// Get the backend registered under `name`, building it on first use.
    ///
    /// Concurrent first lookups build the backend exactly once.
    pub fn get_backend(&self, name: &str) -> Result<Arc<dyn Backend>> {
        let entry = {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            entries
                .get(name)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("backend '{name}' is not registered")))?
        };

        let backend = entry.instance.get_or_init(|| {
            let backend = (entry.factory)();
            tracing::info!(
                backend = name,
                kernels = backend.kernel_registry().count(),
                "backend constructed"
            );
            backend
        });
        Ok(Arc::clone(backend))
    }

    /// Check if a backend is registered under `name`.
    pub fn has_backend(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Check if the backend under `name` has been built.
    pub fn is_constructed(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|entry| entry.instance.get().is_some())
    }

    /// Registered backend names, sorted.
    pub fn backend_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Drop every registration.
    ///
    /// Backends already handed out stay alive until their last handle is
    /// dropped.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
