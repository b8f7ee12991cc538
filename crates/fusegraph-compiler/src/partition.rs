//! Partitions: fused groups of nodes bound to one backend.

use crate::compiled::CompiledPartition;
use crate::scheduler;
use crate::Compiler;
use fusegraph_core::{
    Backend, BackendRegistry, Engine, EngineKind, Error, LogicalTensor, Node, Result, TensorId,
};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PARTITION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionId(pub u64);

impl PartitionId {
    fn next() -> Self {
        Self(NEXT_PARTITION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition#{}", self.0)
    }
}

/// A fused group of one or more nodes compiled together by one backend.
///
/// A partition is immutable after `init` and is shared by every
/// `CompiledPartition` produced from it.
pub struct Partition {
    id: PartitionId,
    engine_kind: EngineKind,

    /// Nodes in dependency order.
    nodes: Vec<Node>,

    backend: Arc<dyn Backend>,

    /// External inputs, de-duplicated, first-seen order.
    required_inputs: Vec<TensorId>,

    /// External outputs, de-duplicated, first-seen order.
    required_outputs: Vec<TensorId>,
}

impl Partition {
    /// Build a partition from `nodes` and bind it to the backend they name.
    ///
    /// Every node must carry the same `"backend"` attribute and that backend
    /// must be registered in `registry`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty node list, a node without a backend
    ///   attribute, nodes naming different backends, a tensor produced twice or
    ///   a dependency cycle
    /// - `NotFound` if the backend is not registered
    #[tracing::instrument(skip_all, fields(num_nodes = nodes.len(), engine_kind = %engine_kind))]
    pub fn init(
        nodes: Vec<Node>,
        engine_kind: EngineKind,
        registry: &BackendRegistry,
    ) -> Result<Arc<Self>> {
        if nodes.is_empty() {
            return Err(Error::InvalidArgument(
                "A partition needs at least one node".to_string(),
            ));
        }

        let backend_name = common_backend(&nodes)?;
        let backend = registry.get_backend(&backend_name)?;

        let nodes = scheduler::schedule(nodes)?;
        let (required_inputs, required_outputs) = required_ids(&nodes);

        let partition = Self {
            id: PartitionId::next(),
            engine_kind,
            nodes,
            backend,
            required_inputs,
            required_outputs,
        };

        tracing::debug!(
            partition = %partition.id,
            backend = %backend_name,
            inputs = partition.required_inputs.len(),
            outputs = partition.required_outputs.len(),
            "partition initialized"
        );

        Ok(Arc::new(partition))
    }

    /// Compile with default options.
    ///
    /// `inputs` and `outputs` are candidate pools: unordered, possibly larger
    /// than needed and possibly containing duplicates.
    pub fn compile(
        self: &Arc<Self>,
        inputs: &[&LogicalTensor],
        outputs: &[&LogicalTensor],
        engine: &Engine,
    ) -> Result<CompiledPartition> {
        Compiler::new().compile(self, inputs, outputs, engine)
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine_kind
    }

    /// Nodes in execution order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn required_inputs(&self) -> &[TensorId] {
        &self.required_inputs
    }

    pub fn required_outputs(&self) -> &[TensorId] {
        &self.required_outputs
    }

    /// The descriptor a node declared for `id` (first slot that names it).
    pub fn declared(&self, id: TensorId) -> Option<&LogicalTensor> {
        self.nodes
            .iter()
            .flat_map(|node| node.inputs.iter().chain(&node.outputs))
            .find(|lt| lt.id == id)
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("id", &self.id)
            .field("engine_kind", &self.engine_kind)
            .field("backend", &self.backend.name())
            .field("nodes", &self.nodes.len())
            .field("required_inputs", &self.required_inputs)
            .field("required_outputs", &self.required_outputs)
            .finish()
    }
}

/// The backend every node names.
fn common_backend(nodes: &[Node]) -> Result<String> {
    let mut selected: Option<&str> = None;
    for node in nodes {
        let name = node.backend().ok_or_else(|| {
            Error::InvalidArgument(format!("{} has no backend attribute", node.label()))
        })?;
        match selected {
            None => selected = Some(name),
            Some(first) if first != name => {
                return Err(Error::InvalidArgument(format!(
                    "Partition mixes backends '{first}' and '{name}'"
                )));
            }
            Some(_) => {}
        }
    }
    selected
        .map(str::to_string)
        .ok_or_else(|| Error::InvalidArgument("A partition needs at least one node".to_string()))
}

/// Required input and output ids of `nodes`.
///
/// Ids produced and consumed inside the partition are internal and belong to
/// neither list.
fn required_ids(nodes: &[Node]) -> (Vec<TensorId>, Vec<TensorId>) {
    let produced: HashSet<TensorId> = nodes.iter().flat_map(|n| n.output_ids()).collect();
    let consumed: HashSet<TensorId> = nodes.iter().flat_map(|n| n.input_ids()).collect();

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for node in nodes {
        for id in node.input_ids() {
            if !produced.contains(&id) && !inputs.contains(&id) {
                inputs.push(id);
            }
        }
        for id in node.output_ids() {
            if !consumed.contains(&id) && !outputs.contains(&id) {
                outputs.push(id);
            }
        }
    }
    (inputs, outputs)
}
