//! Ordering of the nodes inside a partition.
//!
//! Nodes are sorted topologically over their tensor dependencies so that a
//! backend fusing several nodes can evaluate them front to back.

use fusegraph_core::{Error, Node, Result, TensorId};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Return `nodes` in dependency order.
///
/// Nodes with no dependency between them keep their declaration order.
/// Fails with `InvalidArgument` if a tensor is produced twice or the nodes
/// form a cycle (including a node consuming its own output).
pub(crate) fn schedule(nodes: Vec<Node>) -> Result<Vec<Node>> {
    let dep_graph = build_dependency_graph(&nodes)?;
    let order = topological_sort(&dep_graph)?;

    let mut slots: Vec<Option<Node>> = nodes.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Build a graph where nodes are operations and edges carry the tensor that
/// flows from producer to consumer.
fn build_dependency_graph(nodes: &[Node]) -> Result<DiGraph<usize, TensorId>> {
    let mut dep_graph = DiGraph::new();
    let indices: Vec<NodeIndex> = (0..nodes.len()).map(|i| dep_graph.add_node(i)).collect();

    let mut producers: HashMap<TensorId, usize> = HashMap::new();
    for (position, node) in nodes.iter().enumerate() {
        for id in node.output_ids() {
            if producers.insert(id, position).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "Tensor {id} is produced more than once (last by {})",
                    node.label()
                )));
            }
        }
    }

    for (consumer, node) in nodes.iter().enumerate() {
        for id in node.input_ids() {
            if let Some(&producer) = producers.get(&id) {
                // update_edge keeps one edge per pair even for aliased slots
                dep_graph.update_edge(indices[producer], indices[consumer], id);
            }
        }
    }

    Ok(dep_graph)
}

/// Kahn's algorithm, always taking the ready node declared first.
///
/// Nodes on a cycle never become ready, so an incomplete order means a cycle.
fn topological_sort(dep_graph: &DiGraph<usize, TensorId>) -> Result<Vec<usize>> {
    let mut in_degree: Vec<usize> = dep_graph
        .node_indices()
        .map(|index| dep_graph.neighbors_directed(index, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = dep_graph
        .node_indices()
        .filter(|index| in_degree[index.index()] == 0)
        .map(|index| Reverse(index.index()))
        .collect();

    let mut sorted = Vec::with_capacity(dep_graph.node_count());
    while let Some(Reverse(position)) = ready.pop() {
        sorted.push(dep_graph[NodeIndex::new(position)]);
        for next in dep_graph.neighbors_directed(NodeIndex::new(position), Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(next.index()));
            }
        }
    }

    if sorted.len() != dep_graph.node_count() {
        return Err(Error::InvalidArgument(
            "Partition nodes contain a dependency cycle".to_string(),
        ));
    }

    Ok(sorted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusegraph_core::{DataType, LogicalTensor, OpKind};

    fn lt(id: u64) -> LogicalTensor {
        LogicalTensor::new(id, &[4], DataType::F32)
    }

    fn node(op: OpKind, inputs: &[u64], outputs: &[u64]) -> Node {
        let mut node = Node::new(op).with_backend("mock");
        let ins: Vec<_> = inputs.iter().map(|&id| lt(id)).collect();
        let outs: Vec<_> = outputs.iter().map(|&id| lt(id)).collect();
        node.add_inputs(&ins).add_outputs(&outs);
        node
    }

    #[test]
    fn test_reorders_consumer_after_producer() {
        // declared as relu(t2) before add(t0, t1) -> t2
        let nodes = vec![
            node(OpKind::ReLU, &[2], &[3]),
            node(OpKind::Add, &[0, 1], &[2]),
        ];

        let ordered = schedule(nodes).unwrap();
        let kinds: Vec<_> = ordered.iter().map(|n| n.op_kind).collect();
        assert_eq!(kinds, vec![OpKind::Add, OpKind::ReLU]);
    }

    #[test]
    fn test_independent_nodes_keep_declaration_order() {
        let nodes = vec![
            node(OpKind::Abs, &[0], &[1]),
            node(OpKind::Tanh, &[2], &[3]),
        ];

        let ordered = schedule(nodes).unwrap();
        assert_eq!(ordered[0].op_kind, OpKind::Abs);
        assert_eq!(ordered[1].op_kind, OpKind::Tanh);
    }

    #[test]
    fn test_ready_nodes_follow_declaration_order() {
        let nodes = vec![
            node(OpKind::Tanh, &[2], &[3]),
            node(OpKind::Abs, &[0], &[1]),
            node(OpKind::ReLU, &[1], &[4]),
        ];

        let ordered = schedule(nodes).unwrap();
        let kinds: Vec<_> = ordered.iter().map(|n| n.op_kind).collect();
        assert_eq!(kinds, vec![OpKind::Tanh, OpKind::Abs, OpKind::ReLU]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let nodes = vec![
            node(OpKind::Abs, &[1], &[2]),
            node(OpKind::Tanh, &[2], &[1]),
        ];
        assert!(matches!(schedule(nodes), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let nodes = vec![node(OpKind::Abs, &[1], &[1])];
        assert!(matches!(schedule(nodes), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_double_producer_is_rejected() {
        let nodes = vec![
            node(OpKind::Abs, &[0], &[2]),
            node(OpKind::Tanh, &[1], &[2]),
        ];
        assert!(matches!(schedule(nodes), Err(Error::InvalidArgument(_))));
    }
}
