use crate::activation::ActivationRef;
use crate::ids::NodeId;
use crate::network::Network;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct BakedNode {
    value: f32,
    activated: f32,
    start_edge: usize,
    num_edges: usize,
    activation: usize,
}

#[derive(Debug, Clone, Copy)]
struct BakedEdge {
    source: usize,
    weight: f32,
}

/// A read-only-topology snapshot of a [Network], linearized for fast repeated
/// evaluation between structural changes.
///
/// Nodes are stored in a topological evaluation order (for recurrent networks,
/// the post-order of a backward walk from the outputs, where an ancestor on
/// the walk path counts as already committed). Each node's incoming edges sit
/// contiguously in one block; zero-weight edges, including disabled ones, are
/// dropped at bake time. Activations are deduplicated by handle identity into
/// a side table.
#[derive(Debug, Clone)]
pub struct BakedNetwork {
    nodes: Vec<BakedNode>,
    edges: Vec<BakedEdge>,
    activations: Vec<Option<ActivationRef>>,
    index_of: BTreeMap<NodeId, usize>,
    recurrent: bool,
}

impl BakedNetwork {
    pub fn new(network: &Network) -> Self {
        let recurrent = network.has_circular_edges();

        let mut baked = BakedNetwork {
            nodes: Vec::with_capacity(network.num_nodes()),
            edges: Vec::with_capacity(network.num_edges()),
            activations: Vec::new(),
            index_of: BTreeMap::new(),
            recurrent,
        };

        let mut stack: Vec<NodeId> = Vec::new();
        let mut on_path: HashSet<NodeId> = HashSet::new();

        for output_index in 0..network.output_nodes().len() {
            stack.clear();
            on_path.clear();
            stack.push(network.output_nodes()[output_index]);

            while let Some(&id) = stack.last() {
                if baked.index_of.contains_key(&id) {
                    stack.pop();
                    continue;
                }

                let mut ready = true;
                for edge_id in network.incoming_edges(id) {
                    let edge = network.edge(*edge_id);
                    if edge.weight() == 0.0 {
                        continue;
                    }

                    let source = edge.in_node();
                    let revisits_path = recurrent && on_path.contains(&source);

                    if !revisits_path && !baked.index_of.contains_key(&source) {
                        on_path.insert(id);
                        stack.push(source);
                        ready = false;
                    }
                }

                if !ready {
                    continue;
                }

                let start_edge = baked.edges.len();
                for edge_id in network.incoming_edges(id) {
                    let edge = network.edge(*edge_id);
                    if edge.weight() == 0.0 {
                        continue;
                    }

                    // Raw NodeId for now; sources on a recurrent path are not
                    // committed yet, so the remap to indices happens at the end.
                    baked.edges.push(BakedEdge {
                        source: edge.in_node().val() as usize,
                        weight: edge.weight(),
                    });
                }

                let node = network.node(id);
                let activation = baked.intern_activation(node.activation());
                baked.nodes.push(BakedNode {
                    value: node.raw_value(),
                    activated: 0.0,
                    start_edge,
                    num_edges: baked.edges.len() - start_edge,
                    activation,
                });
                baked.index_of.insert(id, baked.nodes.len() - 1);
                on_path.remove(&id);
                stack.pop();
            }
        }

        for edge in baked.edges.iter_mut() {
            edge.source = baked.index_of[&NodeId::new(edge.source as u32)];
        }

        baked
    }

    fn intern_activation(&mut self, activation: Option<&ActivationRef>) -> usize {
        let existing = self.activations.iter().position(|a| match (a, activation) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        });

        existing.unwrap_or_else(|| {
            self.activations.push(activation.cloned());
            self.activations.len() - 1
        })
    }

    #[inline]
    fn apply(&self, activation: usize, value: f32) -> f32 {
        match &self.activations[activation] {
            Some(a) => a.activate(value),
            None => value,
        }
    }

    pub fn is_recurrent(&self) -> bool {
        self.recurrent
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.index_of.contains_key(&id)
    }

    /// Set a node's raw value, pre-applying its activation so both the raw and
    /// the activated slots are current. Unknown ids are ignored: a node can
    /// drop out of the baked form when nothing reachable consumes it.
    pub fn set_node_value(&mut self, id: NodeId, value: f32) {
        let Some(&index) = self.index_of.get(&id) else {
            return;
        };

        self.nodes[index].value = value;
        self.nodes[index].activated = self.apply(self.nodes[index].activation, value);
    }

    /// The activated value of a node.
    ///
    /// # Panics
    /// Panics when the node was not baked into this network.
    pub fn node_value(&self, id: NodeId) -> f32 {
        self.nodes[self.index_of[&id]].activated
    }

    pub fn clear_node_values(&mut self) {
        for node in self.nodes.iter_mut() {
            node.value = 0.0;
            node.activated = 0.0;
        }
    }

    /// Evaluate every node in stored order. Ordering guarantees that a
    /// feed-forward source is updated before its consumers; a recurrent
    /// back-edge reads the activated value still stored at the source slot,
    /// which is the previous step's output.
    pub fn evaluate(&mut self) {
        for index in 0..self.nodes.len() {
            let node = &self.nodes[index];

            let sum = if node.num_edges == 0 {
                node.value
            } else {
                let mut sum = 0.0;
                for edge in &self.edges[node.start_edge..node.start_edge + node.num_edges] {
                    sum += self.nodes[edge.source].activated * edge.weight;
                }
                sum
            };

            let activated = self.apply(node.activation, sum);
            debug_assert!(!activated.is_nan() && !activated.is_infinite());
            self.nodes[index].activated = activated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::edge::Edge;
    use crate::ids::EdgeId;
    use crate::network::NetworkKind;
    use crate::node::{Node, NodeType};

    fn node_id(raw: u32) -> NodeId {
        NodeId::new(raw)
    }

    fn edge_id(raw: u32) -> EdgeId {
        EdgeId::new(raw)
    }

    fn layered_network() -> Network {
        let sigmoid = Arc::new(Activation::sigmoid());

        let mut nodes = BTreeMap::new();
        nodes.insert(node_id(0), Node::new(NodeType::Input));
        nodes.insert(node_id(1), Node::new(NodeType::Input));
        let mut hidden = Node::new(NodeType::Hidden);
        hidden.set_activation(Some(Arc::clone(&sigmoid)));
        nodes.insert(node_id(2), hidden);
        let mut output = Node::new(NodeType::Output);
        output.set_activation(Some(sigmoid));
        nodes.insert(node_id(3), output);

        let mut edges = BTreeMap::new();
        edges.insert(edge_id(0), Edge::new(node_id(0), node_id(2), 0.4));
        edges.insert(edge_id(1), Edge::new(node_id(1), node_id(2), -0.6));
        edges.insert(edge_id(2), Edge::new(node_id(2), node_id(3), 1.2));
        edges.insert(edge_id(3), Edge::new(node_id(1), node_id(3), 0.3));

        Network::new(
            NetworkKind::FeedForward,
            nodes,
            edges,
            vec![node_id(0), node_id(1)],
            vec![node_id(3)],
        )
    }

    #[test]
    fn baked_matches_mutable_evaluation() {
        let mut network = layered_network();
        let mut baked = BakedNetwork::new(&network);

        for (a, b) in [(0.0, 0.0), (1.0, 0.0), (0.5, -0.5), (2.0, 3.0)] {
            network.set_node_value(node_id(0), a);
            network.set_node_value(node_id(1), b);
            network.evaluate();

            baked.set_node_value(node_id(0), a);
            baked.set_node_value(node_id(1), b);
            baked.evaluate();

            assert_eq!(baked.node_value(node_id(3)), network.node(node_id(3)).value());
        }
    }

    #[test]
    fn zero_weight_edges_are_dropped() {
        let mut network = layered_network();
        network.set_edge_enabled(edge_id(1), false);
        network.set_weight(edge_id(3), 0.0);

        let baked = BakedNetwork::new(&network);
        assert_eq!(baked.edges.len(), 2);
    }

    #[test]
    fn feed_forward_sources_precede_consumers() {
        let network = layered_network();
        let baked = BakedNetwork::new(&network);

        for (index, node) in baked.nodes.iter().enumerate() {
            for edge in &baked.edges[node.start_edge..node.start_edge + node.num_edges] {
                assert!(edge.source < index);
            }
        }
    }

    #[test]
    fn activations_dedup_by_handle() {
        let network = layered_network();
        let baked = BakedNetwork::new(&network);

        // One shared sigmoid plus the identity slot for the inputs.
        assert_eq!(baked.activations.len(), 2);
    }

    #[test]
    fn recurrent_back_edge_reads_previous_step() {
        let mut nodes = BTreeMap::new();
        nodes.insert(node_id(0), Node::new(NodeType::Input));
        nodes.insert(node_id(1), Node::new(NodeType::Hidden));
        nodes.insert(node_id(2), Node::new(NodeType::Output));

        let mut edges = BTreeMap::new();
        edges.insert(edge_id(0), Edge::new(node_id(0), node_id(1), 1.0));
        edges.insert(edge_id(1), Edge::new(node_id(1), node_id(2), 1.0));
        edges.insert(edge_id(2), Edge::new(node_id(1), node_id(1), 1.0));

        let network = Network::new(
            NetworkKind::General,
            nodes,
            edges,
            vec![node_id(0)],
            vec![node_id(2)],
        );

        let mut baked = BakedNetwork::new(&network);
        assert!(baked.is_recurrent());

        baked.set_node_value(node_id(0), 1.0);
        baked.evaluate();
        assert_eq!(baked.node_value(node_id(2)), 1.0);

        // The self-loop accumulates: 1 (input) + 1 (previous step).
        baked.evaluate();
        assert_eq!(baked.node_value(node_id(2)), 2.0);
    }

    #[test]
    fn clear_resets_all_values() {
        let mut network = layered_network();
        network.set_node_value(node_id(0), 1.0);
        let mut baked = BakedNetwork::new(&network);
        baked.evaluate();
        baked.clear_node_values();
        assert_eq!(baked.node_value(node_id(3)), 0.0);
    }
}
