use sprout_net::ids::{EdgeId, NodeId, UniqueIdCounter};
use std::collections::HashMap;

/// Bookkeeper for node and innovation (edge) ids across one evolutionary run.
///
/// Two monotone id streams plus a history of every `(in_node, out_node)` pair
/// ever connected. Requesting an edge id for a pair that was seen before
/// returns the stored id, so genomes that independently grow the same edge
/// stay aligned for crossover and distance calculation. One counter must be
/// shared by every genome of a run, and never by two runs.
#[derive(Debug, Default)]
pub struct InnovationCounter {
    node_ids: UniqueIdCounter<NodeId>,
    edge_ids: UniqueIdCounter<EdgeId>,
    history: HashMap<(NodeId, NodeId), EdgeId>,
}

impl InnovationCounter {
    pub fn new() -> Self {
        InnovationCounter::default()
    }

    pub fn new_node_id(&mut self) -> NodeId {
        self.node_ids.next_id()
    }

    /// The edge id for connecting `in_node -> out_node`: the stored id when
    /// the pair exists in the history, a freshly allocated one otherwise.
    pub fn edge_id(&mut self, in_node: NodeId, out_node: NodeId) -> EdgeId {
        match self.history.get(&(in_node, out_node)) {
            Some(id) => *id,
            None => {
                let id = self.edge_ids.next_id();
                self.history.insert((in_node, out_node), id);
                id
            }
        }
    }

    pub fn num_innovations(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.node_ids.reset();
        self.edge_ids.reset();
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pair_reuses_the_id() {
        let mut counter = InnovationCounter::new();
        let a = counter.new_node_id();
        let b = counter.new_node_id();

        let first = counter.edge_id(a, b);
        let again = counter.edge_id(a, b);
        assert_eq!(first, again);
        assert_eq!(counter.num_innovations(), 1);
    }

    #[test]
    fn direction_matters() {
        let mut counter = InnovationCounter::new();
        let a = counter.new_node_id();
        let b = counter.new_node_id();

        let forward = counter.edge_id(a, b);
        let backward = counter.edge_id(b, a);
        assert_ne!(forward, backward);
    }

    #[test]
    fn reset_clears_the_history() {
        let mut counter = InnovationCounter::new();
        let a = counter.new_node_id();
        let b = counter.new_node_id();
        counter.edge_id(a, b);

        counter.reset();
        assert_eq!(counter.num_innovations(), 0);
        assert_eq!(counter.new_node_id(), a);
    }
}
