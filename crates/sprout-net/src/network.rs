use crate::edge::Edge;
use crate::ids::{EdgeId, NodeId};
use crate::node::{Node, NodeType};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Per-node adjacency storage. Most NEAT nodes stay well under eight edges.
pub type EdgeIds = SmallVec<[EdgeId; 8]>;

/// Whether a network tolerates directed cycles.
///
/// A feed-forward network refuses any structural edit that would introduce a
/// cycle among enabled edges; a general network accepts them and resolves
/// recurrence at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetworkKind {
    General,
    FeedForward,
}

/// A node plus its adjacency, keyed by [NodeId] in the network's arena.
///
/// Adjacency is stored as edge ids, never as references, so cyclic graphs
/// carry no cyclic ownership.
#[derive(Debug, Clone)]
pub struct NodeData {
    node: Node,
    id: NodeId,
    incoming: EdgeIds,
    outgoing: EdgeIds,
}

impl NodeData {
    fn new(node: Node, id: NodeId) -> Self {
        NodeData {
            node,
            id,
            incoming: EdgeIds::new(),
            outgoing: EdgeIds::new(),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn incoming_edges(&self) -> &[EdgeId] {
        &self.incoming
    }

    pub fn outgoing_edges(&self) -> &[EdgeId] {
        &self.outgoing
    }
}

/// The mutable neural network: an arena of nodes and edges supporting
/// structural edits, cycle detection, and recurrence-aware evaluation.
///
/// Node and edge arenas are ordered maps, so iteration visits ascending ids
/// and a run's behavior is reproducible from its random seed.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: BTreeMap<NodeId, NodeData>,
    edges: BTreeMap<EdgeId, Edge>,
    input_nodes: Vec<NodeId>,
    output_nodes: Vec<NodeId>,
    kind: NetworkKind,
}

impl Network {
    pub fn new(
        kind: NetworkKind,
        nodes: BTreeMap<NodeId, Node>,
        edges: BTreeMap<EdgeId, Edge>,
        input_nodes: Vec<NodeId>,
        output_nodes: Vec<NodeId>,
    ) -> Self {
        let mut network = Network {
            nodes: nodes
                .into_iter()
                .map(|(id, node)| (id, NodeData::new(node, id)))
                .collect(),
            edges,
            input_nodes,
            output_nodes,
            kind,
        };

        let edge_list = network
            .edges
            .iter()
            .map(|(id, edge)| (*id, edge.in_node(), edge.out_node()))
            .collect::<Vec<_>>();

        for (edge_id, in_node, out_node) in edge_list {
            match network.nodes.get_mut(&in_node) {
                Some(data) => data.outgoing.push(edge_id),
                None => warn!("edge {} references unknown in-node {}", edge_id, in_node),
            }
            match network.nodes.get_mut(&out_node) {
                Some(data) => data.incoming.push(edge_id),
                None => warn!("edge {} references unknown out-node {}", edge_id, out_node),
            }
        }

        network
    }

    pub fn kind(&self) -> NetworkKind {
        self.kind
    }

    pub fn allows_cycles(&self) -> bool {
        self.kind == NetworkKind::General
    }

    //
    // Node queries
    //

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id).map(|data| &data.node)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id).map(|data| &mut data.node)
    }

    /// # Panics
    /// Panics when the id is unknown; use [Network::get_node] to probe.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[&id].node
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn incoming_edges(&self, id: NodeId) -> &[EdgeId] {
        self.nodes.get(&id).map(|d| d.incoming_edges()).unwrap_or(&[])
    }

    pub fn outgoing_edges(&self, id: NodeId) -> &[EdgeId] {
        self.nodes.get(&id).map(|d| d.outgoing_edges()).unwrap_or(&[])
    }

    /// True when any edge, in either direction, connects the two nodes.
    pub fn is_connected(&self, a: NodeId, b: NodeId) -> bool {
        self.incoming_edges(a)
            .iter()
            .any(|e| self.edges[e].in_node() == b)
            || self
                .outgoing_edges(a)
                .iter()
                .any(|e| self.edges[e].out_node() == b)
    }

    pub fn input_nodes(&self) -> &[NodeId] {
        &self.input_nodes
    }

    pub fn output_nodes(&self) -> &[NodeId] {
        &self.output_nodes
    }

    pub fn set_node_value(&mut self, id: NodeId, value: f32) {
        if let Some(data) = self.nodes.get_mut(&id) {
            data.node.set_value(value);
        }
    }

    pub fn set_all_node_values(&mut self, value: f32) {
        for data in self.nodes.values_mut() {
            data.node.set_value(value);
        }
    }

    //
    // Edge queries
    //

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, id: EdgeId) -> bool {
        self.edges.contains_key(&id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    /// # Panics
    /// Panics when the id is unknown; use [Network::get_edge] to probe.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[&id]
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> {
        self.edges.iter().map(|(id, edge)| (*id, edge))
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys().copied()
    }

    pub fn in_node(&self, edge: EdgeId) -> NodeId {
        self.edges[&edge].in_node()
    }

    pub fn out_node(&self, edge: EdgeId) -> NodeId {
        self.edges[&edge].out_node()
    }

    pub fn weight(&self, edge: EdgeId) -> f32 {
        self.edges[&edge].weight()
    }

    pub fn set_weight(&mut self, edge: EdgeId, weight: f32) {
        if let Some(e) = self.edges.get_mut(&edge) {
            e.set_weight(weight);
        }
    }

    pub fn set_edge_enabled(&mut self, edge: EdgeId, enabled: bool) {
        if let Some(e) = self.edges.get_mut(&edge) {
            e.set_enabled(enabled);
        }
    }

    //
    // Structural modification
    //

    /// Split the edge at `edge_id` with a new hidden node.
    ///
    /// The split edge is disabled; `new_in_edge` runs `in(e) -> n` with weight
    /// one and `new_out_edge` runs `n -> out(e)` with the split edge's weight,
    /// so a node with an identity activation preserves the network function.
    pub fn add_node_at(
        &mut self,
        edge_id: EdgeId,
        new_node_id: NodeId,
        new_in_edge_id: EdgeId,
        new_out_edge_id: EdgeId,
    ) -> bool {
        debug_assert!(!self.has_node(new_node_id));
        debug_assert!(!self.has_edge(new_in_edge_id) && !self.has_edge(new_out_edge_id));

        let (in_node, out_node, weight) = match self.edges.get_mut(&edge_id) {
            Some(edge) => {
                let endpoints = (edge.in_node(), edge.out_node(), edge.weight_raw());
                edge.set_enabled(false);
                endpoints
            }
            None => {
                warn!("cannot split {}: no such edge", edge_id);
                return false;
            }
        };

        self.edges
            .insert(new_in_edge_id, Edge::new(in_node, new_node_id, 1.0));
        self.edges
            .insert(new_out_edge_id, Edge::new(new_node_id, out_node, weight));

        let mut data = NodeData::new(Node::new(NodeType::Hidden), new_node_id);
        data.incoming.push(new_in_edge_id);
        data.outgoing.push(new_out_edge_id);
        self.nodes.insert(new_node_id, data);

        if let Some(data) = self.nodes.get_mut(&in_node) {
            data.outgoing.push(new_in_edge_id);
        }
        if let Some(data) = self.nodes.get_mut(&out_node) {
            data.incoming.push(new_out_edge_id);
        }

        debug_assert!(self.validate());
        true
    }

    /// Add an edge from `a` to `b`. Refuses when either node is unknown, when
    /// the pair is already connected in either direction, or when the edit is
    /// rejected by [Network::can_add_edge_at].
    pub fn add_edge_at(&mut self, a: NodeId, b: NodeId, new_edge_id: EdgeId, weight: f32) -> bool {
        debug_assert!(!self.has_edge(new_edge_id));

        if !self.has_node(a) || !self.has_node(b) {
            warn!("cannot connect {} -> {}: unknown node", a, b);
            return false;
        }

        if self.is_connected(a, b) {
            warn!("cannot connect {} -> {}: already connected", a, b);
            return false;
        }

        if !self.can_add_edge_at(a, b) {
            return false;
        }

        self.edges.insert(new_edge_id, Edge::new(a, b, weight));
        if let Some(data) = self.nodes.get_mut(&a) {
            data.outgoing.push(new_edge_id);
        }
        if let Some(data) = self.nodes.get_mut(&b) {
            data.incoming.push(new_edge_id);
        }

        debug_assert!(self.validate());
        true
    }

    /// True when an edge `a -> b` may be inserted. A general network accepts
    /// anything; a feed-forward network rejects edges into inputs or bias
    /// nodes, edges out of outputs, and edges that would close a cycle.
    pub fn can_add_edge_at(&self, a: NodeId, b: NodeId) -> bool {
        if self.allows_cycles() {
            return true;
        }

        if self.nodes[&b].node.is_input_or_bias() {
            return false;
        }

        if self.nodes[&a].node.node_type() == NodeType::Output {
            return false;
        }

        // Walk backward from a; finding b means a -> b closes a cycle.
        let mut stack = vec![a];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == b {
                return false;
            }
            if !seen.insert(current) {
                continue;
            }
            for edge_id in self.incoming_edges(current) {
                stack.push(self.edges[edge_id].in_node());
            }
        }

        true
    }

    /// Remove an edge unconditionally. Callers are expected not to isolate an
    /// output node; the mutation operator enforces that.
    pub fn remove_edge(&mut self, edge_id: EdgeId) {
        let Some(edge) = self.edges.remove(&edge_id) else {
            debug_assert!(false, "removing unknown edge");
            return;
        };

        if let Some(data) = self.nodes.get_mut(&edge.in_node()) {
            data.outgoing.retain(|e| *e != edge_id);
        }
        if let Some(data) = self.nodes.get_mut(&edge.out_node()) {
            data.incoming.retain(|e| *e != edge_id);
        }

        debug_assert!(self.validate());
    }

    /// Rename a node, rewriting every referencing edge and the input/output
    /// lists in place.
    pub fn replace_node_id(&mut self, old: NodeId, new: NodeId) {
        debug_assert!(self.has_node(old) && !self.has_node(new));

        let rewrites = self
            .edges
            .iter()
            .filter(|(_, e)| e.in_node() == old || e.out_node() == old)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        for edge_id in rewrites {
            let edge = self.edges[&edge_id];
            let in_node = if edge.in_node() == old { new } else { edge.in_node() };
            let out_node = if edge.out_node() == old { new } else { edge.out_node() };
            self.edges.insert(edge_id, edge.with_endpoints(in_node, out_node));
        }

        if let Some(mut data) = self.nodes.remove(&old) {
            data.id = new;
            self.nodes.insert(new, data);
        }

        for id in self.input_nodes.iter_mut().chain(self.output_nodes.iter_mut()) {
            if *id == old {
                *id = new;
            }
        }

        debug_assert!(self.validate());
    }

    /// Rename an edge, keeping weight, enabled state, and adjacency positions.
    pub fn replace_edge_id(&mut self, old: EdgeId, new: EdgeId) {
        debug_assert!(self.has_edge(old) && !self.has_edge(new));

        let Some(edge) = self.edges.remove(&old) else {
            return;
        };

        if let Some(data) = self.nodes.get_mut(&edge.in_node()) {
            for e in data.outgoing.iter_mut() {
                if *e == old {
                    *e = new;
                }
            }
        }
        if let Some(data) = self.nodes.get_mut(&edge.out_node()) {
            for e in data.incoming.iter_mut() {
                if *e == old {
                    *e = new;
                }
            }
        }

        self.edges.insert(new, edge);

        debug_assert!(self.validate());
    }

    //
    // Evaluation
    //

    /// Evaluate the network in place.
    ///
    /// Nodes without incoming edges keep their stored values and count as
    /// evaluated. Each output is resolved by a backward depth-first walk; a
    /// source that sits on the current walk path is read as-is, so a recurrent
    /// back-edge consumes the previous step's activated value instead of
    /// descending forever. Disabled edges contribute nothing.
    pub fn evaluate(&mut self) {
        debug_assert!(self.validate());

        let mut evaluated: HashSet<NodeId> = self
            .nodes
            .values()
            .filter(|data| data.incoming.is_empty())
            .map(|data| data.id)
            .collect();

        let cyclic = self.allows_cycles();

        let mut stack: Vec<NodeId> = Vec::with_capacity(4);
        let mut on_path: HashSet<NodeId> = HashSet::new();

        for output_index in 0..self.output_nodes.len() {
            let output_id = self.output_nodes[output_index];
            stack.clear();
            on_path.clear();
            stack.push(output_id);

            while let Some(&id) = stack.last() {
                if evaluated.contains(&id) {
                    stack.pop();
                    continue;
                }

                let mut sum = 0.0;
                let mut ready = true;

                for edge_index in 0..self.nodes[&id].incoming.len() {
                    let edge = self.edges[&self.nodes[&id].incoming[edge_index]];
                    let weight = edge.weight();
                    if weight == 0.0 {
                        continue;
                    }

                    let source = edge.in_node();
                    let revisits_path = cyclic && on_path.contains(&source);

                    if !revisits_path && !evaluated.contains(&source) {
                        on_path.insert(id);
                        stack.push(source);
                        ready = false;
                        continue;
                    }

                    if ready {
                        sum += self.nodes[&source].node.value() * weight;
                    }
                }

                if ready {
                    let data = self.nodes.get_mut(&id).unwrap();
                    data.node.set_value(sum);
                    evaluated.insert(id);
                    on_path.remove(&id);
                    stack.pop();
                }
            }
        }
    }

    //
    // Validation
    //

    /// Structural soundness predicate, used by debug assertions.
    pub fn validate(&self) -> bool {
        if self.nodes.len() < 2 || self.edges.is_empty() {
            return false;
        }

        for (edge_id, edge) in &self.edges {
            let Some(in_data) = self.nodes.get(&edge.in_node()) else {
                return false;
            };
            let Some(out_data) = self.nodes.get(&edge.out_node()) else {
                return false;
            };

            if in_data.outgoing.iter().filter(|e| **e == *edge_id).count() != 1 {
                return false;
            }
            if out_data.incoming.iter().filter(|e| **e == *edge_id).count() != 1 {
                return false;
            }
        }

        for data in self.nodes.values() {
            for edge_id in data.incoming.iter().chain(data.outgoing.iter()) {
                if !self.edges.contains_key(edge_id) {
                    return false;
                }
            }
            for edge_id in &data.incoming {
                if self.edges[edge_id].out_node() != data.id {
                    return false;
                }
            }
            for edge_id in &data.outgoing {
                if self.edges[edge_id].in_node() != data.id {
                    return false;
                }
            }
        }

        for id in &self.input_nodes {
            match self.nodes.get(id) {
                Some(data) if data.incoming.is_empty() => {}
                _ => return false,
            }
        }

        if !self.allows_cycles() && self.has_circular_edges() {
            return false;
        }

        true
    }

    /// True when the enabled edges contain a directed cycle.
    pub fn has_circular_edges(&self) -> bool {
        let mut checked: HashSet<NodeId> = HashSet::new();

        // Outputs first: that walk covers most of the graph. A second sweep
        // over all nodes catches cycles isolated from every output.
        for index in 0..self.output_nodes.len() {
            if self.has_circular_edges_from(self.output_nodes[index], &mut checked) {
                return true;
            }
        }

        let ids = self.nodes.keys().copied().collect::<Vec<_>>();
        for id in ids {
            if checked.contains(&id) {
                continue;
            }
            if self.has_circular_edges_from(id, &mut checked) {
                return true;
            }
        }

        false
    }

    fn has_circular_edges_from(&self, start: NodeId, checked: &mut HashSet<NodeId>) -> bool {
        let mut visiting: HashSet<NodeId> = HashSet::new();
        let mut stack = vec![start];

        while let Some(&current) = stack.last() {
            visiting.insert(current);

            let mut descended = false;
            for edge_id in self.incoming_edges(current) {
                let edge = &self.edges[edge_id];
                if !edge.is_enabled() {
                    continue;
                }

                let source = edge.in_node();
                if visiting.contains(&source) {
                    return true;
                }
                if checked.contains(&source) {
                    continue;
                }

                stack.push(source);
                descended = true;
                break;
            }

            if descended {
                continue;
            }

            visiting.remove(&current);
            checked.insert(current);
            stack.pop();
        }

        false
    }
}
