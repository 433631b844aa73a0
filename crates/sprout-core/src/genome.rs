use crate::innovation::InnovationCounter;
use sprout_error::{SproutResult, ensure};
use sprout_net::activation::{ActivationProvider, ActivationRef};
use sprout_net::baked::BakedNetwork;
use sprout_net::edge::Edge;
use sprout_net::evaluator::NetworkEvaluator;
use sprout_net::ids::{EdgeId, NodeId};
use sprout_net::network::{Network, NetworkKind};
use sprout_net::node::{Node, NodeType};
use sprout_net::random::RandomSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Construction parameters for the minimal archetype genome: no hidden nodes,
/// inputs (and the bias, when present) fully connected to the outputs.
#[derive(Clone)]
pub struct GenomeConfig {
    pub num_input_nodes: usize,
    pub num_output_nodes: usize,
    pub create_bias_node: bool,
    pub bias_value: f32,
    pub activation_provider: Option<Arc<dyn ActivationProvider>>,
    pub network_kind: NetworkKind,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        GenomeConfig {
            num_input_nodes: 1,
            num_output_nodes: 1,
            create_bias_node: false,
            bias_value: 1.0,
            activation_provider: None,
            network_kind: NetworkKind::FeedForward,
        }
    }
}

impl GenomeConfig {
    pub fn validate(&self) -> SproutResult<()> {
        ensure!(
            self.num_input_nodes > 0,
            InvalidConfig: "a genome needs at least one input node"
        );
        ensure!(
            self.num_output_nodes > 0,
            InvalidConfig: "a genome needs at least one output node"
        );
        Ok(())
    }
}

/// Parameters of the genetic distance between two genomes.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CalcDistParams {
    /// Factor for the number of disjoint and excess edges.
    pub disjoint_factor: f32,
    /// Factor for weight differences of matching edges.
    pub weight_factor: f32,
    /// Minimum edge count before the disjoint term is normalized by size.
    pub edge_normalization_threshold: usize,
}

impl Default for CalcDistParams {
    fn default() -> Self {
        CalcDistParams {
            disjoint_factor: 1.0,
            weight_factor: 0.4,
            edge_normalization_threshold: 20,
        }
    }
}

/// A NEAT genome: a mutable network plus its innovation history.
///
/// The innovation list mirrors the network's edge ids, sorted ascending. A
/// baked snapshot of the network is cached between structural edits; any edit
/// marks the cache dirty and the next evaluation rebakes.
#[derive(Debug, Clone)]
pub struct Genome {
    network: Network,
    bias_node: Option<NodeId>,
    innovations: Vec<EdgeId>,
    baked: Option<BakedNetwork>,
    needs_rebake: bool,
}

impl Genome {
    /// Build the archetype genome described by `config`, drawing every id
    /// from the shared innovation counter.
    pub fn new(
        config: &GenomeConfig,
        innovations: &mut InnovationCounter,
        random: &mut RandomSource,
    ) -> SproutResult<Genome> {
        config.validate()?;

        let mut nodes = BTreeMap::new();
        let mut input_nodes = Vec::with_capacity(config.num_input_nodes);
        let mut output_nodes = Vec::with_capacity(config.num_output_nodes);

        for _ in 0..config.num_input_nodes {
            let id = innovations.new_node_id();
            nodes.insert(id, Node::new(NodeType::Input));
            input_nodes.push(id);
        }

        let bias_node = if config.create_bias_node {
            let id = innovations.new_node_id();
            let mut node = Node::new(NodeType::Bias);
            node.set_value(config.bias_value);
            nodes.insert(id, node);
            Some(id)
        } else {
            None
        };

        for _ in 0..config.num_output_nodes {
            let id = innovations.new_node_id();
            let mut node = Node::new(NodeType::Output);
            if let Some(provider) = &config.activation_provider {
                node.set_activation(provider.get_activation(random));
            }
            nodes.insert(id, node);
            output_nodes.push(id);
        }

        // Full bipartite wiring, keyed through the innovation counter so a
        // second archetype built from the same counter aligns edge ids.
        let mut edges = BTreeMap::new();
        let mut innovation_list =
            Vec::with_capacity((config.num_input_nodes + 1) * config.num_output_nodes);
        for in_node in input_nodes.iter().chain(bias_node.iter()) {
            for out_node in &output_nodes {
                let eid = innovations.edge_id(*in_node, *out_node);
                edges.insert(eid, Edge::new(*in_node, *out_node, 1.0));
                innovation_list.push(eid);
            }
        }
        innovation_list.sort_unstable();

        Ok(Genome {
            network: Network::new(config.network_kind, nodes, edges, input_nodes, output_nodes),
            bias_node,
            innovations: innovation_list,
            baked: None,
            needs_rebake: true,
        })
    }

    /// Assemble a genome from an already-built network and its ordered
    /// innovation list. Used by crossover.
    pub(crate) fn from_parts(source: &Genome, network: Network, innovations: Vec<EdgeId>) -> Genome {
        debug_assert_eq!(network.num_edges(), innovations.len());
        debug_assert_eq!(
            network.input_nodes().len(),
            source.network.input_nodes().len()
        );

        Genome {
            network,
            bias_node: source.bias_node,
            innovations,
            baked: None,
            needs_rebake: true,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn bias_node(&self) -> Option<NodeId> {
        self.bias_node
    }

    /// The edge ids of this genome, sorted ascending by innovation id.
    pub fn innovations(&self) -> &[EdgeId] {
        &self.innovations
    }

    //
    // Edge interface
    //

    pub fn edge_weight(&self, edge: EdgeId) -> f32 {
        self.network.weight(edge)
    }

    pub fn edge_weight_raw(&self, edge: EdgeId) -> f32 {
        self.network.edge(edge).weight_raw()
    }

    pub fn set_edge_weight(&mut self, edge: EdgeId, weight: f32) {
        self.network.set_weight(edge, weight);
        self.needs_rebake = true;
    }

    pub fn is_edge_enabled(&self, edge: EdgeId) -> bool {
        self.network.edge(edge).is_enabled()
    }

    pub fn set_edge_enabled(&mut self, edge: EdgeId, enabled: bool) {
        self.network.set_edge_enabled(edge, enabled);
        self.needs_rebake = true;
    }

    pub fn num_enabled_edges(&self) -> usize {
        self.network.edges().filter(|(_, e)| e.is_enabled()).count()
    }

    //
    // Node values
    //

    pub fn clear_node_values(&mut self) {
        self.network.set_all_node_values(0.0);
        if let (Some(baked), false) = (&mut self.baked, self.needs_rebake) {
            baked.clear_node_values();
        }
    }

    /// Set the input layer, and the bias when present.
    pub fn set_input_node_values(&mut self, values: &[f32], bias_value: f32) {
        debug_assert_eq!(values.len(), self.network.input_nodes().len());

        if self.bias_node.is_some() {
            self.set_bias_node_value(bias_value);
        }

        for index in 0..values.len().min(self.network.input_nodes().len()) {
            let node = self.network.input_nodes()[index];
            self.network.set_node_value(node, values[index]);
            if let (Some(baked), false) = (&mut self.baked, self.needs_rebake) {
                baked.set_node_value(node, values[index]);
            }
        }
    }

    pub fn set_bias_node_value(&mut self, value: f32) {
        let Some(bias) = self.bias_node else {
            warn!("genome has no bias node");
            return;
        };

        self.network.set_node_value(bias, value);
        if let (Some(baked), false) = (&mut self.baked, self.needs_rebake) {
            baked.set_node_value(bias, value);
        }
    }

    /// The activated value of a node, read from the baked cache when fresh.
    pub fn node_value(&self, id: NodeId) -> f32 {
        match (&self.baked, self.needs_rebake) {
            (Some(baked), false) if baked.has_node(id) => baked.node_value(id),
            _ => self.network.node(id).value(),
        }
    }

    /// Activated values of the output layer, in output order.
    pub fn output_values(&self) -> Vec<f32> {
        self.network
            .output_nodes()
            .iter()
            .map(|id| self.node_value(*id))
            .collect()
    }

    //
    // Activations
    //

    pub fn set_activation(&mut self, node: NodeId, activation: ActivationRef) {
        if let Some(n) = self.network.get_node_mut(node) {
            debug_assert!(!n.is_input_or_bias());
            n.set_activation(Some(activation));
            self.needs_rebake = true;
        }
    }

    pub fn set_activation_all(&mut self, activation: &ActivationRef) {
        let targets = self
            .network
            .nodes()
            .filter(|d| {
                matches!(d.node().node_type(), NodeType::Hidden | NodeType::Output)
            })
            .map(|d| d.id())
            .collect::<Vec<_>>();

        for id in targets {
            self.set_activation(id, Arc::clone(activation));
        }
    }

    //
    // Structural modification
    //

    /// Split an edge with a new hidden node carrying the given activation.
    /// Ids come from the innovation counter, keyed on the two new endpoint
    /// pairs. Returns `(node, incoming_edge, outgoing_edge)`.
    pub fn add_node_at(
        &mut self,
        edge: EdgeId,
        activation: Option<ActivationRef>,
        innovations: &mut InnovationCounter,
    ) -> Option<(NodeId, EdgeId, EdgeId)> {
        if !self.network.has_edge(edge) {
            warn!("cannot split {}: genome has no such edge", edge);
            return None;
        }

        let new_node = innovations.new_node_id();
        let in_node = self.network.in_node(edge);
        let out_node = self.network.out_node(edge);

        let new_in_edge = innovations.edge_id(in_node, new_node);
        let new_out_edge = innovations.edge_id(new_node, out_node);

        if !self.network.add_node_at(edge, new_node, new_in_edge, new_out_edge) {
            return None;
        }

        if let Some(node) = self.network.get_node_mut(new_node) {
            node.set_activation(activation);
        }

        self.insert_innovation(new_in_edge);
        self.insert_innovation(new_out_edge);
        self.needs_rebake = true;

        debug_assert!(self.validate());
        Some((new_node, new_in_edge, new_out_edge))
    }

    /// Connect two nodes with a new edge keyed on `(a, b)`. When the direct
    /// orientation is refused by a feed-forward network and `try_flipped` is
    /// set, retries with the endpoints swapped (keyed on `(b, a)`).
    pub fn add_edge_at(
        &mut self,
        a: NodeId,
        b: NodeId,
        weight: f32,
        try_flipped: bool,
        innovations: &mut InnovationCounter,
    ) -> Option<EdgeId> {
        if self.network.is_connected(a, b) {
            return None;
        }

        let edge = innovations.edge_id(a, b);
        if self.network.add_edge_at(a, b, edge, weight) {
            self.insert_innovation(edge);
            self.needs_rebake = true;
            debug_assert!(self.validate());
            return Some(edge);
        }

        if try_flipped {
            let flipped = innovations.edge_id(b, a);
            if self.network.add_edge_at(b, a, flipped, weight) {
                self.insert_innovation(flipped);
                self.needs_rebake = true;
                debug_assert!(self.validate());
                return Some(flipped);
            }
        }

        None
    }

    pub fn remove_edge(&mut self, edge: EdgeId) {
        debug_assert!(self.network.has_edge(edge));

        self.network.remove_edge(edge);
        if let Ok(index) = self.innovations.binary_search(&edge) {
            self.innovations.remove(index);
        }
        self.needs_rebake = true;

        debug_assert!(self.validate());
    }

    /// Rename a node. Used when two genomes of one generation picked the same
    /// structural mutation and must converge on one id.
    pub fn reassign_node_id(&mut self, old: NodeId, new: NodeId) {
        debug_assert!(self.network.has_node(old) && !self.network.has_node(new));

        self.network.replace_node_id(old, new);
        if self.bias_node == Some(old) {
            self.bias_node = Some(new);
        }
        self.needs_rebake = true;

        debug_assert!(self.validate());
    }

    /// Rename an edge id after the fact, keeping the innovation list sorted.
    pub fn reassign_innovation(&mut self, old: EdgeId, new: EdgeId) {
        debug_assert!(self.network.has_edge(old) && !self.network.has_edge(new));

        self.network.replace_edge_id(old, new);
        if let Ok(index) = self.innovations.binary_search(&old) {
            self.innovations.remove(index);
        }
        self.insert_innovation(new);
        self.needs_rebake = true;

        debug_assert!(self.validate());
    }

    /// Give a node a fresh id and re-key every incident edge through the
    /// innovation counter. Activation mutation uses this so that distinct
    /// activation events on the same topology count as distinct innovations.
    pub fn reassign_node_and_edge_ids(
        &mut self,
        node: NodeId,
        innovations: &mut InnovationCounter,
    ) -> NodeId {
        let new_node = innovations.new_node_id();
        self.reassign_node_id(node, new_node);

        let incoming = self.network.incoming_edges(new_node).to_vec();
        for edge in incoming {
            let new_edge = innovations.edge_id(self.network.in_node(edge), new_node);
            self.reassign_innovation(edge, new_edge);
        }

        let outgoing = self.network.outgoing_edges(new_node).to_vec();
        for edge in outgoing {
            let new_edge = innovations.edge_id(new_node, self.network.out_node(edge));
            self.reassign_innovation(edge, new_edge);
        }

        new_node
    }

    fn insert_innovation(&mut self, edge: EdgeId) {
        if let Err(index) = self.innovations.binary_search(&edge) {
            self.innovations.insert(index, edge);
        }
    }

    //
    // Evaluation
    //

    /// Rebake the cached evaluation form when a structural edit invalidated it.
    pub fn bake(&mut self) {
        if self.needs_rebake || self.baked.is_none() {
            self.baked = Some(BakedNetwork::new(&self.network));
            self.needs_rebake = false;
        }
    }

    /// One evaluation sweep over the baked form.
    pub fn evaluate(&mut self) {
        self.bake();
        if let Some(baked) = &mut self.baked {
            baked.evaluate();
        }
    }

    /// Evaluation driven by an explicit evaluator, for recurrent genomes that
    /// need iteration or convergence semantics.
    pub fn evaluate_with(&mut self, evaluator: &mut NetworkEvaluator) {
        self.bake();
        let outputs = self.network.output_nodes().to_vec();
        if let Some(baked) = &mut self.baked {
            evaluator.evaluate(&outputs, baked);
        }
    }

    //
    // Distance
    //

    /// Genetic distance: matching edges compare raw weights; non-matching ids
    /// count as disjoint or excess, normalized by the larger edge count once
    /// the genomes grow past the threshold.
    pub fn calc_distance(g1: &Genome, g2: &Genome, params: &CalcDistParams) -> f32 {
        let mut disjoint_factor = params.disjoint_factor;
        let num_edges = g1.innovations.len().max(g2.innovations.len());
        if num_edges >= params.edge_normalization_threshold {
            disjoint_factor /= num_edges as f32;
        }

        let mut num_disjoint = 0usize;
        let mut num_matching = 0usize;
        let mut sum_weight_diffs = 0.0f32;

        let innovations1 = &g1.innovations;
        let innovations2 = &g2.innovations;
        let mut idx1 = 0;
        let mut idx2 = 0;
        while idx1 < innovations1.len() && idx2 < innovations2.len() {
            let cur1 = innovations1[idx1];
            let cur2 = innovations2[idx2];

            if cur1 == cur2 {
                sum_weight_diffs += (g1.edge_weight_raw(cur1) - g2.edge_weight_raw(cur2)).abs();
                num_matching += 1;
                idx1 += 1;
                idx2 += 1;
            } else {
                if cur1 < cur2 {
                    idx1 += 1;
                } else {
                    idx2 += 1;
                }
                num_disjoint += 1;
            }
        }

        num_disjoint += innovations1.len() - idx1;
        num_disjoint += innovations2.len() - idx2;

        let weight_term = if num_matching > 0 {
            params.weight_factor * sum_weight_diffs / num_matching as f32
        } else {
            0.0
        };

        disjoint_factor * num_disjoint as f32 + weight_term
    }

    //
    // Validation
    //

    pub fn validate(&self) -> bool {
        if !self.network.validate() {
            return false;
        }

        if self.innovations.is_empty() || self.innovations.len() != self.network.num_edges() {
            return false;
        }

        let mut prev = self.innovations[0];
        if !self.network.has_edge(prev) {
            return false;
        }
        for cur in &self.innovations[1..] {
            if !self.network.has_edge(*cur) || prev >= *cur {
                return false;
            }
            prev = *cur;
        }

        if let Some(bias) = self.bias_node {
            match self.network.get_node(bias) {
                Some(node) if node.node_type() == NodeType::Bias => {}
                _ => return false,
            }
        }

        true
    }
}
