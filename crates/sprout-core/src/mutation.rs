use crate::genome::Genome;
use crate::innovation::InnovationCounter;
use sprout_net::activation::ActivationProvider;
use sprout_net::ids::{ActivationId, EdgeId, NodeId};
use sprout_net::node::NodeType;
use sprout_net::random::RandomSource;
use std::sync::Arc;

/// Parameters of the per-genome mutation procedure. All rates are
/// probabilities in `[0, 1]`.
#[derive(Clone)]
pub struct MutationParams {
    /// Per-edge probability of a weight perturbation.
    pub weight_mutation_rate: f32,
    /// Maximum relative perturbation: `w <- w * (1 + u)`, `u` in `[-p, p]`.
    pub weight_mutation_perturbation: f32,
    /// Probability that a perturbed edge instead receives a fresh weight.
    pub weight_mutation_new_val_rate: f32,
    /// Replacement and clamping range for mutated weights.
    pub weight_mutation_val_min: f32,
    pub weight_mutation_val_max: f32,
    pub add_node_mutation_rate: f32,
    pub add_edge_mutation_rate: f32,
    pub remove_edge_mutation_rate: f32,
    /// Probability of reassigning a random node's activation. Only effective
    /// when an activation provider is configured.
    pub change_activation_rate: f32,
    pub new_edge_min_weight: f32,
    pub new_edge_max_weight: f32,
    /// Share of each generation's unprotected genomes that get mutated.
    pub mutated_genomes_rate: f32,
    pub activation_provider: Option<Arc<dyn ActivationProvider>>,
}

impl Default for MutationParams {
    fn default() -> Self {
        MutationParams {
            weight_mutation_rate: 0.8,
            weight_mutation_perturbation: 0.2,
            weight_mutation_new_val_rate: 0.1,
            weight_mutation_val_min: -10.0,
            weight_mutation_val_max: 10.0,
            add_node_mutation_rate: 0.03,
            add_edge_mutation_rate: 0.05,
            remove_edge_mutation_rate: 0.005,
            change_activation_rate: 0.05,
            new_edge_min_weight: -10.0,
            new_edge_max_weight: 10.0,
            mutated_genomes_rate: 1.0,
            activation_provider: None,
        }
    }
}

/// An edge created during one mutation, fingerprinted by its endpoints.
#[derive(Debug, Clone, Copy)]
pub struct NewEdgeInfo {
    pub in_node: NodeId,
    pub out_node: NodeId,
    pub edge: EdgeId,
}

/// A node created by splitting an edge. `(previous_edge, activation)` is the
/// dedup signature: two splits of the same edge with the same activation in
/// one generation are the same innovation.
#[derive(Debug, Clone, Copy)]
pub struct NewNodeInfo {
    pub node: NodeId,
    pub activation: ActivationId,
    pub previous_edge: EdgeId,
    pub new_incoming_edge: EdgeId,
    pub new_outgoing_edge: EdgeId,
}

/// What one mutation did to one genome: at most three new edges and one new
/// node, kept for cross-genome deduplication within the generation.
#[derive(Debug, Clone, Default)]
pub struct MutationOut {
    pub new_edges: Vec<NewEdgeInfo>,
    pub new_node: Option<NewNodeInfo>,
}

impl MutationOut {
    fn record_edge(&mut self, genome: &Genome, edge: EdgeId) {
        debug_assert!(self.new_edges.len() < 3);
        self.new_edges.push(NewEdgeInfo {
            in_node: genome.network().in_node(edge),
            out_node: genome.network().out_node(edge),
            edge,
        });
    }
}

/// The mutation operator. Owns the per-generation log of structural
/// mutations; [Mutator::reset] must run once per generation before the first
/// [Mutator::apply].
pub struct Mutator {
    params: MutationParams,
    mutations: Vec<MutationOut>,
}

impl Mutator {
    pub fn new(params: MutationParams) -> Self {
        debug_assert!((0.0..=1.0).contains(&params.weight_mutation_rate));
        debug_assert!((0.0..=1.0).contains(&params.weight_mutation_perturbation));
        debug_assert!((0.0..=1.0).contains(&params.weight_mutation_new_val_rate));
        debug_assert!(params.weight_mutation_val_min <= params.weight_mutation_val_max);
        debug_assert!((0.0..=1.0).contains(&params.add_node_mutation_rate));
        debug_assert!((0.0..=1.0).contains(&params.add_edge_mutation_rate));
        debug_assert!(params.new_edge_min_weight <= params.new_edge_max_weight);

        Mutator {
            params,
            mutations: Vec::new(),
        }
    }

    pub fn params(&self) -> &MutationParams {
        &self.params
    }

    /// Forget the previous generation's mutation log.
    pub fn reset(&mut self) {
        self.mutations.clear();
    }

    /// Mutate one genome and reconcile its new structure against the
    /// generation's earlier mutations: a split with a known
    /// `(previous_edge, activation)` signature is renamed to the earlier ids.
    /// Edges between existing nodes need no such handling — the innovation
    /// counter already dedups them by endpoint pair.
    pub fn apply(
        &mut self,
        genome: &mut Genome,
        innovations: &mut InnovationCounter,
        random: &mut RandomSource,
    ) {
        let out = self.mutate(genome, innovations, random);

        let Some(new_node) = out.new_node else {
            return;
        };

        for earlier in &self.mutations {
            let Some(seen) = earlier.new_node else {
                continue;
            };

            if seen.previous_edge == new_node.previous_edge
                && seen.activation == new_node.activation
            {
                genome.reassign_node_id(new_node.node, seen.node);
                genome.reassign_innovation(new_node.new_incoming_edge, seen.new_incoming_edge);
                genome.reassign_innovation(new_node.new_outgoing_edge, seen.new_outgoing_edge);
                debug_assert!(genome.validate());
                return;
            }
        }

        self.mutations.push(out);
    }

    /// The five-step mutation procedure, in its fixed order: weights,
    /// activation, remove-edge, add-node, add-edge.
    pub fn mutate(
        &self,
        genome: &mut Genome,
        innovations: &mut InnovationCounter,
        random: &mut RandomSource,
    ) -> MutationOut {
        let mut out = MutationOut::default();

        self.mutate_weights(genome, random);
        let activation_mutated = self.mutate_activation(genome, innovations, random);
        self.remove_random_edge(genome, random);

        let add_node = random.real01() < self.params.add_node_mutation_rate;
        let add_edge = random.real01() < self.params.add_edge_mutation_rate;

        // Candidates are gathered before any structural change so one element
        // never receives two mutations in the same pass.
        let edge_candidates = if add_node {
            self.node_insertion_candidates(genome, activation_mutated)
        } else {
            Vec::new()
        };
        let pair_candidates = if add_edge {
            self.edge_insertion_candidates(genome, activation_mutated)
        } else {
            Vec::new()
        };

        if !edge_candidates.is_empty() {
            let edge = edge_candidates[random.integer(0, edge_candidates.len() - 1)];
            let activation = self
                .params
                .activation_provider
                .as_ref()
                .and_then(|p| p.get_activation(random));
            let activation_id = activation
                .as_ref()
                .map(|a| a.id())
                .unwrap_or(ActivationId::INVALID);

            if let Some((node, new_in, new_out)) = genome.add_node_at(edge, activation, innovations)
            {
                out.record_edge(genome, new_in);
                out.record_edge(genome, new_out);
                out.new_node = Some(NewNodeInfo {
                    node,
                    activation: activation_id,
                    previous_edge: edge,
                    new_incoming_edge: new_in,
                    new_outgoing_edge: new_out,
                });
            }
        }

        if !pair_candidates.is_empty() {
            let (a, b) = pair_candidates[random.integer(0, pair_candidates.len() - 1)];
            let weight = random.real(self.params.new_edge_min_weight, self.params.new_edge_max_weight);

            let mut added = genome.add_edge_at(a, b, weight, false, innovations);

            if added.is_none()
                && !genome.network().node(a).is_input_or_bias()
                && genome.network().node(b).node_type() != NodeType::Output
            {
                // The direct orientation most likely closes a cycle; the
                // flipped one may still fit.
                added = genome.add_edge_at(b, a, weight, false, innovations);
            }

            if let Some(edge) = added {
                out.record_edge(genome, edge);
            }
        }

        debug_assert!(genome.validate());
        out
    }

    fn mutate_weights(&self, genome: &mut Genome, random: &mut RandomSource) {
        let edges = genome.innovations().to_vec();
        for edge in edges {
            if random.real01() > self.params.weight_mutation_rate {
                continue;
            }

            if random.real01() <= self.params.weight_mutation_new_val_rate {
                let weight = random.real(
                    self.params.weight_mutation_val_min,
                    self.params.weight_mutation_val_max,
                );
                genome.set_edge_weight(edge, weight);
            } else {
                let perturbation = random.real(
                    -self.params.weight_mutation_perturbation,
                    self.params.weight_mutation_perturbation,
                );
                let weight = (genome.edge_weight(edge) * (1.0 + perturbation)).clamp(
                    self.params.weight_mutation_val_min,
                    self.params.weight_mutation_val_max,
                );
                genome.set_edge_weight(edge, weight);
            }
        }
    }

    fn mutate_activation(
        &self,
        genome: &mut Genome,
        innovations: &mut InnovationCounter,
        random: &mut RandomSource,
    ) -> Option<NodeId> {
        let provider = self.params.activation_provider.as_ref()?;

        if random.real01() >= self.params.change_activation_rate {
            return None;
        }

        let node_ids = genome.network().node_ids().collect::<Vec<_>>();
        let node_id = node_ids[random.integer(0, node_ids.len() - 1)];

        if genome.network().node(node_id).is_input_or_bias() {
            return None;
        }

        let activation = provider.get_activation(random)?;
        if genome.network().node(node_id).activation_id() == activation.id() {
            return None;
        }

        genome.set_activation(node_id, activation);
        Some(genome.reassign_node_and_edge_ids(node_id, innovations))
    }

    fn remove_random_edge(&self, genome: &mut Genome, random: &mut RandomSource) {
        if random.real01() >= self.params.remove_edge_mutation_rate {
            return;
        }

        if genome.innovations().len() <= 1 {
            return;
        }

        let index = random.integer(0, genome.innovations().len() - 1);
        let edge = genome.innovations()[index];

        // Never strip the last incoming edge of an output node.
        let out_node = genome.network().out_node(edge);
        if genome.network().node(out_node).node_type() != NodeType::Output
            || genome.network().incoming_edges(out_node).len() > 1
        {
            genome.remove_edge(edge);
        }
    }

    /// Enabled edges not originating at a bias node and not incident to the
    /// activation-mutated node.
    fn node_insertion_candidates(&self, genome: &Genome, skip: Option<NodeId>) -> Vec<EdgeId> {
        genome
            .network()
            .edges()
            .filter(|(_, edge)| {
                edge.is_enabled()
                    && genome.network().node(edge.in_node()).node_type() != NodeType::Bias
                    && skip.is_none_or(|s| edge.in_node() != s && edge.out_node() != s)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Unconnected node pairs eligible for a new edge, pre-oriented so that
    /// inputs and bias nodes only appear as sources and outputs as sinks.
    fn edge_insertion_candidates(
        &self,
        genome: &Genome,
        skip: Option<NodeId>,
    ) -> Vec<(NodeId, NodeId)> {
        let network = genome.network();
        let ids = network
            .node_ids()
            .filter(|id| skip != Some(*id))
            .collect::<Vec<_>>();

        let mut candidates = Vec::new();
        for (index, &n1) in ids.iter().enumerate() {
            let n1_type = network.node(n1).node_type();

            for &n2 in &ids[index + 1..] {
                let n2_type = network.node(n2).node_type();

                // No input-input, output-output, or input/bias pairs.
                if n1_type != NodeType::Hidden
                    && (n1_type == n2_type
                        || (network.node(n1).is_input_or_bias()
                            && network.node(n2).is_input_or_bias()))
                {
                    continue;
                }

                if network.is_connected(n1, n2) || network.is_connected(n2, n1) {
                    continue;
                }

                if n1_type == NodeType::Output || network.node(n2).is_input_or_bias() {
                    candidates.push((n2, n1));
                } else {
                    candidates.push((n1, n2));
                }
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::GenomeConfig;
    use sprout_net::activation::{Activation, ActivationLibrary, RandomActivationProvider};

    fn archetype(inputs: usize, outputs: usize) -> (Genome, InnovationCounter, RandomSource) {
        let cfg = GenomeConfig {
            num_input_nodes: inputs,
            num_output_nodes: outputs,
            ..GenomeConfig::default()
        };
        let mut counter = InnovationCounter::new();
        let mut random = RandomSource::from_seed(5);
        let genome = Genome::new(&cfg, &mut counter, &mut random).unwrap();
        (genome, counter, random)
    }

    fn rates_zero() -> MutationParams {
        MutationParams {
            weight_mutation_rate: 0.0,
            add_node_mutation_rate: 0.0,
            add_edge_mutation_rate: 0.0,
            remove_edge_mutation_rate: 0.0,
            change_activation_rate: 0.0,
            ..MutationParams::default()
        }
    }

    #[test]
    fn weight_mutation_respects_bounds() {
        let (mut genome, mut counter, mut random) = archetype(3, 2);
        let mutator = Mutator::new(MutationParams {
            weight_mutation_rate: 1.0,
            weight_mutation_new_val_rate: 1.0,
            weight_mutation_val_min: -2.0,
            weight_mutation_val_max: 2.0,
            ..rates_zero()
        });

        for _ in 0..20 {
            mutator.mutate(&mut genome, &mut counter, &mut random);
            for edge in genome.innovations() {
                let weight = genome.edge_weight_raw(*edge);
                assert!((-2.0..=2.0).contains(&weight));
            }
        }
    }

    #[test]
    fn perturbation_is_relative_and_clamped() {
        let (mut genome, mut counter, mut random) = archetype(1, 1);
        let mutator = Mutator::new(MutationParams {
            weight_mutation_rate: 1.0,
            weight_mutation_new_val_rate: 0.0,
            weight_mutation_perturbation: 0.5,
            weight_mutation_val_min: -10.0,
            weight_mutation_val_max: 10.0,
            ..rates_zero()
        });

        let edge = genome.innovations()[0];
        genome.set_edge_weight(edge, 1.0);
        mutator.mutate(&mut genome, &mut counter, &mut random);

        let weight = genome.edge_weight_raw(edge);
        assert!((0.5..1.5).contains(&weight));
    }

    #[test]
    fn add_node_splits_an_edge() {
        let (mut genome, mut counter, mut random) = archetype(1, 1);
        let mutator = Mutator::new(MutationParams {
            add_node_mutation_rate: 1.0,
            ..rates_zero()
        });

        let out = mutator.mutate(&mut genome, &mut counter, &mut random);
        let info = out.new_node.unwrap();

        assert_eq!(genome.network().num_nodes(), 3);
        assert_eq!(genome.network().num_edges(), 3);
        assert!(!genome.is_edge_enabled(info.previous_edge));
        assert_eq!(out.new_edges.len(), 2);
        assert!(genome.validate());
    }

    #[test]
    fn identical_add_edge_shares_the_innovation_id() {
        // One input, one output, one hidden node wired from the input only:
        // (input2 -> hidden) stays as the single eligible pair.
        let (genome, mut counter, mut random) = archetype(2, 1);
        let mut seeded = genome.clone();
        let split_edge = seeded.innovations()[0];
        seeded.add_node_at(split_edge, None, &mut counter).unwrap();

        let mutator = Mutator::new(MutationParams {
            add_edge_mutation_rate: 1.0,
            ..rates_zero()
        });

        let mut first = seeded.clone();
        let mut second = seeded.clone();

        let out1 = mutator.mutate(&mut first, &mut counter, &mut random);
        let out2 = mutator.mutate(&mut second, &mut counter, &mut random);

        assert_eq!(out1.new_edges.len(), 1);
        assert_eq!(out2.new_edges.len(), 1);
        assert_eq!(out1.new_edges[0].edge, out2.new_edges[0].edge);
        assert_eq!(out1.new_edges[0].in_node, out2.new_edges[0].in_node);
        assert_eq!(first.innovations(), second.innovations());
    }

    #[test]
    fn identical_splits_are_deduped_within_a_generation() {
        let (genome, mut counter, mut random) = archetype(1, 1);
        let mut mutator = Mutator::new(MutationParams {
            add_node_mutation_rate: 1.0,
            ..rates_zero()
        });
        mutator.reset();

        let mut first = genome.clone();
        let mut second = genome.clone();

        mutator.apply(&mut first, &mut counter, &mut random);
        mutator.apply(&mut second, &mut counter, &mut random);

        // Both genomes split the single edge; the second split is renamed to
        // match the first, so the innovation lists align.
        assert_eq!(first.innovations(), second.innovations());
        assert!(second.validate());
    }

    #[test]
    fn remove_edge_never_isolates_an_output() {
        let (mut genome, mut counter, mut random) = archetype(1, 1);
        let mutator = Mutator::new(MutationParams {
            remove_edge_mutation_rate: 1.0,
            ..rates_zero()
        });

        // A single edge is never removed.
        mutator.mutate(&mut genome, &mut counter, &mut random);
        assert_eq!(genome.network().num_edges(), 1);

        let (mut genome, mut counter, mut random) = archetype(2, 1);
        for _ in 0..10 {
            mutator.mutate(&mut genome, &mut counter, &mut random);
        }

        // However many removals fired, the output keeps an incoming edge.
        let output = genome.network().output_nodes()[0];
        assert!(!genome.network().incoming_edges(output).is_empty());
    }

    #[test]
    fn activation_mutation_rekeys_the_node() {
        let library = Arc::new(ActivationLibrary::cppn());
        let provider = Arc::new(RandomActivationProvider::new(library));

        let cfg = GenomeConfig {
            num_input_nodes: 1,
            num_output_nodes: 1,
            activation_provider: Some(Arc::new(sprout_net::activation::DefaultActivationProvider::new(
                Arc::new(Activation::sigmoid()),
            ))),
            ..GenomeConfig::default()
        };
        let mut counter = InnovationCounter::new();
        let mut random = RandomSource::from_seed(5);
        let genome = Genome::new(&cfg, &mut counter, &mut random).unwrap();

        let mutator = Mutator::new(MutationParams {
            change_activation_rate: 1.0,
            activation_provider: Some(provider),
            ..rates_zero()
        });

        let before = genome.innovations().to_vec();
        let mut mutated = genome.clone();
        for _ in 0..20 {
            mutator.mutate(&mut mutated, &mut counter, &mut random);
        }

        // Once the output's activation changes, its node id and every
        // incident edge id are reassigned, so the lists diverge.
        assert_ne!(mutated.innovations(), &before[..]);
        assert!(mutated.validate());
    }
}
