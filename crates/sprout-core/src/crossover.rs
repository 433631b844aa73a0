use crate::genome::Genome;
use sprout_net::edge::Edge;
use sprout_net::ids::{EdgeId, NodeId};
use sprout_net::network::Network;
use sprout_net::node::Node;
use sprout_net::random::RandomSource;
use std::collections::BTreeMap;
use tracing::warn;

/// Parameters of topology-preserving crossover.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrossoverParams {
    /// Probability of disabling an inherited edge when either parent carries
    /// it disabled.
    pub disabling_edge_rate: f32,
    /// Probability of taking a matching edge from the first parent.
    pub matching_edge_selection_rate: f32,
    /// Share of each generation produced by crossover.
    pub num_cross_over_genomes_rate: f32,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        CrossoverParams {
            disabling_edge_rate: 0.75,
            matching_edge_selection_rate: 0.5,
            num_cross_over_genomes_rate: 0.75,
        }
    }
}

/// The crossover operator: inherits matching edges at random, disjoint and
/// excess edges from the fitter parent (from both when the fitness is tied),
/// then repairs any cycle that inheritance re-introduced into a feed-forward
/// child.
#[derive(Debug, Clone, Default)]
pub struct Crossover {
    params: CrossoverParams,
}

impl Crossover {
    pub fn new(params: CrossoverParams) -> Self {
        Crossover { params }
    }

    pub fn params(&self) -> &CrossoverParams {
        &self.params
    }

    /// Cross two parents. `genome1` must be the fitter parent unless
    /// `same_fitness` is set.
    pub fn cross_over(
        &self,
        genome1: &Genome,
        genome2: &Genome,
        same_fitness: bool,
        random: &mut RandomSource,
    ) -> Genome {
        debug_assert!(genome1.validate() && genome2.validate());
        debug_assert_eq!(
            genome1.network().input_nodes().len(),
            genome2.network().input_nodes().len()
        );
        debug_assert_eq!(
            genome1.network().output_nodes().len(),
            genome2.network().output_nodes().len()
        );

        let allow_cycles = genome1.network().allows_cycles();
        let disabling_edge_rate = self.params.disabling_edge_rate;

        let mut new_edges: BTreeMap<EdgeId, Edge> = BTreeMap::new();
        let mut innovations: Vec<EdgeId> = Vec::new();

        // Edges re-enabled in the child although disabled in a parent; they
        // may have closed a cycle and are the second candidates for repair.
        let mut enabled_edges: Vec<EdgeId> = Vec::new();

        // Disjoint edges inherited under tied fitness; the first candidates
        // for repair.
        let mut disjoint_enabled_edges: Vec<EdgeId> = Vec::new();

        let mut inherit = |edge_id: EdgeId,
                           from: &Genome,
                           other: Option<&Genome>,
                           same_fitness_disjoint: bool,
                           random: &mut RandomSource| {
            let parent_edge = *from.network().edge(edge_id);
            let mut edge = parent_edge;
            edge.set_enabled(true);

            if !parent_edge.is_enabled() || other.is_some_and(|g| !g.is_edge_enabled(edge_id)) {
                if random.real01() < disabling_edge_rate {
                    edge.set_enabled(false);
                } else if !allow_cycles && !same_fitness_disjoint {
                    enabled_edges.push(edge_id);
                }
            }

            if !allow_cycles && same_fitness_disjoint && edge.is_enabled() {
                disjoint_enabled_edges.push(edge_id);
            }

            new_edges.insert(edge_id, edge);
            debug_assert!(innovations.last().is_none_or(|last| *last < edge_id));
            innovations.push(edge_id);
        };

        let innovations1 = genome1.innovations();
        let innovations2 = genome2.innovations();
        let mut idx1 = 0;
        let mut idx2 = 0;

        while idx1 < innovations1.len() && idx2 < innovations2.len() {
            let cur1 = innovations1[idx1];
            let cur2 = innovations2[idx2];

            if cur1 == cur2 {
                debug_assert_eq!(
                    genome1.network().in_node(cur1),
                    genome2.network().in_node(cur2)
                );
                debug_assert_eq!(
                    genome1.network().out_node(cur1),
                    genome2.network().out_node(cur2)
                );

                if random.real01() < self.params.matching_edge_selection_rate {
                    inherit(cur1, genome1, Some(genome2), false, random);
                } else {
                    inherit(cur2, genome2, Some(genome1), false, random);
                }
                idx1 += 1;
                idx2 += 1;
            } else if cur1 < cur2 {
                // Disjoint edges of the fitter parent are always taken.
                inherit(cur1, genome1, None, same_fitness, random);
                idx1 += 1;
            } else {
                // Disjoint edges of the weaker parent only survive a tie.
                if same_fitness {
                    inherit(cur2, genome2, None, same_fitness, random);
                }
                idx2 += 1;
            }
        }

        while idx1 < innovations1.len() {
            inherit(innovations1[idx1], genome1, None, same_fitness, random);
            idx1 += 1;
        }
        if same_fitness {
            while idx2 < innovations2.len() {
                inherit(innovations2[idx2], genome2, None, same_fitness, random);
                idx2 += 1;
            }
        }

        // Nodes: the endpoints of every inherited edge, preferring the fitter
        // parent's copy, plus the full input/output/bias layers of genome1.
        let mut new_nodes: BTreeMap<NodeId, Node> = BTreeMap::new();
        for edge in new_edges.values() {
            for node_id in [edge.in_node(), edge.out_node()] {
                if new_nodes.contains_key(&node_id) {
                    continue;
                }

                let node = genome1
                    .network()
                    .get_node(node_id)
                    .or_else(|| genome2.network().get_node(node_id))
                    .cloned();
                if let Some(node) = node {
                    new_nodes.insert(node_id, node);
                }
            }
        }

        for node_id in genome1
            .network()
            .input_nodes()
            .iter()
            .chain(genome1.network().output_nodes())
            .chain(genome1.bias_node().iter())
        {
            new_nodes
                .entry(*node_id)
                .or_insert_with(|| genome1.network().node(*node_id).clone());
        }

        let mut network = Network::new(
            genome1.network().kind(),
            new_nodes,
            new_edges,
            genome1.network().input_nodes().to_vec(),
            genome1.network().output_nodes().to_vec(),
        );

        // A feed-forward child can be cyclic after re-enabling or tie-breaking
        // inheritance; disable edges until the cycles are gone.
        if !network.allows_cycles() {
            while network.has_circular_edges() {
                let edge = disjoint_enabled_edges.pop().or_else(|| enabled_edges.pop());
                let Some(edge) = edge else {
                    warn!("cyclic crossover child with no repair candidates left");
                    debug_assert!(false);
                    break;
                };

                debug_assert!(network.edge(edge).is_enabled());
                network.set_edge_enabled(edge, false);
            }
        }

        let child = Genome::from_parts(genome1, network, innovations);
        debug_assert!(child.validate());
        child
    }
}
