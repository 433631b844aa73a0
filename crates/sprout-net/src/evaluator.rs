use crate::baked::BakedNetwork;
use crate::ids::NodeId;
use crate::network::Network;

/// Networks the [NetworkEvaluator] can drive: one evaluation sweep plus
/// read access to activated node values.
pub trait Evaluable {
    fn evaluate_once(&mut self);
    fn activated_value(&self, id: NodeId) -> f32;
    fn is_recurrent(&self) -> bool;
}

impl Evaluable for Network {
    fn evaluate_once(&mut self) {
        self.evaluate();
    }

    fn activated_value(&self, id: NodeId) -> f32 {
        self.node(id).value()
    }

    fn is_recurrent(&self) -> bool {
        self.allows_cycles()
    }
}

impl Evaluable for BakedNetwork {
    fn evaluate_once(&mut self) {
        self.evaluate();
    }

    fn activated_value(&self, id: NodeId) -> f32 {
        self.node_value(id)
    }

    fn is_recurrent(&self) -> bool {
        BakedNetwork::is_recurrent(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EvalStrategy {
    /// Run a fixed number of sweeps.
    Iteration,
    /// Sweep until the output values stop moving, up to the iteration cap.
    Converge,
}

/// Drives repeated evaluation of a recurrent network. Non-recurrent networks
/// settle in a single sweep, so the strategy only matters when the network
/// contains back-edges.
#[derive(Debug, Clone)]
pub struct NetworkEvaluator {
    pub strategy: EvalStrategy,
    pub max_iterations: usize,
    pub convergence_threshold: f32,
    last_iterations: usize,
}

impl Default for NetworkEvaluator {
    fn default() -> Self {
        NetworkEvaluator {
            strategy: EvalStrategy::Iteration,
            max_iterations: 10,
            convergence_threshold: 1e-3,
            last_iterations: 0,
        }
    }
}

impl NetworkEvaluator {
    pub fn new(strategy: EvalStrategy) -> Self {
        NetworkEvaluator {
            strategy,
            ..NetworkEvaluator::default()
        }
    }

    /// Number of sweeps the most recent [NetworkEvaluator::evaluate] ran.
    pub fn last_iterations(&self) -> usize {
        self.last_iterations
    }

    pub fn evaluate<N: Evaluable>(&mut self, output_nodes: &[NodeId], network: &mut N) {
        self.last_iterations = 0;

        if !network.is_recurrent() {
            network.evaluate_once();
            self.last_iterations = 1;
            return;
        }

        let check_convergence = self.strategy == EvalStrategy::Converge;
        let mut previous = vec![0.0f32; output_nodes.len()];

        for iteration in 0..self.max_iterations {
            network.evaluate_once();
            self.last_iterations = iteration + 1;

            if !check_convergence {
                continue;
            }

            if iteration == 0 {
                for (slot, id) in previous.iter_mut().zip(output_nodes) {
                    *slot = network.activated_value(*id);
                }
                continue;
            }

            let mut converged = true;
            for (slot, id) in previous.iter_mut().zip(output_nodes) {
                let value = network.activated_value(*id);
                converged &= (*slot - value).abs() <= self.convergence_threshold;
                *slot = value;
            }

            if converged {
                break;
            }
        }
    }
}
