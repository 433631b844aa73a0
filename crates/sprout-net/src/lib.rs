//! Neural-network data model for the sprout neuroevolution library.
//!
//! This crate holds everything below the genome layer: typed ids and id
//! counters, activation functions and their registry, the random source, the
//! mutable network with its structural edit operations, the baked
//! evaluation-optimized snapshot, and the recurrent network evaluator.

pub mod activation;
pub mod baked;
pub mod edge;
pub mod evaluator;
pub mod ids;
pub mod network;
pub mod node;
pub mod random;

pub use activation::{
    Activation, ActivationFn, ActivationLibrary, ActivationProvider, ActivationRef,
    DefaultActivationProvider, RandomActivationProvider,
};
pub use baked::BakedNetwork;
pub use edge::Edge;
pub use evaluator::{Evaluable, EvalStrategy, NetworkEvaluator};
pub use ids::{
    ActivationId, EdgeId, GenerationId, GenomeId, Id, NodeId, SpeciesId, UniqueIdCounter,
};
pub use network::{EdgeIds, Network, NetworkKind, NodeData};
pub use node::{Node, NodeType};
pub use random::RandomSource;
