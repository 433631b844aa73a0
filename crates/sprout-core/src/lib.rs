//! The evolution layer of the sprout neuroevolution library.
//!
//! Builds NEAT on top of `sprout-net`: innovation bookkeeping shared across a
//! run, the genome and its genetic distance, structural and parametric
//! mutation with cross-generation deduplication, topology-preserving
//! crossover, distance-based speciation with stagnation tracking,
//! fitness-shared parent selection, and the generation loop tying them
//! together.

pub mod crossover;
pub mod fitness;
pub mod generation;
pub mod genome;
pub mod innovation;
pub mod mutation;
pub mod selector;
pub mod species;

pub use crossover::{Crossover, CrossoverParams};
pub use fitness::{FitnessCalculator, evaluate_genome};
pub use generation::{Generation, GenerationConfig, GenerationParams, GenomeData};
pub use genome::{CalcDistParams, Genome, GenomeConfig};
pub use innovation::InnovationCounter;
pub use mutation::{MutationOut, MutationParams, Mutator, NewEdgeInfo, NewNodeInfo};
pub use selector::{
    GenomeSelector, SelectionMode, SelectorKind, SpeciesBasedSelector, UniformSelector,
};
pub use species::{Species, SpeciesMember};
