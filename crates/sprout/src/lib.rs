//! A Rust library for NEAT neuroevolution of augmenting topologies.
//!
//! sprout evolves both the topology and the connection weights of neural
//! networks: genomes grow nodes and edges through innovation-tracked
//! mutation, reproduce through topology-preserving crossover, and compete
//! within species so novel structure gets time to mature.
//!
//! # Example
//! ```
//! use sprout::prelude::*;
//!
//! let genome_config = GenomeConfig {
//!     num_input_nodes: 2,
//!     num_output_nodes: 1,
//!     create_bias_node: true,
//!     ..GenomeConfig::default()
//! };
//!
//! let fitness = |genome: &mut Genome| {
//!     evaluate_genome(genome, &[1.0, 0.0], 1.0);
//!     genome.output_values()[0].max(0.0)
//! };
//!
//! let mut config = GenerationConfig::new(20, genome_config, Box::new(fitness));
//! config.random = Some(RandomSource::from_seed(42));
//!
//! let mut generation = Generation::new(config).unwrap();
//! for _ in 0..5 {
//!     generation.evolve_generation();
//! }
//! assert_eq!(generation.generation_id().val(), 5);
//! ```

pub use sprout_core::*;
pub use sprout_error::{ErrorCode, SproutError, SproutResult, ensure, sprout_err};
pub use sprout_net::*;

pub fn init_logging() {
    pub use std::sync::Once;
    static INIT_LOGGING: Once = Once::new();

    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        std::panic::set_hook(Box::new(|info| {
            tracing::error!("PANIC: {}", info);
        }));

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}

pub mod prelude {
    pub use sprout_core::{
        CalcDistParams, Crossover, CrossoverParams, FitnessCalculator, Generation,
        GenerationConfig, GenerationParams, Genome, GenomeConfig, GenomeData, GenomeSelector,
        InnovationCounter, MutationParams, Mutator, SelectionMode, Species, evaluate_genome,
    };
    pub use sprout_error::{SproutError, SproutResult};
    pub use sprout_net::{
        Activation, ActivationLibrary, ActivationProvider, BakedNetwork,
        DefaultActivationProvider, EvalStrategy, Network, NetworkEvaluator, NetworkKind,
        RandomActivationProvider, RandomSource,
    };
}
