use sprout_core::{
    CalcDistParams, Generation, GenerationConfig, GenerationParams, Genome, GenomeConfig,
    GenomeData, GenomeSelector, InnovationCounter, MutationParams, SelectionMode, Species,
    SpeciesBasedSelector, evaluate_genome,
};
use sprout_net::activation::{Activation, DefaultActivationProvider};
use sprout_net::ids::{GenomeId, SpeciesId, UniqueIdCounter};
use sprout_net::random::RandomSource;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const XOR_PATTERNS: [([f32; 2], f32); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

fn xor_fitness(genome: &mut Genome) -> f32 {
    let mut error_sum = 0.0;
    for (inputs, target) in XOR_PATTERNS {
        evaluate_genome(genome, &inputs, 1.0);
        error_sum += (target - genome.output_values()[0]).abs();
    }
    let fitness = 4.0 - error_sum;
    fitness * fitness
}

fn xor_config(seed: u64) -> GenerationConfig {
    let provider = Arc::new(DefaultActivationProvider::new(Arc::new(
        Activation::sigmoid(),
    )));

    let genome_config = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        create_bias_node: true,
        activation_provider: Some(provider.clone()),
        ..GenomeConfig::default()
    };

    let mut config = GenerationConfig::new(150, genome_config, Box::new(xor_fitness));
    config.mutation_params = MutationParams {
        activation_provider: Some(provider),
        ..MutationParams::default()
    };
    config.random = Some(RandomSource::from_seed(seed));
    config
}

/// Mutation that only nudges weights, so topology and distances stay put.
fn weights_only_mutation() -> MutationParams {
    MutationParams {
        weight_mutation_rate: 1.0,
        weight_mutation_new_val_rate: 0.0,
        weight_mutation_perturbation: 0.05,
        add_node_mutation_rate: 0.0,
        add_edge_mutation_rate: 0.0,
        remove_edge_mutation_rate: 0.0,
        change_activation_rate: 0.0,
        ..MutationParams::default()
    }
}

#[test]
fn xor_population_evolves_consistently() {
    let mut generation = Generation::new(xor_config(1234)).unwrap();

    assert_eq!(generation.num_genomes(), 150);
    assert_eq!(generation.genomes().len(), 150);
    assert_eq!(generation.species().len(), 1);

    let mut best_seen = 0.0f32;
    for _ in 0..15 {
        generation.evolve_generation();

        assert_eq!(generation.genomes().len(), 150);
        assert!(!generation.species().is_empty());
        assert!(generation.species().len() <= 150);

        for data in generation.genomes() {
            assert!(data.genome().validate());
            assert!(data.fitness().is_finite());
        }

        best_seen = best_seen.max(generation.best_genome().unwrap().fitness());
    }

    assert_eq!(generation.generation_id().val(), 15);
    // XOR fitness is (4 - error)^2; anything past the all-zero guess shows
    // selection is pulling in the right direction.
    assert!(best_seen > 4.0, "best fitness stayed at {}", best_seen);
}

#[test]
fn xor_run_is_reproducible_from_its_seed() {
    let mut first = Generation::new(xor_config(77)).unwrap();
    let mut second = Generation::new(xor_config(77)).unwrap();

    for _ in 0..3 {
        first.evolve_generation();
        second.evolve_generation();
    }

    let fitness1: Vec<f32> = first.genomes().iter().map(|g| g.fitness()).collect();
    let fitness2: Vec<f32> = second.genomes().iter().map(|g| g.fitness()).collect();
    assert_eq!(fitness1, fitness2);
    assert_eq!(first.species().len(), second.species().len());
}

#[test]
fn identical_clones_stay_in_one_species() {
    let genome_config = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        create_bias_node: true,
        ..GenomeConfig::default()
    };

    let fitness = |genome: &mut Genome| {
        evaluate_genome(genome, &[1.0, 1.0], 1.0);
        genome.output_values()[0].abs() + 0.1
    };

    let mut config = GenerationConfig::new(150, genome_config, Box::new(fitness));
    // Identical initial weights: the range collapses to a point.
    config.min_weight = 0.5;
    config.max_weight = 0.5;
    config.mutation_params = weights_only_mutation();
    config.random = Some(RandomSource::from_seed(9));

    let mut generation = Generation::new(config).unwrap();
    assert_eq!(generation.species().len(), 1);

    generation.evolve_generation();
    assert_eq!(generation.species().len(), 1);

    for _ in 0..9 {
        generation.evolve_generation();
    }
    assert!(!generation.species().is_empty());
    assert!(generation.species().len() <= 150);
}

#[test]
fn champion_is_carried_unmodified() {
    let genome_config = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        ..GenomeConfig::default()
    };

    let fitness = |genome: &mut Genome| {
        evaluate_genome(genome, &[1.0, -1.0], 0.0);
        genome.output_values()[0] + 10.0
    };

    let mut config = GenerationConfig::new(10, genome_config, Box::new(fitness));
    config.min_members_in_species_to_copy_champion = 2;
    config.mutation_params = weights_only_mutation();
    config.random = Some(RandomSource::from_seed(31));

    let mut generation = Generation::new(config).unwrap();
    generation.evolve_generation();

    for _ in 0..5 {
        let best = generation.best_genome().unwrap();
        let best_innovations = best.genome().innovations().to_vec();
        let best_weights: Vec<f32> = best_innovations
            .iter()
            .map(|e| best.genome().edge_weight_raw(*e))
            .collect();

        generation.evolve_generation();

        let carried = generation.genomes().iter().find(|data| {
            data.is_protected()
                && data.genome().innovations() == best_innovations
                && best_innovations
                    .iter()
                    .zip(&best_weights)
                    .all(|(e, w)| data.genome().edge_weight_raw(*e) == *w)
        });
        assert!(carried.is_some(), "champion was not carried unmodified");
    }
}

#[test]
fn all_zero_fitness_degrades_to_uniform_selection() {
    let genome_config = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        ..GenomeConfig::default()
    };

    let mut config = GenerationConfig::new(20, genome_config, Box::new(|_: &mut Genome| 0.0));
    config.random = Some(RandomSource::from_seed(8));

    let mut generation = Generation::new(config).unwrap();
    for _ in 0..3 {
        generation.evolve_generation();
        assert_eq!(generation.genomes().len(), 20);
    }
}

#[test]
fn stagnant_species_are_removed_but_never_the_last() {
    let genome_config = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        ..GenomeConfig::default()
    };

    let mut config = GenerationConfig::new(30, genome_config, Box::new(|_: &mut Genome| 1.0));
    config.mutation_params = weights_only_mutation();
    config.generation_params = GenerationParams {
        max_stagnant_count: 2,
        ..GenerationParams::default()
    };
    config.random = Some(RandomSource::from_seed(3));

    let mut generation = Generation::new(config).unwrap();

    // Constant fitness stagnates immediately; the engine must keep one
    // species alive rather than emptying the map.
    for _ in 0..8 {
        generation.evolve_generation();
        assert!(!generation.species().is_empty());
        assert_eq!(generation.genomes().len(), 30);
    }
}

fn selection_fixture(
    fitnesses: &[(u32, f32)],
) -> (
    Vec<GenomeData>,
    BTreeMap<SpeciesId, Species>,
    HashMap<GenomeId, SpeciesId>,
) {
    let cfg = GenomeConfig {
        num_input_nodes: 2,
        num_output_nodes: 1,
        ..GenomeConfig::default()
    };
    let mut counter = InnovationCounter::new();
    let mut random = RandomSource::from_seed(4);
    let genome = Genome::new(&cfg, &mut counter, &mut random).unwrap();

    let mut species_ids = UniqueIdCounter::<SpeciesId>::new();
    let mut genomes = Vec::new();
    let mut species: BTreeMap<SpeciesId, Species> = BTreeMap::new();
    let mut genome_species = HashMap::new();

    let mut current_group = u32::MAX;
    let mut current_species = SpeciesId::INVALID;
    for (index, (group, fitness)) in fitnesses.iter().enumerate() {
        let mut data = GenomeData::new(genome.clone(), GenomeId::new(index as u32));
        data.set_fitness(*fitness);

        if *group != current_group {
            current_group = *group;
            current_species = species_ids.next_id();
            species.insert(current_species, Species::new(genome.clone()));
        }

        species
            .get_mut(&current_species)
            .unwrap()
            .add_genome(data.genome(), *fitness);
        genome_species.insert(data.id(), current_species);
        genomes.push(data);
    }

    (genomes, species, genome_species)
}

#[test]
fn species_selection_follows_shared_fitness() {
    // One species of four weak genomes against one strong loner. Shared
    // fitness makes the loner twice as attractive as the whole crowd.
    let (genomes, species, genome_species) = selection_fixture(&[
        (0, 1.0),
        (0, 1.0),
        (0, 1.0),
        (0, 1.0),
        (1, 2.0),
    ]);

    let mut selector = SpeciesBasedSelector::new(&genomes, &species, &genome_species, 0.0);
    assert_eq!(selector.num_genomes(), 5);

    let mut random = RandomSource::from_seed(99);
    assert!(selector.pre_selection(300, SelectionMode::One));

    let mut by_species = [0usize; 2];
    for _ in 0..300 {
        let selected = selector.select_genome(&mut random).unwrap();
        by_species[genome_species[&selected.id()].val() as usize] += 1;
    }
    selector.post_selection();

    // Quotas are proportional to summed shared fitness (1.0 vs 2.0).
    assert!(by_species[1] > by_species[0]);
    assert_eq!(by_species[0] + by_species[1], 300);
}

#[test]
fn higher_fitness_members_are_selected_more_often() {
    let (genomes, species, genome_species) = selection_fixture(&[(0, 1.0), (0, 6.0)]);

    let mut selector = SpeciesBasedSelector::new(&genomes, &species, &genome_species, 0.0);
    let mut random = RandomSource::from_seed(12);
    assert!(selector.pre_selection(500, SelectionMode::One));

    let mut counts = [0usize; 2];
    for _ in 0..500 {
        let selected = selector.select_genome(&mut random).unwrap();
        counts[selected.id().val() as usize] += 1;
    }
    selector.post_selection();

    assert!(counts[1] > counts[0] * 2);
}

#[test]
fn two_genome_selection_returns_distinct_parents() {
    let (genomes, species, genome_species) =
        selection_fixture(&[(0, 1.0), (0, 2.0), (0, 3.0), (0, 4.0)]);

    let mut selector = SpeciesBasedSelector::new(&genomes, &species, &genome_species, 0.001);
    let mut random = RandomSource::from_seed(5);
    assert!(selector.pre_selection(50, SelectionMode::Two));

    for _ in 0..50 {
        let (first, second) = selector.select_two_genomes(&mut random).unwrap();
        assert_ne!(first.id(), second.id());
    }
    selector.post_selection();
}

#[test]
fn distance_aligns_genomes_evolved_from_one_counter() {
    // Genomes descended from one archetype keep comparable innovation lists
    // even after independent structural mutations.
    let cfg = GenomeConfig {
        num_input_nodes: 3,
        num_output_nodes: 2,
        ..GenomeConfig::default()
    };
    let mut counter = InnovationCounter::new();
    let mut random = RandomSource::from_seed(14);
    let archetype = Genome::new(&cfg, &mut counter, &mut random).unwrap();

    let mut left = archetype.clone();
    left.add_node_at(left.innovations()[0], None, &mut counter)
        .unwrap();

    let mut right = archetype.clone();
    right
        .add_node_at(right.innovations()[3], None, &mut counter)
        .unwrap();

    let params = CalcDistParams::default();
    let distance = Genome::calc_distance(&left, &right, &params);

    // Four non-matching edges (two per split), no weight difference on the
    // matching layer.
    assert!((distance - 4.0).abs() < 1e-6);
}
