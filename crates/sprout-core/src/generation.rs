use crate::crossover::{Crossover, CrossoverParams};
use crate::fitness::FitnessCalculator;
use crate::genome::{CalcDistParams, Genome, GenomeConfig};
use crate::innovation::InnovationCounter;
use crate::mutation::{MutationParams, Mutator};
use crate::selector::{GenomeSelector, SelectionMode, SelectorKind, SpeciesBasedSelector, UniformSelector};
use crate::species::Species;
use sprout_error::{SproutResult, ensure};
use sprout_net::ids::{GenerationId, GenomeId, SpeciesId, UniqueIdCounter};
use sprout_net::random::RandomSource;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// A genome inside one generation: the genome itself, its per-generation id,
/// its fitness, and whether it is protected from modification (carried
/// champions).
#[derive(Debug, Clone)]
pub struct GenomeData {
    genome: Genome,
    id: GenomeId,
    fitness: f32,
    protected: bool,
}

impl GenomeData {
    pub fn new(genome: Genome, id: GenomeId) -> Self {
        GenomeData {
            genome,
            id,
            fitness: 0.0,
            protected: false,
        }
    }

    pub fn genome(&self) -> &Genome {
        &self.genome
    }

    pub fn genome_mut(&mut self) -> &mut Genome {
        &mut self.genome
    }

    pub fn id(&self) -> GenomeId {
        self.id
    }

    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn set_protected(&mut self, protected: bool) {
        self.protected = protected;
    }
}

/// Parameters of the per-generation speciation machinery.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationParams {
    /// Generations without improvement before a species stops reproducing.
    pub max_stagnant_count: usize,
    /// Share of crossover pairings drawn across species boundaries.
    pub inter_species_cross_over_rate: f32,
    /// Genetic distance below which a genome joins a species.
    pub speciation_distance_threshold: f32,
    pub calc_dist_params: CalcDistParams,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationParams {
            max_stagnant_count: 15,
            inter_species_cross_over_rate: 0.001,
            speciation_distance_threshold: 3.0,
            calc_dist_params: CalcDistParams::default(),
        }
    }
}

/// Everything needed to set up a population.
pub struct GenerationConfig {
    pub num_genomes: usize,
    pub genome_config: GenomeConfig,
    /// Initial edge weights are drawn uniformly from this range.
    pub min_weight: f32,
    pub max_weight: f32,
    pub fitness_calculator: Box<dyn FitnessCalculator>,
    pub mutation_params: MutationParams,
    pub crossover_params: CrossoverParams,
    pub min_members_in_species_to_copy_champion: usize,
    pub generation_params: GenerationParams,
    pub random: Option<RandomSource>,
}

impl GenerationConfig {
    pub fn new(
        num_genomes: usize,
        genome_config: GenomeConfig,
        fitness_calculator: Box<dyn FitnessCalculator>,
    ) -> Self {
        GenerationConfig {
            num_genomes,
            genome_config,
            min_weight: -1.0,
            max_weight: 1.0,
            fitness_calculator,
            mutation_params: MutationParams::default(),
            crossover_params: CrossoverParams::default(),
            min_members_in_species_to_copy_champion: 5,
            generation_params: GenerationParams::default(),
            random: None,
        }
    }
}

/// The evolution loop: owns the population, the species map, the innovation
/// counter, the random source, and the genetic operators, and advances them
/// one epoch per [Generation::evolve_generation] call.
pub struct Generation {
    id: GenerationId,
    num_genomes: usize,
    genomes: Vec<GenomeData>,
    prev_genomes: Vec<GenomeData>,
    species: BTreeMap<SpeciesId, Species>,
    genome_species: HashMap<GenomeId, SpeciesId>,
    species_ids: UniqueIdCounter<SpeciesId>,
    innovations: InnovationCounter,
    random: RandomSource,
    fitness_calculator: Box<dyn FitnessCalculator>,
    mutator: Mutator,
    crossover: Crossover,
    params: GenerationParams,
    min_members_to_copy_champion: usize,
}

impl Generation {
    /// Build the first generation: `num_genomes` copies of the archetype
    /// genome with uniformly random initial edge weights.
    pub fn new(config: GenerationConfig) -> SproutResult<Generation> {
        ensure!(
            config.num_genomes > 1,
            InvalidConfig: "a population needs at least two genomes, got {}",
            config.num_genomes
        );
        ensure!(
            config.min_weight <= config.max_weight,
            InvalidConfig: "min_weight {} exceeds max_weight {}",
            config.min_weight,
            config.max_weight
        );

        let mut random = config
            .random
            .clone()
            .unwrap_or_else(RandomSource::from_entropy);
        let mut innovations = InnovationCounter::new();

        let archetype = Genome::new(&config.genome_config, &mut innovations, &mut random)?;

        let mut genomes = Vec::with_capacity(config.num_genomes);
        for index in 0..config.num_genomes {
            let mut genome = archetype.clone();
            for edge in genome.innovations().to_vec() {
                genome.set_edge_weight(edge, random.real(config.min_weight, config.max_weight));
            }
            genomes.push(GenomeData::new(genome, GenomeId::new(index as u32)));
        }

        Generation::init(genomes, innovations, random, config)
    }

    /// Build the first generation from externally constructed genomes. The
    /// genomes must all descend from the given innovation counter.
    pub fn from_genomes(
        genomes: Vec<Genome>,
        innovations: InnovationCounter,
        config: GenerationConfig,
    ) -> SproutResult<Generation> {
        ensure!(
            genomes.len() > 1,
            InvalidConfig: "a population needs at least two genomes, got {}",
            genomes.len()
        );

        let random = config
            .random
            .clone()
            .unwrap_or_else(RandomSource::from_entropy);

        let genomes = genomes
            .into_iter()
            .enumerate()
            .map(|(index, genome)| GenomeData::new(genome, GenomeId::new(index as u32)))
            .collect();

        Generation::init(genomes, innovations, random, config)
    }

    fn init(
        genomes: Vec<GenomeData>,
        innovations: InnovationCounter,
        random: RandomSource,
        config: GenerationConfig,
    ) -> SproutResult<Generation> {
        let num_genomes = genomes.len();

        let mut generation = Generation {
            id: GenerationId::new(0),
            num_genomes,
            genomes,
            prev_genomes: Vec::new(),
            species: BTreeMap::new(),
            genome_species: HashMap::with_capacity(num_genomes),
            species_ids: UniqueIdCounter::new(),
            innovations,
            random,
            fitness_calculator: config.fitness_calculator,
            mutator: Mutator::new(config.mutation_params),
            crossover: Crossover::new(config.crossover_params),
            params: config.generation_params,
            min_members_to_copy_champion: config.min_members_in_species_to_copy_champion,
        };

        // One species holds everyone at the start, with a random member as
        // its representative.
        let representative = {
            let index = generation
                .random
                .integer(0, generation.genomes.len() - 1);
            generation.genomes[index].genome().clone()
        };
        let species_id = generation.species_ids.next_id();
        let mut species = Species::new(representative);
        for data in &generation.genomes {
            species.add_genome(data.genome(), 0.0);
            generation.genome_species.insert(data.id(), species_id);
        }
        generation.species.insert(species_id, species);

        generation.calc_fitness();

        Ok(generation)
    }

    pub fn generation_id(&self) -> GenerationId {
        self.id
    }

    pub fn num_genomes(&self) -> usize {
        self.num_genomes
    }

    pub fn genomes(&self) -> &[GenomeData] {
        &self.genomes
    }

    pub fn prev_genomes(&self) -> &[GenomeData] {
        &self.prev_genomes
    }

    pub fn species(&self) -> &BTreeMap<SpeciesId, Species> {
        &self.species
    }

    pub fn species_of(&self, genome: GenomeId) -> Option<SpeciesId> {
        self.genome_species.get(&genome).copied()
    }

    pub fn is_species_reproducible(&self, id: SpeciesId) -> bool {
        self.species.get(&id).is_some_and(|s| s.is_reproducible())
    }

    /// The highest-fitness genome of the current generation.
    pub fn best_genome(&self) -> Option<&GenomeData> {
        self.genomes
            .iter()
            .max_by(|a, b| a.fitness().partial_cmp(&b.fitness()).unwrap())
    }

    pub fn genomes_in_fitness_order(&self) -> Vec<&GenomeData> {
        let mut out: Vec<&GenomeData> = self.genomes.iter().collect();
        out.sort_by(|a, b| b.fitness().partial_cmp(&a.fitness()).unwrap());
        out
    }

    pub fn species_in_best_fitness_order(&self) -> Vec<(SpeciesId, &Species)> {
        let mut out: Vec<(SpeciesId, &Species)> =
            self.species.iter().map(|(id, s)| (*id, s)).collect();
        out.sort_by(|a, b| b.1.best_fitness().partial_cmp(&a.1.best_fitness()).unwrap());
        out
    }

    /// Advance one epoch: carry champions, cross over, clone, mutate,
    /// evaluate fitness, and re-speciate.
    pub fn evolve_generation(&mut self) {
        debug_assert!(self.num_genomes > 1);

        // Pre-update: forget the previous generation's mutation log and
        // protection flags.
        self.mutator.reset();
        for data in self.genomes.iter_mut() {
            data.set_protected(false);
        }

        let prev = std::mem::take(&mut self.genomes);
        let mut selector = self.create_selector(&prev);

        let mut next: Vec<GenomeData> = Vec::with_capacity(self.num_genomes);
        self.generate_champions(&mut next);
        self.generate_crossovers(&mut selector, &mut next);
        self.generate_clones(&mut selector, &prev, &mut next);
        drop(selector);

        debug_assert_eq!(next.len(), self.num_genomes);
        self.prev_genomes = prev;
        self.genomes = next;

        self.modify_genomes();
        self.calc_fitness();
        self.speciate();

        self.id = GenerationId::new(self.id.val() + 1);
    }

    fn create_selector<'a>(&self, prev: &'a [GenomeData]) -> SelectorKind<'a> {
        let selector = SpeciesBasedSelector::new(
            prev,
            &self.species,
            &self.genome_species,
            self.params.inter_species_cross_over_rate,
        );

        if selector.num_genomes() > 0 {
            SelectorKind::Species(selector)
        } else {
            warn!("all genomes have non-positive fitness; selecting uniformly");
            SelectorKind::Uniform(UniformSelector::new(prev))
        }
    }

    /// Copy the champion of every reproducible species that qualifies, and
    /// the generation-wide best regardless of species size. Champions skip
    /// the selector and are protected from mutation.
    fn generate_champions(&mut self, next: &mut Vec<GenomeData>) {
        let remaining = self.num_genomes - next.len();
        if remaining == 0 {
            return;
        }

        let best_overall = self
            .species
            .values()
            .map(|s| s.best_fitness())
            .fold(0.0f32, f32::max);

        let mut champions: Vec<(f32, Genome)> = Vec::new();
        for species in self.species.values() {
            if !species.is_reproducible() {
                continue;
            }
            let Some(best) = species.best_genome() else {
                continue;
            };

            if species.best_fitness() >= best_overall
                || species.num_members() >= self.min_members_to_copy_champion
            {
                champions.push((species.best_fitness(), best.clone()));
            }
        }

        if champions.len() > remaining {
            champions.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
            champions.truncate(remaining);
        }

        for (_, genome) in champions {
            Generation::push_genome(next, genome, true);
        }
    }

    fn generate_crossovers(&mut self, selector: &mut SelectorKind<'_>, next: &mut Vec<GenomeData>) {
        let remaining = self.num_genomes - next.len();
        let rate = self.crossover.params().num_cross_over_genomes_rate;
        let count = remaining.min((self.num_genomes as f32 * rate) as usize);
        if count == 0 {
            return;
        }

        if !selector.pre_selection(count, SelectionMode::Two) {
            selector.post_selection();
            return;
        }

        for _ in 0..count {
            let Some((first, second)) = selector.select_two_genomes(&mut self.random) else {
                break;
            };

            // The fitter parent leads; a tie lets both contribute structure.
            let (fitter, other, same_fitness) = if first.fitness() < second.fitness() {
                (second, first, false)
            } else {
                (first, second, first.fitness() == second.fitness())
            };

            let child =
                self.crossover
                    .cross_over(fitter.genome(), other.genome(), same_fitness, &mut self.random);
            Generation::push_genome(next, child, false);
        }

        selector.post_selection();
    }

    fn generate_clones(
        &mut self,
        selector: &mut SelectorKind<'_>,
        prev: &[GenomeData],
        next: &mut Vec<GenomeData>,
    ) {
        let remaining = self.num_genomes - next.len();
        if remaining == 0 {
            return;
        }

        if selector.pre_selection(remaining, SelectionMode::One) {
            for _ in 0..remaining {
                let Some(parent) = selector.select_genome(&mut self.random) else {
                    break;
                };
                Generation::push_genome(next, parent.genome().clone(), false);
            }
        }
        selector.post_selection();

        // The budget must be met even if selection aborted early.
        if next.len() < self.num_genomes {
            warn!("selector under-delivered; filling the population uniformly");
            while next.len() < self.num_genomes {
                let index = self.random.integer(0, prev.len() - 1);
                Generation::push_genome(next, prev[index].genome().clone(), false);
            }
        }
    }

    fn push_genome(next: &mut Vec<GenomeData>, genome: Genome, protected: bool) {
        let mut data = GenomeData::new(genome, GenomeId::new(next.len() as u32));
        data.set_protected(protected);
        next.push(data);
    }

    fn modify_genomes(&mut self) {
        let budget =
            (self.num_genomes as f32 * self.mutator.params().mutated_genomes_rate) as usize;
        let mut mutated = 0;

        for data in self.genomes.iter_mut() {
            if mutated >= budget {
                break;
            }
            if data.is_protected() {
                continue;
            }

            self.mutator
                .apply(data.genome_mut(), &mut self.innovations, &mut self.random);
            mutated += 1;
        }
    }

    fn calc_fitness(&mut self) {
        for data in self.genomes.iter_mut() {
            let fitness = self.fitness_calculator.calc_fitness(data.genome_mut());
            data.set_fitness(fitness);
        }
    }

    /// Re-speciation: drop stagnant species, re-home every genome against the
    /// surviving representatives, then refresh representatives, stagnation,
    /// and reproducibility.
    fn speciate(&mut self) {
        let stagnant: Vec<SpeciesId> = self
            .species
            .iter()
            .filter(|(_, s)| s.stagnant_generation_count() >= self.params.max_stagnant_count)
            .map(|(id, _)| *id)
            .collect();
        for id in stagnant {
            if self.species.len() <= 1 {
                break;
            }
            self.species.remove(&id);
        }

        self.genome_species.clear();
        for species in self.species.values_mut() {
            species.pre_new_generation();
        }

        for data in &self.genomes {
            let mut joined = None;
            for (id, species) in self.species.iter_mut() {
                if species.try_add_genome(
                    data.genome(),
                    data.fitness(),
                    self.params.speciation_distance_threshold,
                    &self.params.calc_dist_params,
                ) {
                    joined = Some(*id);
                    break;
                }
            }

            let species_id = joined.unwrap_or_else(|| {
                let id = self.species_ids.next_id();
                self.species
                    .insert(id, Species::with_first_member(data.genome(), data.fitness()));
                id
            });
            self.genome_species.insert(data.id(), species_id);
        }

        self.species.retain(|_, s| s.num_members() > 0);

        let single_species = self.species.len() == 1;
        for species in self.species.values_mut() {
            species.post_new_generation(&mut self.random);

            if single_species {
                // Selection relies on at least one reproducible species.
                species.set_reproducible(true);
            } else {
                species.set_reproducible(
                    species.stagnant_generation_count() < self.params.max_stagnant_count,
                );
            }
        }

        let genome_species = &self.genome_species;
        self.genomes.sort_by(|a, b| {
            let sa = genome_species[&a.id()];
            let sb = genome_species[&b.id()];
            sa.cmp(&sb)
                .then_with(|| b.fitness().partial_cmp(&a.fitness()).unwrap())
        });
    }
}
