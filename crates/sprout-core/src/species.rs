use crate::genome::{CalcDistParams, Genome};
use sprout_net::random::RandomSource;

/// One member of a species: a snapshot of the genome and its fitness.
#[derive(Debug, Clone)]
pub struct SpeciesMember {
    pub genome: Genome,
    pub fitness: f32,
}

/// A cluster of genomes within one speciation distance of a representative.
///
/// The representative is a value copy, never a pointer into the population,
/// and it persists across the membership reset between generations. A species
/// whose best fitness stops improving accumulates stagnation and is
/// eventually barred from reproducing.
#[derive(Debug, Clone)]
pub struct Species {
    representative: Genome,
    members: Vec<SpeciesMember>,
    best_index: Option<usize>,
    best_fitness: f32,
    previous_best_fitness: f32,
    stagnant_count: usize,
    reproducible: bool,
}

impl Species {
    /// A species with a representative and no members yet.
    pub fn new(representative: Genome) -> Self {
        Species {
            representative,
            members: Vec::new(),
            best_index: None,
            best_fitness: 0.0,
            previous_best_fitness: 0.0,
            stagnant_count: 0,
            reproducible: true,
        }
    }

    /// A species seeded with its first member.
    pub fn with_first_member(genome: &Genome, fitness: f32) -> Self {
        let mut species = Species::new(genome.clone());
        species.add_genome(genome, fitness);
        species
    }

    /// Clear membership and the current-generation best before re-speciation.
    /// The representative persists.
    pub fn pre_new_generation(&mut self) {
        self.members.clear();
        self.best_index = None;
        self.best_fitness = 0.0;
    }

    /// Update stagnation against the previous generation and pick a new
    /// representative uniformly at random from the current members.
    pub fn post_new_generation(&mut self, random: &mut RandomSource) {
        if self.best_fitness <= self.previous_best_fitness {
            self.stagnant_count += 1;
        } else {
            self.previous_best_fitness = self.best_fitness;
            self.stagnant_count = 0;
        }

        if !self.members.is_empty() {
            let index = random.integer(0, self.members.len() - 1);
            self.representative = self.members[index].genome.clone();
        }
    }

    /// Add the genome when it is within `threshold` of the representative.
    pub fn try_add_genome(
        &mut self,
        genome: &Genome,
        fitness: f32,
        threshold: f32,
        params: &CalcDistParams,
    ) -> bool {
        let distance = Genome::calc_distance(genome, &self.representative, params);
        if distance <= threshold {
            self.add_genome(genome, fitness);
            return true;
        }

        false
    }

    /// Add the genome unconditionally, tracking the best of the generation.
    pub fn add_genome(&mut self, genome: &Genome, fitness: f32) {
        self.members.push(SpeciesMember {
            genome: genome.clone(),
            fitness,
        });

        if fitness > self.best_fitness {
            self.best_fitness = fitness;
            self.best_index = Some(self.members.len() - 1);
        }
    }

    pub fn members(&self) -> &[SpeciesMember] {
        &self.members
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    pub fn representative(&self) -> &Genome {
        &self.representative
    }

    pub fn best_genome(&self) -> Option<&Genome> {
        self.best_index.map(|index| &self.members[index].genome)
    }

    pub fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    pub fn stagnant_generation_count(&self) -> usize {
        self.stagnant_count
    }

    pub fn is_reproducible(&self) -> bool {
        self.reproducible
    }

    pub fn set_reproducible(&mut self, reproducible: bool) {
        self.reproducible = reproducible;
    }
}
