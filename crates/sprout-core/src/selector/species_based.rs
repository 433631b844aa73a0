use crate::generation::GenomeData;
use crate::selector::{GenomeSelector, SelectionMode};
use crate::species::Species;
use sprout_net::ids::{GenomeId, SpeciesId};
use sprout_net::random::RandomSource;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

struct SpeciesEntry<'a> {
    genomes: Vec<&'a GenomeData>,
    /// Shared-fitness prefix sums; `cumulative[0] == 0`.
    cumulative: Vec<f32>,
    population: usize,
    remaining: usize,
}

impl<'a> SpeciesEntry<'a> {
    fn new() -> Self {
        SpeciesEntry {
            genomes: Vec::new(),
            cumulative: vec![0.0],
            population: 0,
            remaining: 0,
        }
    }

    fn sum_fitness(&self) -> f32 {
        *self.cumulative.last().unwrap_or(&0.0)
    }
}

/// Fitness-shared, species-aware parent selection.
///
/// Each genome's fitness is divided by its species' member count before the
/// cumulative sums are built, so a large species cannot dominate selection.
/// Stagnant species and non-positive-fitness genomes are excluded up front;
/// when that excludes everything, stagnant species are re-admitted, and when
/// even that is empty the caller falls back to uniform selection
/// (`num_genomes` stays zero).
pub struct SpeciesBasedSelector<'a> {
    entries: Vec<SpeciesEntry<'a>>,
    total_fitness: f32,
    num_genomes: usize,
    has_species_with_two: bool,
    inter_species_rate: f32,
    num_inter_species: usize,
    cumulative_species: Vec<f32>,
    current: usize,
    mode: Option<SelectionMode>,
}

impl<'a> SpeciesBasedSelector<'a> {
    /// Group `genomes` (sorted by species id, then fitness descending) into
    /// per-species selection entries.
    pub fn new(
        genomes: &'a [GenomeData],
        species: &BTreeMap<SpeciesId, Species>,
        genome_species: &HashMap<GenomeId, SpeciesId>,
        inter_species_rate: f32,
    ) -> Self {
        let mut selector = SpeciesBasedSelector {
            entries: Vec::with_capacity(species.len()),
            total_fitness: 0.0,
            num_genomes: 0,
            has_species_with_two: false,
            inter_species_rate,
            num_inter_species: 0,
            cumulative_species: Vec::new(),
            current: 0,
            mode: None,
        };

        selector.add_genomes(genomes, species, genome_species, true);

        if selector.num_genomes == 0 {
            // Nothing reproducible with positive fitness; re-admit stagnant
            // species before giving up.
            selector.add_genomes(genomes, species, genome_species, false);

            if selector.num_genomes == 0 {
                warn!("species selector setup failed: all genomes have non-positive fitness");
                return selector;
            }
        }

        selector.build_cumulative_sums(species, genome_species);
        selector
    }

    fn add_genomes(
        &mut self,
        genomes: &'a [GenomeData],
        species: &BTreeMap<SpeciesId, Species>,
        genome_species: &HashMap<GenomeId, SpeciesId>,
        skip_stagnant: bool,
    ) {
        let mut current_species: Option<SpeciesId> = None;

        for genome in genomes {
            let Some(species_id) = genome_species.get(&genome.id()) else {
                continue;
            };
            let Some(s) = species.get(species_id) else {
                continue;
            };

            if (skip_stagnant && !s.is_reproducible()) || genome.fitness() <= 0.0 {
                continue;
            }

            if current_species != Some(*species_id) {
                current_species = Some(*species_id);
                self.entries.push(SpeciesEntry::new());
            } else {
                self.has_species_with_two = true;
            }

            self.entries.last_mut().unwrap().genomes.push(genome);
            self.num_genomes += 1;
        }
    }

    fn build_cumulative_sums(
        &mut self,
        species: &BTreeMap<SpeciesId, Species>,
        genome_species: &HashMap<GenomeId, SpeciesId>,
    ) {
        for entry in self.entries.iter_mut() {
            entry
                .genomes
                .sort_by(|a, b| b.fitness().partial_cmp(&a.fitness()).unwrap());

            // Cull the weakest member unless the species is tiny or the
            // weakest ties the median.
            if entry.genomes.len() > 2 {
                let median = entry.genomes[entry.genomes.len() / 2].fitness();
                if entry.genomes.last().unwrap().fitness() < median {
                    entry.genomes.pop();
                }
            }

            // Explicit fitness sharing over the species' full member count.
            let num_members = genome_species
                .get(&entry.genomes[0].id())
                .and_then(|id| species.get(id))
                .map(|s| s.num_members())
                .unwrap_or(entry.genomes.len())
                .max(1);
            let sharing_factor = 1.0 / num_members as f32;

            for genome in &entry.genomes {
                let shared = genome.fitness() * sharing_factor;
                entry.cumulative.push(entry.cumulative.last().unwrap() + shared);
                self.total_fitness += shared;
            }
        }
    }

    pub fn num_genomes(&self) -> usize {
        self.num_genomes
    }

    fn set_species_populations(&mut self, count: usize) {
        for entry in self.entries.iter_mut() {
            entry.population = 0;
            entry.remaining = 0;
        }
        self.current = 0;
        self.num_inter_species = 0;

        let mode = self.mode.unwrap_or(SelectionMode::One);

        if count == 0
            || (mode == SelectionMode::Two && !self.has_species_with_two)
            || self.total_fitness == 0.0
        {
            self.current = self.entries.len();
            return;
        }

        if mode == SelectionMode::Two {
            self.num_inter_species = (count as f32 * self.inter_species_rate) as usize;
            if self.num_inter_species == 0 && self.inter_species_rate > 0.0 {
                self.num_inter_species = 1;
            }
        }

        let mut remaining = count - self.num_inter_species.min(count);

        // Proportional floor distribution; the scale doubles until every slot
        // is handed out.
        let mut fitness_scale = 1.0f32;
        while remaining > 0 {
            for entry in self.entries.iter_mut() {
                if mode == SelectionMode::Two && entry.genomes.len() < 2 {
                    continue;
                }

                let mut population =
                    (entry.sum_fitness() * fitness_scale / self.total_fitness) as usize;
                population = population.min(remaining);

                entry.population += population;
                remaining -= population;

                if remaining == 0 {
                    break;
                }
            }

            fitness_scale *= 2.0;
        }

        for entry in self.entries.iter_mut() {
            entry.remaining = entry.population;
        }

        while self.current < self.entries.len() && self.entries[self.current].population == 0 {
            self.current += 1;
        }

        if self.num_inter_species > 0 {
            self.cumulative_species.clear();
            self.cumulative_species.reserve(self.entries.len() + 1);
            self.cumulative_species.push(0.0);
            for entry in &self.entries {
                self.cumulative_species
                    .push(self.cumulative_species.last().unwrap() + entry.sum_fitness());
            }
        }
    }

    /// Roulette spin inside the current species.
    fn select_within_current(&self, random: &mut RandomSource) -> Option<&'a GenomeData> {
        let entry = self.entries.get(self.current)?;
        debug_assert!(entry.remaining > 0);

        let v = random.real(0.0, entry.sum_fitness());
        for (index, genome) in entry.genomes.iter().enumerate() {
            if v < entry.cumulative[index + 1] {
                return Some(*genome);
            }
        }

        entry.genomes.last().copied()
    }

    /// Roulette spin over all species, then within the chosen one.
    fn select_inter_species(&self, random: &mut RandomSource) -> Option<&'a GenomeData> {
        debug_assert_eq!(self.cumulative_species.len(), self.entries.len() + 1);

        let total = *self.cumulative_species.last()?;
        let mut v = random.real(0.0, total);

        for (index, entry) in self.entries.iter().enumerate() {
            if v < self.cumulative_species[index + 1] {
                v -= self.cumulative_species[index];
                for (genome_index, genome) in entry.genomes.iter().enumerate() {
                    if v < entry.cumulative[genome_index + 1] {
                        return Some(*genome);
                    }
                }
                return entry.genomes.last().copied();
            }
        }

        self.entries.last().and_then(|e| e.genomes.last().copied())
    }

    fn decrement_current(&mut self) {
        let entry = &mut self.entries[self.current];
        entry.remaining -= 1;

        if entry.remaining == 0 {
            loop {
                self.current += 1;
                if self.current >= self.entries.len()
                    || self.entries[self.current].population > 0
                {
                    break;
                }
            }
        }
    }
}

impl<'a> GenomeSelector<'a> for SpeciesBasedSelector<'a> {
    fn pre_selection(&mut self, count: usize, mode: SelectionMode) -> bool {
        debug_assert!(self.mode.is_none());
        self.mode = Some(mode);
        self.set_species_populations(count);

        match mode {
            SelectionMode::One => self.num_genomes > 0,
            SelectionMode::Two => self.num_genomes >= 2 && self.has_species_with_two,
        }
    }

    fn select_genome(&mut self, random: &mut RandomSource) -> Option<&'a GenomeData> {
        debug_assert_eq!(self.mode, Some(SelectionMode::One));

        if self.num_genomes == 0 {
            return None;
        }

        let genome = self.select_within_current(random)?;
        self.decrement_current();
        Some(genome)
    }

    fn select_two_genomes(
        &mut self,
        random: &mut RandomSource,
    ) -> Option<(&'a GenomeData, &'a GenomeData)> {
        debug_assert_eq!(self.mode, Some(SelectionMode::Two));

        if self.num_genomes < 2 {
            return None;
        }

        if self.current < self.entries.len() {
            // Intra-species slot.
            while self.current < self.entries.len()
                && self.entries[self.current].genomes.len() < 2
            {
                self.current += 1;
            }
            if self.current >= self.entries.len() {
                return self.select_inter_species_pair(random);
            }

            let entry = &self.entries[self.current];
            let pair = if entry.genomes.len() == 2 {
                (entry.genomes[0], entry.genomes[1])
            } else {
                let first = self.select_within_current(random)?;
                let mut second = first;
                while second.id() == first.id() {
                    second = self.select_within_current(random)?;
                }
                (first, second)
            };

            self.decrement_current();
            Some(pair)
        } else {
            self.select_inter_species_pair(random)
        }
    }

    fn post_selection(&mut self) {
        debug_assert!(self.mode.is_some());
        self.mode = None;
    }
}

impl<'a> SpeciesBasedSelector<'a> {
    fn select_inter_species_pair(
        &mut self,
        random: &mut RandomSource,
    ) -> Option<(&'a GenomeData, &'a GenomeData)> {
        if self.cumulative_species.is_empty() {
            return None;
        }

        let first = self.select_inter_species(random)?;
        let mut second = first;
        while second.id() == first.id() {
            second = self.select_inter_species(random)?;
        }

        Some((first, second))
    }
}
