mod species_based;

pub use species_based::SpeciesBasedSelector;

use crate::generation::GenomeData;
use sprout_net::random::RandomSource;

/// How many genomes each selection call must yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    One,
    Two,
}

/// Parent selection over the previous generation's genomes.
///
/// `pre_selection` must run exactly once before any selection call and
/// declares how many selections will follow; the selector must not be used
/// after `post_selection`.
pub trait GenomeSelector<'a> {
    fn pre_selection(&mut self, count: usize, mode: SelectionMode) -> bool;

    /// One parent. Requires `SelectionMode::One`.
    fn select_genome(&mut self, random: &mut RandomSource) -> Option<&'a GenomeData>;

    /// Two distinct parents. Requires `SelectionMode::Two`.
    fn select_two_genomes(
        &mut self,
        random: &mut RandomSource,
    ) -> Option<(&'a GenomeData, &'a GenomeData)>;

    fn post_selection(&mut self);
}

/// Fitness-blind selection: every genome is equally likely. The fallback when
/// a degenerate population defeats fitness sharing.
pub struct UniformSelector<'a> {
    genomes: &'a [GenomeData],
    mode: Option<SelectionMode>,
}

impl<'a> UniformSelector<'a> {
    pub fn new(genomes: &'a [GenomeData]) -> Self {
        UniformSelector {
            genomes,
            mode: None,
        }
    }
}

impl<'a> GenomeSelector<'a> for UniformSelector<'a> {
    fn pre_selection(&mut self, _count: usize, mode: SelectionMode) -> bool {
        debug_assert!(self.mode.is_none());
        self.mode = Some(mode);

        match mode {
            SelectionMode::One => !self.genomes.is_empty(),
            SelectionMode::Two => self.genomes.len() >= 2,
        }
    }

    fn select_genome(&mut self, random: &mut RandomSource) -> Option<&'a GenomeData> {
        debug_assert_eq!(self.mode, Some(SelectionMode::One));

        if self.genomes.is_empty() {
            return None;
        }

        Some(&self.genomes[random.integer(0, self.genomes.len() - 1)])
    }

    fn select_two_genomes(
        &mut self,
        random: &mut RandomSource,
    ) -> Option<(&'a GenomeData, &'a GenomeData)> {
        debug_assert_eq!(self.mode, Some(SelectionMode::Two));

        if self.genomes.len() < 2 {
            return None;
        }

        let first = random.integer(0, self.genomes.len() - 1);
        let mut second = first;
        while second == first {
            second = random.integer(0, self.genomes.len() - 1);
        }

        Some((&self.genomes[first], &self.genomes[second]))
    }

    fn post_selection(&mut self) {
        self.mode = None;
    }
}

/// The two selector implementations the generation loop chooses between.
pub enum SelectorKind<'a> {
    Species(SpeciesBasedSelector<'a>),
    Uniform(UniformSelector<'a>),
}

impl<'a> GenomeSelector<'a> for SelectorKind<'a> {
    fn pre_selection(&mut self, count: usize, mode: SelectionMode) -> bool {
        match self {
            SelectorKind::Species(s) => s.pre_selection(count, mode),
            SelectorKind::Uniform(s) => s.pre_selection(count, mode),
        }
    }

    fn select_genome(&mut self, random: &mut RandomSource) -> Option<&'a GenomeData> {
        match self {
            SelectorKind::Species(s) => s.select_genome(random),
            SelectorKind::Uniform(s) => s.select_genome(random),
        }
    }

    fn select_two_genomes(
        &mut self,
        random: &mut RandomSource,
    ) -> Option<(&'a GenomeData, &'a GenomeData)> {
        match self {
            SelectorKind::Species(s) => s.select_two_genomes(random),
            SelectorKind::Uniform(s) => s.select_two_genomes(random),
        }
    }

    fn post_selection(&mut self) {
        match self {
            SelectorKind::Species(s) => s.post_selection(),
            SelectorKind::Uniform(s) => s.post_selection(),
        }
    }
}
