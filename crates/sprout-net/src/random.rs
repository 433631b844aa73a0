use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// The random source driving an evolutionary run.
///
/// Every stochastic decision of the engine draws from one of these, threaded
/// by `&mut` from the generation into the subordinate operators, so a run is
/// fully reproducible from its seed. Two runs must not share a source.
#[derive(Debug, Clone)]
pub struct RandomSource {
    rng: SmallRng,
}

impl RandomSource {
    /// A source seeded from the operating system.
    pub fn from_entropy() -> Self {
        RandomSource {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// A deterministic source. Runs constructed from the same seed make
    /// identical decisions.
    pub fn from_seed(seed: u64) -> Self {
        RandomSource {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Uniform real in `[0, 1)`.
    #[inline]
    pub fn real01(&mut self) -> f32 {
        self.rng.random()
    }

    /// Uniform real in the half-open range `[min, max)`. The upper bound is
    /// never returned; weight-mutation clamping relies on this.
    #[inline]
    pub fn real(&mut self, min: f32, max: f32) -> f32 {
        if min >= max {
            return min;
        }

        self.rng.random_range(min..max)
    }

    /// Uniform integer in the closed range `[min, max]`.
    #[inline]
    pub fn integer(&mut self, min: usize, max: usize) -> usize {
        if min >= max {
            return min;
        }

        self.rng.random_range(min..=max)
    }

    /// Fair coin flip.
    #[inline]
    pub fn boolean(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    /// Biased coin flip with the given probability of `true`.
    #[inline]
    pub fn boolean_with(&mut self, prob: f32) -> bool {
        if prob <= 0.0 {
            return false;
        }
        if prob >= 1.0 {
            return true;
        }

        self.rng.random_bool(prob as f64)
    }

    /// A uniformly random item of the slice.
    ///
    /// # Panics
    /// Panics on an empty slice.
    #[inline]
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        let index = self.rng.random_range(0..items.len());
        &items[index]
    }

    #[inline]
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Sample from a Gaussian via the Box-Muller transform.
    pub fn gaussian(&mut self, mean: f32, std_dev: f32) -> f32 {
        let u1: f64 = self.rng.random();
        let u2: f64 = self.rng.random();
        let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z0 as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real01_stays_in_range() {
        let mut random = RandomSource::from_seed(7);
        for _ in 0..1000 {
            let v = random.real01();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn real_is_half_open() {
        let mut random = RandomSource::from_seed(7);
        for _ in 0..1000 {
            let v = random.real(-2.0, 3.0);
            assert!((-2.0..3.0).contains(&v));
        }
    }

    #[test]
    fn real_with_empty_range_returns_min() {
        let mut random = RandomSource::from_seed(7);
        assert_eq!(random.real(1.5, 1.5), 1.5);
    }

    #[test]
    fn integer_is_inclusive_on_both_ends() {
        let mut random = RandomSource::from_seed(7);
        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[random.integer(0, 2)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = RandomSource::from_seed(42);
        let mut b = RandomSource::from_seed(42);
        for _ in 0..100 {
            assert_eq!(a.real01(), b.real01());
            assert_eq!(a.integer(0, 10), b.integer(0, 10));
            assert_eq!(a.boolean(), b.boolean());
        }
    }
}
