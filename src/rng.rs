//! Injectable random sources
//!
//! Generation never touches a process-wide generator. Every draw goes through
//! a [`RandomSource`] handed in by the caller, so a seed (or a scripted list
//! of values in tests) fully determines the output.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform draws in `[0, 1)`.
///
/// The provided selection methods are derived from [`RandomSource::unit`]
/// only, so each selection is a pure function of the values it returns.
pub trait RandomSource {
    fn unit(&mut self) -> f64;

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn choose_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "choose_index on an empty range");
        let scaled = (self.unit() * len as f64) as usize;
        scaled.min(len.saturating_sub(1))
    }

    /// Index drawn from the cumulative distribution of `weights`.
    ///
    /// Returns `None` when there is nothing with positive weight to pick.
    fn choose_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let target = self.unit() * total;
        let mut cumulative = 0.0;
        let mut last_positive = None;
        for (index, &weight) in weights.iter().enumerate() {
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight;
            last_positive = Some(index);
            if target < cumulative {
                return Some(index);
            }
        }
        // rounding can leave target a hair above the final cumulative sum
        last_positive
    }
}

impl<R: Rng> RandomSource for R {
    fn unit(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Seeded ChaCha generator used for all reproducible generation.
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Generator seeded from OS entropy, for requests that did not ask for a seed.
pub fn from_entropy() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

/// Mix a master seed with a stream index so concurrent generations each get
/// an independent source.
pub fn derive_seed(master_seed: u64, stream: u64) -> u64 {
    let mut seed = master_seed;
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed ^= stream.wrapping_mul(48271);
    seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    seed
}

/// Replays a fixed list of unit values, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedRng {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRng {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values = values.into();
        assert!(!values.is_empty(), "scripted source needs at least one value");
        assert!(
            values.iter().all(|v| (0.0..1.0).contains(v)),
            "scripted values must lie in [0, 1)"
        );
        Self { values, cursor: 0 }
    }

    /// Source that returns `value` for every draw.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRng {
    fn unit(&mut self) -> f64 {
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value
    }
}
