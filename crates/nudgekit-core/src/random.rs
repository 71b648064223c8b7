//! Randomness behind a seam.
//!
//! The scarcity ticker paces its decrements with jittered intervals. Tests
//! need that jitter to be reproducible, so the consumer side only ever sees
//! [`RandomSource`]; production wires in [`PacingRng`] seeded from entropy,
//! tests seed it explicitly or substitute a scripted source.

use rand::{Rng, SeedableRng};
use rand_pcg::Mcg128Xsl64;

/// Uniform sampling over half-open ranges.
pub trait RandomSource {
    /// Sample uniformly from `[low, high)`. `low == high` returns `low`.
    fn range_u64(&mut self, low: u64, high: u64) -> u64;

    /// Sample uniformly from `[low, high)`. `low >= high` returns `low`.
    fn range_f64(&mut self, low: f64, high: f64) -> f64;
}

/// PCG-backed source. Small state, fast, and seedable for replay.
#[derive(Debug, Clone)]
pub struct PacingRng {
    rng: Mcg128Xsl64,
}

impl PacingRng {
    /// Reproducible stream for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mcg128Xsl64::seed_from_u64(seed),
        }
    }

    /// OS-entropy seed for production use.
    pub fn from_entropy() -> Self {
        Self {
            rng: Mcg128Xsl64::from_entropy(),
        }
    }

    /// Seeded when `seed` is set, entropy otherwise. Mirrors how configs
    /// carry an optional replay seed.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_entropy(),
        }
    }
}

impl RandomSource for PacingRng {
    fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }
}
