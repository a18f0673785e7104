//! Geometric level generator.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::level_generator::LevelGenerator;

/// Errors that can occur when creating a [`Geometric`] level generator.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum GeometricError {
    /// The probability `p` must be in the range `(0, 1)`.
    #[error("p must be in (0, 1).")]
    InvalidProbability,
}

/// A level generator producing geometrically distributed levels.
///
/// If a node is present at some level `n`, the probability that it is
/// also present at level `n + 1` is a constant `p` in `(0, 1)`.  The
/// draw is the classic coin-flip loop: keep incrementing the level while
/// a uniform `[0, 1)` sample falls below `p` and the cap has not been
/// reached.
///
/// Each generator owns its own [`SmallRng`], so distinct lists never
/// share random state.
#[derive(Debug)]
pub struct Geometric {
    /// The probability that a node present at one level also reaches
    /// the next.
    p: f64,
    rng: SmallRng,
}

impl Geometric {
    /// Create a new geometric level generator with promotion
    /// probability `p`, seeded from system entropy.
    ///
    /// # Errors
    ///
    /// Returns [`GeometricError::InvalidProbability`] unless
    /// `0 < p < 1`.
    pub fn new(p: f64) -> Result<Self, GeometricError> {
        if !(0.0 < p && p < 1.0) {
            return Err(GeometricError::InvalidProbability);
        }
        Ok(Geometric {
            p,
            rng: SmallRng::from_entropy(),
        })
    }

    /// Create a generator with a fixed seed, yielding a deterministic
    /// sequence of levels.  Intended for tests and reproducible
    /// benchmarks.
    ///
    /// # Errors
    ///
    /// Returns [`GeometricError::InvalidProbability`] unless
    /// `0 < p < 1`.
    pub fn with_seed(p: f64, seed: u64) -> Result<Self, GeometricError> {
        if !(0.0 < p && p < 1.0) {
            return Err(GeometricError::InvalidProbability);
        }
        Ok(Geometric {
            p,
            rng: SmallRng::seed_from_u64(seed),
        })
    }
}

impl LevelGenerator for Geometric {
    fn level(&mut self, cap: usize) -> usize {
        let mut n = 0;
        while n < cap && self.rng.gen::<f64>() < self.p {
            n += 1;
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::{Geometric, GeometricError, LevelGenerator};

    #[test]
    fn invalid_p() {
        assert_eq!(
            Geometric::new(0.0).err(),
            Some(GeometricError::InvalidProbability)
        );
        assert_eq!(
            Geometric::new(1.0).err(),
            Some(GeometricError::InvalidProbability)
        );
        assert_eq!(
            Geometric::new(-0.5).err(),
            Some(GeometricError::InvalidProbability)
        );
    }

    #[rstest]
    fn draws_stay_within_cap(
        #[values(0.01, 0.25, 0.5, 0.99)] p: f64,
        #[values(0, 1, 4, 32)] cap: usize,
    ) {
        let mut generator = Geometric::new(p).unwrap();
        for _ in 0..10_000 {
            let level = generator.level(cap);
            assert!(level <= cap);
        }
    }

    #[test]
    fn covers_the_whole_range() -> Result<()> {
        // With p = 0.5 and a small cap both extremes must show up
        // quickly.
        let mut generator = Geometric::new(0.5)?;
        let mut seen_bottom = false;
        let mut seen_top = false;
        for _ in 0..100_000 {
            match generator.level(4) {
                0 => seen_bottom = true,
                4 => seen_top = true,
                _ => {}
            }
            if seen_bottom && seen_top {
                return Ok(());
            }
        }
        bail!("failed to draw both level 0 and the cap");
    }

    #[test]
    fn seeded_sequences_are_reproducible() {
        let mut a = Geometric::with_seed(0.25, 0xfeed).unwrap();
        let mut b = Geometric::with_seed(0.25, 0xfeed).unwrap();
        let draws_a: Vec<_> = (0..1000).map(|_| a.level(32)).collect();
        let draws_b: Vec<_> = (0..1000).map(|_| b.level(32)).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn zero_cap_pins_to_zero() {
        let mut generator = Geometric::new(0.99).unwrap();
        for _ in 0..1000 {
            assert_eq!(generator.level(0), 0);
        }
    }
}
