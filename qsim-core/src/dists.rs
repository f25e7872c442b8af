//! Delay distributions for inter-arrival and service times
//!
//! Sources sample inter-arrival delays and servers sample service delays
//! through the [`Delay`] trait, so scenarios can plug in any distribution.
//! Every implementation has an entropy-seeded constructor for convenience and
//! a `seeded` constructor for deterministic runs.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Exp, Gamma, Normal as NormalDist, Uniform as UniformDist};
use std::time::Duration;

/// A source of sampled delays.
pub trait Delay {
    /// Sample the next delay.
    fn sample(&mut self) -> Duration;
}

/// Fixed delay; every sample returns the same duration.
#[derive(Debug, Clone)]
pub struct Constant {
    delay: Duration,
}

impl Constant {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Fixed delay given in seconds.
    pub fn secs(secs: f64) -> Self {
        Self::new(Duration::from_secs_f64(secs))
    }
}

impl Delay for Constant {
    fn sample(&mut self) -> Duration {
        self.delay
    }
}

/// Uniform delay on `[low, high)` seconds.
pub struct Uniform {
    dist: UniformDist<f64>,
    rng: StdRng,
}

impl Uniform {
    /// # Panics
    ///
    /// Panics if `low` is negative or not below `high`.
    pub fn new(low: f64, high: f64) -> Self {
        Self::with_rng(low, high, StdRng::from_entropy())
    }

    pub fn seeded(low: f64, high: f64, seed: u64) -> Self {
        Self::with_rng(low, high, StdRng::seed_from_u64(seed))
    }

    fn with_rng(low: f64, high: f64, rng: StdRng) -> Self {
        assert!(low >= 0.0, "Lower bound must be non-negative");
        assert!(low < high, "Lower bound must be below upper bound");
        Self {
            dist: UniformDist::new(low, high),
            rng,
        }
    }
}

impl Delay for Uniform {
    fn sample(&mut self) -> Duration {
        Duration::from_secs_f64(self.rng.sample(self.dist))
    }
}

/// Exponential delay with the given mean, in seconds.
///
/// An exact-zero draw is resampled; a zero delay would schedule a transition
/// at the current instant.
pub struct Exponential {
    dist: Exp<f64>,
    rng: StdRng,
}

impl Exponential {
    /// # Panics
    ///
    /// Panics if `mean` is not positive.
    pub fn from_mean(mean: f64) -> Self {
        Self::with_rng(mean, StdRng::from_entropy())
    }

    pub fn seeded(mean: f64, seed: u64) -> Self {
        Self::with_rng(mean, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mean: f64, rng: StdRng) -> Self {
        assert!(mean > 0.0, "Mean must be positive");
        Self {
            dist: Exp::new(1.0 / mean).expect("Mean must be positive"),
            rng,
        }
    }
}

impl Delay for Exponential {
    fn sample(&mut self) -> Duration {
        loop {
            let secs: f64 = self.rng.sample(self.dist);
            if secs != 0.0 {
                return Duration::from_secs_f64(secs);
            }
        }
    }
}

/// Normal delay with the given mean and standard deviation, in seconds.
///
/// Negative draws are clamped to zero; a delay cannot run backwards.
pub struct Normal {
    dist: NormalDist<f64>,
    rng: StdRng,
}

impl Normal {
    /// # Panics
    ///
    /// Panics if `std_dev` is not finite and non-negative.
    pub fn new(mean: f64, std_dev: f64) -> Self {
        Self::with_rng(mean, std_dev, StdRng::from_entropy())
    }

    pub fn seeded(mean: f64, std_dev: f64, seed: u64) -> Self {
        Self::with_rng(mean, std_dev, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mean: f64, std_dev: f64, rng: StdRng) -> Self {
        Self {
            dist: NormalDist::new(mean, std_dev).expect("Standard deviation must be valid"),
            rng,
        }
    }
}

impl Delay for Normal {
    fn sample(&mut self) -> Duration {
        let secs: f64 = self.rng.sample(self.dist);
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Erlang delay with the given mean and shape `k`, in seconds.
///
/// Modeled as a Gamma distribution with shape `k` and scale `mean / k`. As
/// with [`Exponential`], an exact-zero draw is resampled.
pub struct Erlang {
    dist: Gamma<f64>,
    rng: StdRng,
}

impl Erlang {
    /// # Panics
    ///
    /// Panics if `mean` is not positive or `k` is zero.
    pub fn from_mean(mean: f64, k: u32) -> Self {
        Self::with_rng(mean, k, StdRng::from_entropy())
    }

    pub fn seeded(mean: f64, k: u32, seed: u64) -> Self {
        Self::with_rng(mean, k, StdRng::seed_from_u64(seed))
    }

    fn with_rng(mean: f64, k: u32, rng: StdRng) -> Self {
        assert!(mean > 0.0, "Mean must be positive");
        assert!(k > 0, "Shape must be positive");
        Self {
            dist: Gamma::new(f64::from(k), mean / f64::from(k)).expect("Erlang parameters must be valid"),
            rng,
        }
    }
}

impl Delay for Erlang {
    fn sample(&mut self) -> Duration {
        loop {
            let secs: f64 = self.rng.sample(self.dist);
            if secs != 0.0 {
                return Duration::from_secs_f64(secs);
            }
        }
    }
}
