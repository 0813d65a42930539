//! Seeded random streams.
//!
//! The kernel owns one master stream for connectivity and parameter draws.
//! Stochastic nodes get their own stream derived from the same seed, using
//! the node id as ChaCha stream number, so their output depends only on the
//! seed and the id.

use rand::seq::index;
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp, LogNormal, Normal};

use crate::error::{KernelError, Result};

#[derive(Debug, Clone)]
pub struct RandomStream {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomStream {
    /// Master stream for `seed`
    pub fn new(seed: u64) -> Self {
        Self::with_stream(seed, 0)
    }

    fn with_stream(seed: u64, stream: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(stream);
        Self { seed, rng }
    }

    /// Independent stream sharing this stream's seed
    pub fn derive(&self, stream: u64) -> Self {
        Self::with_stream(self.seed, stream)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw from `[low, high)`; `low == high` returns `low`
    pub fn uniform(&mut self, low: f64, high: f64) -> Result<f64> {
        if !(low.is_finite() && high.is_finite()) || low > high {
            return Err(KernelError::InvalidParameter(format!(
                "uniform bounds must satisfy low <= high, got [{low}, {high}]"
            )));
        }
        if low == high {
            return Ok(low);
        }
        Ok(self.rng.gen_range(low..high))
    }

    pub fn normal(&mut self, mean: f64, std: f64) -> Result<f64> {
        if !(mean.is_finite() && std.is_finite() && std >= 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "normal std must be finite and non-negative, got mean={mean}, std={std}"
            )));
        }
        let dist = Normal::new(mean, std).map_err(|e| {
            KernelError::InvalidParameter(format!("normal(mean={mean}, std={std}): {e}"))
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    pub fn lognormal(&mut self, mu: f64, sigma: f64) -> Result<f64> {
        if !(mu.is_finite() && sigma.is_finite() && sigma >= 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "lognormal sigma must be finite and non-negative, got mu={mu}, sigma={sigma}"
            )));
        }
        let dist = LogNormal::new(mu, sigma).map_err(|e| {
            KernelError::InvalidParameter(format!("lognormal(mu={mu}, sigma={sigma}): {e}"))
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    /// Exponential draw with the given rate (events per unit time)
    pub fn exponential(&mut self, rate: f64) -> Result<f64> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "exponential rate must be positive, got {rate}"
            )));
        }
        let dist = Exp::new(rate).map_err(|e| {
            KernelError::InvalidParameter(format!("exponential(rate={rate}): {e}"))
        })?;
        Ok(dist.sample(&mut self.rng))
    }

    pub fn bernoulli(&mut self, p: f64) -> Result<bool> {
        if !(0.0..=1.0).contains(&p) {
            return Err(KernelError::InvalidParameter(format!(
                "probability must lie in [0, 1], got {p}"
            )));
        }
        Ok(self.rng.gen_bool(p))
    }

    /// `k` distinct indices out of `0..n`, in sampling order
    pub fn choose_distinct(&mut self, n: usize, k: usize) -> Vec<usize> {
        debug_assert!(k <= n);
        index::sample(&mut self.rng, n, k).into_vec()
    }
}
