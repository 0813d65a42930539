//! Spike sources.

use prenorm_core::{Time, TimeGrid};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::models::{PoissonGeneratorParams, SpikeGeneratorParams};
use crate::random::RandomStream;

// ============================================================================
// POISSON GENERATOR
// ============================================================================

/// Poisson process with exponential inter-spike intervals of mean
/// `1000 / rate` ms, drawn from the generator's own stream.
#[derive(Debug, Clone)]
pub struct PoissonGenerator {
    pub params: PoissonGeneratorParams,
    rng: RandomStream,
    next_spike: Option<Time>,
}

impl PoissonGenerator {
    pub fn new(params: PoissonGeneratorParams, rng: RandomStream) -> Self {
        Self {
            params,
            rng,
            next_spike: None,
        }
    }

    /// Replace the parameters; the pending spike time is redrawn from the
    /// current time on the next update.
    pub fn set_params(&mut self, params: PoissonGeneratorParams) {
        self.params = params;
        self.next_spike = None;
    }

    fn rate_per_ms(&self) -> f64 {
        self.params.rate / 1000.0
    }

    /// Next spike time at or after `current_time`, or `None` when the
    /// generator is silent or past `stop`.
    pub fn next_spike_time(&mut self, current_time: Time) -> Result<Option<Time>> {
        if self.params.rate <= 0.0 {
            return Ok(None);
        }
        let next = match self.next_spike {
            Some(t) if t >= current_time => t,
            _ => {
                let origin = current_time.max(self.params.start);
                let t = origin + self.rng.exponential(self.rate_per_ms())?;
                self.next_spike = Some(t);
                t
            }
        };
        Ok(match self.params.stop {
            Some(stop) if next >= stop => None,
            _ => Some(next),
        })
    }

    fn advance(&mut self, from: Time) -> Result<()> {
        let interval = self.rng.exponential(self.rate_per_ms())?;
        self.next_spike = Some(from + interval);
        Ok(())
    }

    /// Number of spikes falling into `step`
    pub fn update(&mut self, step: u64, grid: &TimeGrid) -> Result<u32> {
        let t0 = grid.time_of(step);
        let t1 = grid.time_of(step + 1);
        let mut count = 0;
        while let Some(t) = self.next_spike_time(t0)? {
            if t >= t1 {
                break;
            }
            count += 1;
            self.advance(t)?;
        }
        Ok(count)
    }
}

// ============================================================================
// SPIKE GENERATOR
// ============================================================================

/// Emits spikes at prescribed on-grid times. A spike at time `t` is emitted
/// by the step that ends at `t`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeGenerator {
    pub params: SpikeGeneratorParams,
    /// Spike times as step counts
    spike_steps: Vec<u64>,
    cursor: usize,
}

impl SpikeGenerator {
    pub fn new(params: SpikeGeneratorParams, grid: &TimeGrid) -> Result<Self> {
        let spike_steps = params
            .spike_times
            .iter()
            .map(|&t| {
                grid.steps_exact(t).filter(|&s| s > 0).ok_or_else(|| {
                    KernelError::InvalidParameter(format!(
                        "spike time {t} ms is not a positive multiple of the resolution {} ms",
                        grid.resolution
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            params,
            spike_steps,
            cursor: 0,
        })
    }

    /// Spikes due in `step`; times already in the past are skipped.
    pub fn update(&mut self, step: u64) -> u32 {
        let due = step + 1;
        let mut count = 0;
        while let Some(&s) = self.spike_steps.get(self.cursor) {
            if s > due {
                break;
            }
            if s == due {
                count += 1;
            }
            self.cursor += 1;
        }
        count
    }
}
