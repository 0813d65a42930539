//! # Prenorm Core
//!
//! Shared types for the prenorm spiking network kernel.
//!
//! ## Contents
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`TimeGrid`] | Converts between milliseconds and integer simulation steps |
//! | [`TimeSeries`] | Ordered `(time, value)` samples of one observable |
//! | Unit aliases | `Time`, `Voltage`, `Current`, `Weight` |
//!
//! All simulated time is kept as an integer step count internally; the
//! millisecond values handed to and returned from the kernel are derived
//! from it through a [`TimeGrid`], so no drift accumulates over long runs.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Time point (ms)
pub type Time = f64;

/// Voltage (mV)
pub type Voltage = f64;

/// Current (pA)
pub type Current = f64;

/// Synaptic weight (pA)
pub type Weight = f64;

/// Relative tolerance used when checking that a time lies on the grid.
const GRID_TOLERANCE: f64 = 1e-9;

// ============================================================================
// TIME GRID
// ============================================================================

/// Fixed simulation step grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    /// Step size (ms)
    pub resolution: Time,
}

impl TimeGrid {
    pub fn new(resolution: Time) -> Option<Self> {
        if resolution.is_finite() && resolution > 0.0 {
            Some(Self { resolution })
        } else {
            None
        }
    }

    /// Time at the start of `step`
    pub fn time_of(&self, step: u64) -> Time {
        step as f64 * self.resolution
    }

    /// Exact number of steps covered by `ms`, or `None` when `ms` is negative,
    /// non-finite or not a multiple of the resolution.
    pub fn steps_exact(&self, ms: Time) -> Option<u64> {
        if !ms.is_finite() || ms < 0.0 {
            return None;
        }
        let steps = ms / self.resolution;
        let rounded = steps.round();
        if (steps - rounded).abs() > GRID_TOLERANCE * rounded.max(1.0) {
            return None;
        }
        Some(rounded as u64)
    }

    /// Nearest number of steps for `ms` (negative and non-finite values give `None`)
    pub fn steps_rounded(&self, ms: Time) -> Option<u64> {
        if !ms.is_finite() || ms < 0.0 {
            return None;
        }
        Some((ms / self.resolution).round() as u64)
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self { resolution: 0.1 }
    }
}

// ============================================================================
// TIME SERIES
// ============================================================================

/// Time series data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Time points
    pub time: Vec<Time>,
    /// Values at each time point
    pub values: Vec<f64>,
    /// Variable name
    pub name: String,
    /// Units
    pub units: Option<String>,
}

impl TimeSeries {
    pub fn new(name: &str) -> Self {
        Self {
            time: Vec::new(),
            values: Vec::new(),
            name: name.to_string(),
            units: None,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn push(&mut self, t: Time, v: f64) {
        self.time.push(t);
        self.values.push(v);
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// `(time, value)` pairs in recording order
    pub fn iter(&self) -> impl Iterator<Item = (Time, f64)> + '_ {
        self.time.iter().copied().zip(self.values.iter().copied())
    }

    /// Mean of the values sampled at or after `from`
    pub fn mean_after(&self, from: Time) -> Option<f64> {
        let (sum, n) = self
            .iter()
            .filter(|&(t, _)| t >= from)
            .fold((0.0, 0usize), |(s, n), (_, v)| (s + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Values as an ndarray vector
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from(self.values.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_exact_steps() {
        let grid = TimeGrid::new(0.1).unwrap();
        assert_eq!(grid.steps_exact(1.0), Some(10));
        assert_eq!(grid.steps_exact(0.3), Some(3));
        assert_eq!(grid.steps_exact(0.0), Some(0));
        assert_eq!(grid.steps_exact(0.15), None);
        assert_eq!(grid.steps_exact(-1.0), None);
        assert_eq!(grid.steps_exact(f64::NAN), None);
    }

    #[test]
    fn test_grid_rounding() {
        let grid = TimeGrid::new(0.1).unwrap();
        assert_eq!(grid.steps_rounded(0.12), Some(1));
        assert_eq!(grid.steps_rounded(4.96), Some(50));
        assert_eq!(grid.steps_rounded(0.04), Some(0));
        assert!(TimeGrid::new(0.0).is_none());
        assert!(TimeGrid::new(-0.1).is_none());
    }

    #[test]
    fn test_time_series() {
        let mut ts = TimeSeries::new("V_m").with_units("mV");
        ts.push(0.1, -65.0);
        ts.push(0.2, -64.0);
        ts.push(0.3, -63.0);
        assert_eq!(ts.len(), 3);
        assert_eq!(ts.mean_after(0.2), Some(-63.5));
        assert_eq!(ts.mean_after(1.0), None);
        assert_eq!(ts.to_array().len(), 3);
    }
}
