//! Izhikevich neuron dynamics.
//!
//! ```text
//! dv/dt = 0.04 v² + 5 v + 140 - u + I
//! du/dt = a (b v - u)
//!
//! if v >= V_th:
//!     v = c
//!     u = u + d
//! ```
//!
//! [`Izhikevich`] integrates the equations with the drive delivered to it in
//! the current step. [`IzhikevichPrenorm`] first rescales that drive against a
//! running average so that its long-run mean equals `norm_value`.

use prenorm_core::{Current, Time, Voltage};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::models::{IzhikevichParams, PrenormParams};
use crate::NodeId;

/// Running averages below this are treated as "no drive yet".
const MIN_DRIVE_AVERAGE: f64 = 1e-12;

// ============================================================================
// IZHIKEVICH
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Izhikevich {
    pub params: IzhikevichParams,
    pub v: Voltage,
    pub u: f64,
    /// Synaptic input accumulated for the current step
    input: Current,
    /// Raw synaptic drive consumed by the last step
    last_input: Current,
    /// Drive actually integrated by the last step
    last_drive: Current,
    /// Post-synaptic trace value right after `last_spike_step`
    post_trace: f64,
    last_spike_step: Option<u64>,
    diverged: Option<Time>,
}

impl Izhikevich {
    pub fn new(params: IzhikevichParams) -> Self {
        Self {
            v: params.c,
            u: params.b * params.c,
            params,
            input: 0.0,
            last_input: 0.0,
            last_drive: 0.0,
            post_trace: 0.0,
            last_spike_step: None,
            diverged: None,
        }
    }

    /// Add delivered synaptic weight to this step's accumulator
    pub fn receive(&mut self, amount: Current) {
        self.input += amount;
    }

    pub fn pending_input(&self) -> Current {
        self.input
    }

    pub fn last_input(&self) -> Current {
        self.last_input
    }

    pub fn last_drive(&self) -> Current {
        self.last_drive
    }

    pub fn last_spike_step(&self) -> Option<u64> {
        self.last_spike_step
    }

    pub fn is_diverged(&self) -> bool {
        self.diverged.is_some()
    }

    /// Take the accumulated input, leaving the accumulator empty
    fn take_input(&mut self) -> Current {
        let input = self.input;
        self.input = 0.0;
        self.last_input = input;
        input
    }

    /// Post-synaptic trace at the start of `step`, excluding a spike emitted
    /// during `step` itself.
    pub fn post_trace_at(&self, step: u64, dt: f64) -> f64 {
        match self.last_spike_step {
            Some(last) if step > last => {
                let elapsed = (step - last) as f64 * dt;
                self.post_trace * (-elapsed / self.params.tau_minus).exp()
            }
            Some(_) => self.post_trace_before_last(),
            None => 0.0,
        }
    }

    // The stored trace already includes the spike of `last_spike_step`.
    fn post_trace_before_last(&self) -> f64 {
        self.post_trace - 1.0
    }

    /// Integrate one step of the raw accumulated input.
    pub fn integrate(&mut self, id: NodeId, step: u64, dt: f64) -> Result<bool> {
        let drive = self.take_input();
        self.integrate_drive(id, step, dt, drive)
    }

    /// Integrate one step with an explicit synaptic drive; returns whether
    /// the neuron fired.
    pub(crate) fn integrate_drive(&mut self, id: NodeId, step: u64, dt: f64, drive: Current) -> Result<bool> {
        if let Some(time) = self.diverged {
            return Err(KernelError::NumericDivergence { node: id, time });
        }
        self.last_drive = drive;

        let p = &self.params;
        let i_total = drive + p.i_e;
        if p.consistent_integration {
            let (v_old, u_old) = (self.v, self.u);
            self.v += dt * (0.04 * v_old * v_old + 5.0 * v_old + 140.0 - u_old + i_total);
            self.u += dt * p.a * (p.b * v_old - u_old);
        } else {
            // Izhikevich (2003): two half steps for v, u from the new v
            for _ in 0..2 {
                self.v += dt * 0.5 * (0.04 * self.v * self.v + 5.0 * self.v + 140.0 - self.u + i_total);
            }
            self.u += dt * p.a * (p.b * self.v - self.u);
        }

        // checked before clamping and threshold so NaN/Inf cannot be masked
        if !(self.v.is_finite() && self.u.is_finite()) {
            let time = (step + 1) as f64 * dt;
            self.diverged = Some(time);
            return Err(KernelError::NumericDivergence { node: id, time });
        }

        if let Some(v_min) = p.v_min {
            self.v = self.v.max(v_min);
        }

        if self.v >= p.v_th {
            self.v = p.c;
            self.u += p.d;
            self.post_trace = self.post_trace_at(step, dt) + 1.0;
            self.last_spike_step = Some(step);
            return Ok(true);
        }
        Ok(false)
    }
}

// ============================================================================
// NORMALIZED IZHIKEVICH
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IzhikevichPrenorm {
    pub neuron: Izhikevich,
    pub norm_value: Current,
    pub norm_period: Time,
    /// `norm_period` in steps
    pub norm_period_steps: u64,
    pub normalize_weights: bool,
    /// Exponential running average of the raw drive
    drive_avg: Current,
    steps_integrated: u64,
}

impl IzhikevichPrenorm {
    pub fn new(params: PrenormParams, norm_period_steps: u64) -> Self {
        Self {
            neuron: Izhikevich::new(params.neuron),
            norm_value: params.norm_value,
            norm_period: params.norm_period,
            norm_period_steps: norm_period_steps.max(1),
            normalize_weights: params.normalize_weights,
            drive_avg: 0.0,
            steps_integrated: 0,
        }
    }

    pub fn drive_avg(&self) -> Current {
        self.drive_avg
    }

    pub fn params(&self) -> PrenormParams {
        PrenormParams {
            neuron: self.neuron.params.clone(),
            norm_value: self.norm_value,
            norm_period: self.norm_period,
            normalize_weights: self.normalize_weights,
        }
    }

    /// Replace the parameters, keeping the dynamic state
    pub fn set_params(&mut self, params: PrenormParams, norm_period_steps: u64) {
        self.neuron.params = params.neuron;
        self.norm_value = params.norm_value;
        self.norm_period = params.norm_period;
        self.norm_period_steps = norm_period_steps.max(1);
        self.normalize_weights = params.normalize_weights;
    }

    /// Divisor applied to the raw drive; 1.0 until a full period has been
    /// averaged or while no drive has been seen.
    pub fn divisor(&self) -> f64 {
        if self.steps_integrated < self.norm_period_steps || self.drive_avg <= MIN_DRIVE_AVERAGE {
            1.0
        } else {
            self.drive_avg / self.norm_value
        }
    }

    /// Whether `step` closes a normalization period
    pub fn at_period_boundary(&self, step: u64) -> bool {
        (step + 1) % self.norm_period_steps == 0
    }

    pub fn integrate(&mut self, id: NodeId, step: u64, dt: f64) -> Result<bool> {
        let raw = self.neuron.take_input();
        let effective = raw / self.divisor();

        let decay = 1.0 - (-dt / self.neuron.params.tau_minus).exp();
        self.drive_avg += (raw - self.drive_avg) * decay;
        self.steps_integrated += 1;

        self.neuron.integrate_drive(id, step, dt, effective)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.1;

    fn run(neuron: &mut Izhikevich, input: f64, steps: u64) -> usize {
        let mut spikes = 0;
        for step in 0..steps {
            neuron.receive(input);
            if neuron.integrate(1, step, DT).unwrap() {
                spikes += 1;
            }
        }
        spikes
    }

    #[test]
    fn test_initial_state() {
        let n = Izhikevich::new(IzhikevichParams::default());
        assert_eq!(n.v, -65.0);
        assert_eq!(n.u, -13.0);
    }

    #[test]
    fn test_quiet_without_input() {
        let mut n = Izhikevich::new(IzhikevichParams::default());
        assert_eq!(run(&mut n, 0.0, 5000), 0);
        assert!(n.v < -60.0);
    }

    #[test]
    fn test_tonic_spiking_and_reset() {
        let mut n = Izhikevich::new(IzhikevichParams::default());
        let spikes = run(&mut n, 10.0, 10_000);
        assert!(spikes > 5, "spikes = {spikes}");
        assert!(n.v < 30.0);
        assert!(n.last_spike_step().is_some());
    }

    #[test]
    fn test_single_euler_step() {
        let mut n = Izhikevich::new(IzhikevichParams::default());
        n.receive(10.0);
        n.integrate(1, 0, DT).unwrap();
        let v0: f64 = -65.0;
        let u0: f64 = -13.0;
        let expected_v = v0 + DT * (0.04 * v0 * v0 + 5.0 * v0 + 140.0 - u0 + 10.0);
        let expected_u = u0 + DT * 0.02 * (0.2 * v0 - u0);
        assert!((n.v - expected_v).abs() < 1e-12);
        assert!((n.u - expected_u).abs() < 1e-12);
        assert_eq!(n.pending_input(), 0.0);
        assert_eq!(n.last_input(), 10.0);
    }

    #[test]
    fn test_published_numerics_also_spike() {
        let params = IzhikevichParams {
            consistent_integration: false,
            ..Default::default()
        };
        let mut n = Izhikevich::new(params);
        assert!(run(&mut n, 10.0, 10_000) > 5);
    }

    #[test]
    fn test_divergence_is_sticky() {
        let params = IzhikevichParams {
            a: f64::NAN,
            ..Default::default()
        };
        let mut n = Izhikevich::new(params);
        let err = n.integrate(4, 0, DT).unwrap_err();
        assert_eq!(err, KernelError::NumericDivergence { node: 4, time: DT });
        assert!(n.is_diverged());
        assert_eq!(n.integrate(4, 1, DT).unwrap_err(), err);
    }

    #[test]
    fn test_post_trace_decay() {
        let params = IzhikevichParams {
            i_e: 1000.0,
            tau_minus: 10.0,
            ..Default::default()
        };
        let mut n = Izhikevich::new(params);
        let mut step = 0;
        while !n.integrate(1, step, DT).unwrap() {
            step += 1;
        }
        // trace excludes the spike of its own step
        assert_eq!(n.post_trace_at(step, DT), 0.0);
        let later = n.post_trace_at(step + 100, DT);
        assert!((later - (-1.0f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_no_normalization_before_first_period() {
        let mut n = IzhikevichPrenorm::new(PrenormParams::new(250.0, 15.0, 10.0), 150);
        for step in 0..149 {
            n.neuron.receive(2.5);
            n.integrate(1, step, DT).unwrap();
            assert_eq!(n.neuron.last_drive(), n.neuron.last_input());
        }
        assert!(n.drive_avg() > 0.0);
    }

    #[test]
    fn test_constant_drive_is_scaled_to_norm_value() {
        let mut n = IzhikevichPrenorm::new(PrenormParams::new(20.0, 10.0, 10.0), 100);
        for step in 0..2000 {
            n.neuron.receive(2.5);
            n.integrate(1, step, DT).unwrap();
        }
        assert!((n.drive_avg() - 2.5).abs() < 1e-6);
        assert!((n.neuron.last_drive() - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_silent_input_keeps_divisor_one() {
        let mut n = IzhikevichPrenorm::new(PrenormParams::new(20.0, 1.0, 10.0), 10);
        for step in 0..100 {
            n.integrate(1, step, DT).unwrap();
        }
        assert_eq!(n.divisor(), 1.0);
        assert_eq!(n.neuron.last_drive(), 0.0);
    }
}
