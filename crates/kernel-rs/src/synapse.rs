//! Synapse models.
//!
//! `static_synapse` transmits a fixed weight. `stdp_connection_norm` is a
//! pair-based STDP synapse with power-law weight dependence:
//!
//! ```text
//! pre spike arrives : w -= alpha * lambda * f_minus(w) * x_post    (depression)
//!                     x_pre += 1
//! post spike        : w += lambda * (1 - alpha) * f_plus(w) * x_pre (potentiation)
//!
//! with w_max: f_plus(w)  = w_max * (1 - w / w_max)^mu_plus
//!             f_minus(w) = w_max * (w / w_max)^mu_minus
//! otherwise:  f_plus(w)  = w^mu_plus,  f_minus(w) = w^mu_minus
//! ```
//!
//! Traces decay exponentially (`tau_plus` for `x_pre`, the target's
//! `tau_minus` for `x_post`). A trace increment made during a step only
//! pairs with spikes of later steps.

use prenorm_core::{Current, Weight};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result};
use crate::models::overlay;
use crate::NodeId;

/// Index into the kernel's synapse table
pub type SynapseId = usize;

/// Names accepted by [`SynapseModel::from_name`]
pub const SYNAPSE_MODELS: [&str; 2] = ["static_synapse", "stdp_connection_norm"];

// ============================================================================
// SYNAPSE MODELS
// ============================================================================

/// Normalized STDP parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdpNormParams {
    pub tau_plus: f64,        // Time constant for potentiation (ms)
    pub lambda: f64,          // Step size
    pub alpha: f64,           // Depression share of the step size
    pub mu_plus: f64,         // Weight dependence exponent for LTP
    pub mu_minus: f64,        // Weight dependence exponent for LTD
    #[serde(rename = "Wmax")]
    pub w_max: Option<Weight>, // Maximum weight
}

impl Default for StdpNormParams {
    fn default() -> Self {
        Self {
            tau_plus: 20.0,
            lambda: 0.01,
            alpha: 0.0,
            mu_plus: 1.0,
            mu_minus: 1.0,
            w_max: None,
        }
    }
}

impl StdpNormParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.tau_plus.is_finite() && self.tau_plus > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "tau_plus must be positive, got {}",
                self.tau_plus
            )));
        }
        for (name, value) in [
            ("lambda", self.lambda),
            ("alpha", self.alpha),
            ("mu_plus", self.mu_plus),
            ("mu_minus", self.mu_minus),
        ] {
            if !value.is_finite() {
                return Err(KernelError::InvalidParameter(format!("{name} must be finite")));
            }
        }
        if let Some(w_max) = self.w_max {
            if !(w_max.is_finite() && w_max > 0.0) {
                return Err(KernelError::InvalidParameter(format!(
                    "Wmax must be positive, got {w_max}"
                )));
            }
        }
        Ok(())
    }

    /// Whether `weight` lies in the admissible range
    pub fn admits(&self, weight: Weight) -> bool {
        weight >= 0.0 && self.w_max.map_or(weight.is_finite(), |w_max| weight <= w_max)
    }

    fn clip(&self, weight: Weight) -> Weight {
        match self.w_max {
            Some(w_max) => weight.clamp(0.0, w_max),
            None => weight.max(0.0),
        }
    }

    fn f_plus(&self, weight: Weight) -> f64 {
        match self.w_max {
            Some(w_max) => w_max * (1.0 - weight / w_max).powf(self.mu_plus),
            None => weight.powf(self.mu_plus),
        }
    }

    fn f_minus(&self, weight: Weight) -> f64 {
        match self.w_max {
            Some(w_max) => w_max * (weight / w_max).powf(self.mu_minus),
            None => weight.powf(self.mu_minus),
        }
    }
}

/// Synapse model types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SynapseModel {
    /// Static synapse (fixed weight)
    #[default]
    Static,

    /// STDP synapse with weight normalization support
    StdpConnectionNorm(StdpNormParams),
}

impl SynapseModel {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Static => "static_synapse",
            Self::StdpConnectionNorm(_) => "stdp_connection_norm",
        }
    }

    pub fn is_plastic(&self) -> bool {
        matches!(self, Self::StdpConnectionNorm(_))
    }

    /// Build a synapse model from its registered name and plasticity
    /// parameters (`null` or `{}` for defaults)
    pub fn from_name(name: &str, params: &Value) -> Result<Self> {
        let model = match name {
            "static_synapse" => {
                if let Value::Object(map) = params {
                    if let Some(key) = map.keys().next() {
                        return Err(KernelError::InvalidParameter(format!(
                            "static_synapse has no parameter '{key}'"
                        )));
                    }
                }
                Self::Static
            }
            "stdp_connection_norm" => {
                Self::StdpConnectionNorm(overlay(&StdpNormParams::default(), params, name)?)
            }
            other => return Err(KernelError::UnknownModel(other.to_string())),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Static => Ok(()),
            Self::StdpConnectionNorm(p) => p.validate(),
        }
    }
}

// ============================================================================
// SYNAPSE STATE
// ============================================================================

/// Plasticity state of a `stdp_connection_norm` synapse
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdpNormState {
    pub params: StdpNormParams,
    /// Pre-synaptic trace right after `last_pre_step`
    pre_trace: f64,
    /// Increment made at `last_pre_step`
    last_increment: f64,
    last_pre_step: Option<u64>,
    /// Cumulative weight transmitted by this synapse
    pub inc_weight_sum: Current,
}

impl StdpNormState {
    fn new(params: StdpNormParams) -> Self {
        Self {
            params,
            pre_trace: 0.0,
            last_increment: 0.0,
            last_pre_step: None,
            inc_weight_sum: 0.0,
        }
    }

    /// Pre-synaptic trace at `step`, excluding arrivals during `step`
    pub fn pre_trace_at(&self, step: u64, dt: f64) -> f64 {
        match self.last_pre_step {
            Some(last) if step > last => {
                let elapsed = (step - last) as f64 * dt;
                self.pre_trace * (-elapsed / self.params.tau_plus).exp()
            }
            Some(_) => self.pre_trace - self.last_increment,
            None => 0.0,
        }
    }
}

/// Synapse dynamics variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Plasticity {
    Static,
    StdpNorm(StdpNormState),
}

/// Directed synapse (edge)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synapse {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: Weight,
    /// Transmission delay in steps (>= 1)
    pub delay_steps: u64,
    pub plasticity: Plasticity,
}

impl Synapse {
    pub fn new(source: NodeId, target: NodeId, weight: Weight, delay_steps: u64, model: &SynapseModel) -> Self {
        debug_assert!(delay_steps >= 1);
        let plasticity = match model {
            SynapseModel::Static => Plasticity::Static,
            SynapseModel::StdpConnectionNorm(p) => Plasticity::StdpNorm(StdpNormState::new(p.clone())),
        };
        Self {
            source,
            target,
            weight,
            delay_steps,
            plasticity,
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self.plasticity {
            Plasticity::Static => "static_synapse",
            Plasticity::StdpNorm(_) => "stdp_connection_norm",
        }
    }

    pub fn is_plastic(&self) -> bool {
        matches!(self.plasticity, Plasticity::StdpNorm(_))
    }

    /// Cumulative transmitted weight (zero for static synapses)
    pub fn inc_weight_sum(&self) -> Current {
        match &self.plasticity {
            Plasticity::Static => 0.0,
            Plasticity::StdpNorm(state) => state.inc_weight_sum,
        }
    }

    /// Handle `multiplicity` pre-synaptic spikes arriving at `step`; returns
    /// the amount to add to the target's input accumulator.
    ///
    /// `post_trace` is the target's trace at `step`.
    pub fn deliver(&mut self, step: u64, multiplicity: u32, post_trace: f64, dt: f64) -> Current {
        let count = f64::from(multiplicity);
        match &mut self.plasticity {
            Plasticity::Static => self.weight * count,
            Plasticity::StdpNorm(state) => {
                let p = &state.params;
                let depression = p.alpha * p.lambda * p.f_minus(self.weight) * post_trace;
                self.weight = p.clip(self.weight - depression);

                let amount = self.weight * count;
                state.inc_weight_sum += amount;

                if state.last_pre_step == Some(step) {
                    // several arrivals in one step share the exclusion
                    state.pre_trace += count;
                    state.last_increment += count;
                } else {
                    state.pre_trace = state.pre_trace_at(step, dt) + count;
                    state.last_increment = count;
                    state.last_pre_step = Some(step);
                }
                amount
            }
        }
    }

    /// Potentiation for a post-synaptic spike emitted during `step`
    pub fn on_post_spike(&mut self, step: u64, dt: f64) {
        if let Plasticity::StdpNorm(state) = &mut self.plasticity {
            let x_pre = state.pre_trace_at(step, dt);
            let p = &state.params;
            let potentiation = p.lambda * (1.0 - p.alpha) * p.f_plus(self.weight) * x_pre;
            self.weight = p.clip(self.weight + potentiation);
        }
    }

    /// Multiply the weight of a plastic synapse, keeping it in range
    pub fn scale_weight(&mut self, factor: f64) {
        if let Plasticity::StdpNorm(state) = &self.plasticity {
            self.weight = state.params.clip(self.weight * factor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DT: f64 = 0.1;

    fn stdp(params: StdpNormParams, weight: f64) -> Synapse {
        Synapse::new(1, 2, weight, 10, &SynapseModel::StdpConnectionNorm(params))
    }

    #[test]
    fn test_static_delivery() {
        let mut syn = Synapse::new(1, 2, -5.0, 10, &SynapseModel::Static);
        assert_eq!(syn.deliver(3, 2, 0.7, DT), -10.0);
        syn.on_post_spike(4, DT);
        assert_eq!(syn.weight, -5.0);
        assert_eq!(syn.inc_weight_sum(), 0.0);
    }

    #[test]
    fn test_inc_weight_sum_accumulates() {
        let mut syn = stdp(StdpNormParams::default(), 2.5);
        syn.deliver(0, 1, 0.0, DT);
        syn.deliver(5, 3, 0.0, DT);
        assert_eq!(syn.inc_weight_sum(), 10.0);
    }

    #[test]
    fn test_pre_then_post_potentiates() {
        let params = StdpNormParams {
            lambda: 0.1,
            mu_plus: 0.0,
            tau_plus: 10.0,
            ..Default::default()
        };
        let mut syn = stdp(params, 1.0);
        syn.deliver(0, 1, 0.0, DT);
        syn.on_post_spike(100, DT);
        // additive: 0.1 * e^-1
        assert!((syn.weight - (1.0 + 0.1 * (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_post_then_pre_depresses() {
        let params = StdpNormParams {
            lambda: 0.1,
            alpha: 0.5,
            mu_minus: 0.0,
            ..Default::default()
        };
        let mut syn = stdp(params, 1.0);
        let amount = syn.deliver(10, 1, 0.5, DT);
        assert!((syn.weight - (1.0 - 0.5 * 0.1 * 0.5)).abs() < 1e-12);
        assert_eq!(amount, syn.weight);
    }

    #[test]
    fn test_same_step_arrival_does_not_pair() {
        let params = StdpNormParams {
            lambda: 0.1,
            mu_plus: 0.0,
            ..Default::default()
        };
        let mut syn = stdp(params, 1.0);
        syn.deliver(7, 2, 0.0, DT);
        syn.on_post_spike(7, DT);
        assert_eq!(syn.weight, 1.0);
        // the arrival pairs with the next post spike
        syn.on_post_spike(8, DT);
        assert!(syn.weight > 1.0);
    }

    #[test]
    fn test_arrivals_in_one_step_accumulate() {
        let params = StdpNormParams {
            lambda: 0.1,
            mu_plus: 0.0,
            ..Default::default()
        };
        let mut syn = stdp(params.clone(), 1.0);
        syn.deliver(3, 1, 0.0, DT);
        syn.deliver(7, 1, 0.0, DT);
        syn.deliver(7, 2, 0.0, DT);

        // only the arrival of step 3 is visible during step 7
        syn.on_post_spike(7, DT);
        let earlier = (-0.4 / params.tau_plus).exp();
        assert!((syn.weight - (1.0 + 0.1 * earlier)).abs() < 1e-12);

        let w = syn.weight;
        syn.on_post_spike(8, DT);
        let x_pre = (earlier + 3.0) * (-0.1 / params.tau_plus).exp();
        assert!((syn.weight - (w + 0.1 * x_pre)).abs() < 1e-12, "weight {}", syn.weight);
    }

    #[test]
    fn test_weight_bounds() {
        let params = StdpNormParams {
            lambda: 5.0,
            alpha: 0.0,
            mu_plus: 0.0,
            w_max: Some(3.0),
            ..Default::default()
        };
        let mut syn = stdp(params, 2.0);
        syn.deliver(0, 10, 0.0, DT);
        syn.on_post_spike(1, DT);
        assert_eq!(syn.weight, 3.0);

        let params = StdpNormParams {
            lambda: 5.0,
            alpha: 1.0,
            mu_minus: 0.0,
            ..Default::default()
        };
        let mut syn = stdp(params, 2.0);
        syn.deliver(0, 1, 10.0, DT);
        assert_eq!(syn.weight, 0.0);
    }

    #[test]
    fn test_multiplicative_dependence_with_w_max() {
        let params = StdpNormParams {
            lambda: 0.1,
            mu_plus: 1.0,
            w_max: Some(10.0),
            tau_plus: 20.0,
            ..Default::default()
        };
        let mut syn = stdp(params, 5.0);
        syn.deliver(0, 1, 0.0, DT);
        syn.on_post_spike(1, DT);
        let x_pre = (-DT / 20.0).exp();
        let expected = 5.0 + 0.1 * 10.0 * 0.5 * x_pre;
        assert!((syn.weight - expected).abs() < 1e-12);
    }

    #[test]
    fn test_scale_weight_is_clipped() {
        let params = StdpNormParams {
            w_max: Some(4.0),
            ..Default::default()
        };
        let mut syn = stdp(params, 2.0);
        syn.scale_weight(3.0);
        assert_eq!(syn.weight, 4.0);
    }

    #[test]
    fn test_from_name() {
        let model = SynapseModel::from_name(
            "stdp_connection_norm",
            &json!({"alpha": 0.0, "lambda": 0.01, "mu_plus": 0.0, "mu_minus": 0.0, "tau_plus": 10.0}),
        )
        .unwrap();
        assert!(model.is_plastic());
        assert_eq!(SynapseModel::from_name("static_synapse", &Value::Null), Ok(SynapseModel::Static));
        assert_eq!(
            SynapseModel::from_name("tsodyks_synapse", &Value::Null),
            Err(KernelError::UnknownModel("tsodyks_synapse".into()))
        );
        assert!(SynapseModel::from_name("stdp_connection_norm", &json!({"tau_plus": -1.0})).is_err());
    }
}
