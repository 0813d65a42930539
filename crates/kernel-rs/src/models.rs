//! Node model parameters and the compiled-in model registry.
//!
//! Every model is a typed parameter struct with documented defaults. The
//! NEST-style dictionaries used by scripts (`{"norm_value": 250.0, ...}`) are
//! overlaid onto those defaults by [`NodeModel::from_name`]; unknown keys and
//! out-of-range values are rejected at creation time.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KernelError, Result};

/// Names accepted by [`NodeModel::from_name`] (aliases excluded)
pub const NODE_MODELS: [&str; 6] = [
    "izhikevich",
    "izhikevich_prenorm",
    "poisson_generator",
    "spike_generator",
    "multimeter",
    "spike_recorder",
];

// ============================================================================
// NODE KINDS
// ============================================================================

/// Type tag of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    RegularNeuron,
    NormalizedNeuron,
    PoissonGenerator,
    SpikeGenerator,
    Multimeter,
    SpikeRecorder,
}

impl NodeKind {
    pub fn is_neuron(&self) -> bool {
        matches!(self, Self::RegularNeuron | Self::NormalizedNeuron)
    }

    /// Nodes that emit spikes into synapses
    pub fn is_spike_source(&self) -> bool {
        matches!(
            self,
            Self::RegularNeuron | Self::NormalizedNeuron | Self::PoissonGenerator | Self::SpikeGenerator
        )
    }

    /// Resolve a registered model name (including NEST aliases)
    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "izhikevich" => Ok(Self::RegularNeuron),
            "izhikevich_prenorm" | "pp_izhikevich_prenorm" => Ok(Self::NormalizedNeuron),
            "poisson_generator" => Ok(Self::PoissonGenerator),
            "spike_generator" => Ok(Self::SpikeGenerator),
            "multimeter" => Ok(Self::Multimeter),
            "spike_recorder" | "spike_detector" => Ok(Self::SpikeRecorder),
            other => Err(KernelError::UnknownModel(other.to_string())),
        }
    }
}

// ============================================================================
// NEURON PARAMETERS
// ============================================================================

/// Parameters for the Izhikevich neuron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IzhikevichParams {
    pub a: f64,          // Time scale of the recovery variable
    pub b: f64,          // Sensitivity of recovery to V_m
    pub c: f64,          // After-spike reset of V_m (mV)
    pub d: f64,          // After-spike increment of U_m
    #[serde(rename = "I_e")]
    pub i_e: f64,        // Constant input current (pA)
    #[serde(rename = "V_th")]
    pub v_th: f64,       // Spike threshold (mV)
    #[serde(rename = "V_min")]
    pub v_min: Option<f64>, // Lower bound of V_m (mV)
    /// Forward Euler when true, the published half-step numerics otherwise
    pub consistent_integration: bool,
    /// Post-synaptic trace time constant (ms)
    pub tau_minus: f64,
}

impl Default for IzhikevichParams {
    fn default() -> Self {
        // Regular spiking
        Self {
            a: 0.02,
            b: 0.2,
            c: -65.0,
            d: 8.0,
            i_e: 0.0,
            v_th: 30.0,
            v_min: None,
            consistent_integration: true,
            tau_minus: 20.0,
        }
    }
}

impl IzhikevichParams {
    /// `(a, b, c, d)` are taken as given; only the trace constant is checked.
    pub fn validate(&self) -> Result<()> {
        if !(self.tau_minus.is_finite() && self.tau_minus > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "tau_minus must be positive, got {}",
                self.tau_minus
            )));
        }
        if self.v_min.is_some_and(f64::is_nan) {
            return Err(KernelError::InvalidParameter("V_min must not be NaN".into()));
        }
        Ok(())
    }
}

/// Parameters for the drive-normalized Izhikevich neuron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrenormParams {
    #[serde(flatten)]
    pub neuron: IzhikevichParams,
    pub norm_value: f64,  // Target long-run drive (pA)
    pub norm_period: f64, // Averaging window before normalization starts (ms)
    /// Also rescale incoming plastic weights to sum to `norm_value`
    /// at every `norm_period` boundary
    pub normalize_weights: bool,
}

impl Default for PrenormParams {
    fn default() -> Self {
        Self {
            neuron: IzhikevichParams::default(),
            norm_value: 30.0,
            norm_period: 100.0,
            normalize_weights: false,
        }
    }
}

impl PrenormParams {
    pub fn new(norm_value: f64, norm_period: f64, tau_minus: f64) -> Self {
        Self {
            neuron: IzhikevichParams {
                tau_minus,
                ..Default::default()
            },
            norm_value,
            norm_period,
            normalize_weights: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.neuron.validate()?;
        if !(self.norm_value.is_finite() && self.norm_value > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "norm_value must be positive, got {}",
                self.norm_value
            )));
        }
        if !(self.norm_period.is_finite() && self.norm_period > 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "norm_period must be positive, got {}",
                self.norm_period
            )));
        }
        Ok(())
    }
}

// ============================================================================
// GENERATOR AND DEVICE PARAMETERS
// ============================================================================

/// Poisson generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoissonGeneratorParams {
    pub rate: f64,         // Firing rate (Hz)
    pub start: f64,        // Activation time (ms)
    pub stop: Option<f64>, // Deactivation time (ms)
}

impl Default for PoissonGeneratorParams {
    fn default() -> Self {
        Self {
            rate: 0.0,
            start: 0.0,
            stop: None,
        }
    }
}

impl PoissonGeneratorParams {
    pub fn new(rate: f64) -> Self {
        Self {
            rate,
            ..Default::default()
        }
    }

    /// Generator active from t = 0 for `duration` ms
    pub fn for_duration(rate: f64, duration: f64) -> Self {
        Self {
            rate,
            start: 0.0,
            stop: Some(duration),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rate.is_finite() && self.rate >= 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "rate must be a non-negative frequency, got {}",
                self.rate
            )));
        }
        if !(self.start.is_finite() && self.start >= 0.0) {
            return Err(KernelError::InvalidParameter(format!(
                "start must be non-negative, got {}",
                self.start
            )));
        }
        if let Some(stop) = self.stop {
            if stop.is_nan() || stop < self.start {
                return Err(KernelError::InvalidParameter(format!(
                    "stop ({stop}) must not precede start ({})",
                    self.start
                )));
            }
        }
        Ok(())
    }
}

/// Spike generator parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeGeneratorParams {
    pub spike_times: Vec<f64>, // Spike times (ms), sorted
}

impl SpikeGeneratorParams {
    pub fn new(spike_times: Vec<f64>) -> Self {
        Self { spike_times }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.spike_times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(KernelError::InvalidParameter(format!(
                "spike times must be positive, got {t}"
            )));
        }
        if self.spike_times.windows(2).any(|w| w[1] < w[0]) {
            return Err(KernelError::InvalidParameter(
                "spike times must be sorted".into(),
            ));
        }
        Ok(())
    }
}

/// Multimeter parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultimeterParams {
    pub record_from: Vec<String>, // Variables to record
    pub interval: f64,            // Recording interval (ms)
}

impl Default for MultimeterParams {
    fn default() -> Self {
        Self {
            record_from: vec![],
            interval: 1.0,
        }
    }
}

impl MultimeterParams {
    pub fn new(record_from: &[&str], interval: f64) -> Self {
        Self {
            record_from: record_from.iter().map(|s| s.to_string()).collect(),
            interval,
        }
    }
}

// ============================================================================
// NODE MODEL
// ============================================================================

/// Model and parameters of a population
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeModel {
    /// Izhikevich neuron
    Izhikevich(IzhikevichParams),

    /// Izhikevich neuron with normalized incoming drive
    IzhikevichPrenorm(PrenormParams),

    /// Poisson generator
    PoissonGenerator(PoissonGeneratorParams),

    /// Spike generator
    SpikeGenerator(SpikeGeneratorParams),

    /// Multimeter (record state variables)
    Multimeter(MultimeterParams),

    /// Spike recorder
    SpikeRecorder,
}

impl NodeModel {
    /// Registered model name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Izhikevich(_) => "izhikevich",
            Self::IzhikevichPrenorm(_) => "izhikevich_prenorm",
            Self::PoissonGenerator(_) => "poisson_generator",
            Self::SpikeGenerator(_) => "spike_generator",
            Self::Multimeter(_) => "multimeter",
            Self::SpikeRecorder => "spike_recorder",
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Izhikevich(_) => NodeKind::RegularNeuron,
            Self::IzhikevichPrenorm(_) => NodeKind::NormalizedNeuron,
            Self::PoissonGenerator(_) => NodeKind::PoissonGenerator,
            Self::SpikeGenerator(_) => NodeKind::SpikeGenerator,
            Self::Multimeter(_) => NodeKind::Multimeter,
            Self::SpikeRecorder => NodeKind::SpikeRecorder,
        }
    }

    /// Build a model from its registered name and a parameter dictionary
    /// (`null` or `{}` for defaults).
    pub fn from_name(name: &str, params: &Value) -> Result<Self> {
        let model = match NodeKind::lookup(name)? {
            NodeKind::RegularNeuron => {
                Self::Izhikevich(overlay(&IzhikevichParams::default(), params, name)?)
            }
            NodeKind::NormalizedNeuron => {
                Self::IzhikevichPrenorm(overlay(&PrenormParams::default(), params, name)?)
            }
            NodeKind::PoissonGenerator => {
                Self::PoissonGenerator(overlay(&PoissonGeneratorParams::default(), params, name)?)
            }
            NodeKind::SpikeGenerator => {
                Self::SpikeGenerator(overlay(&SpikeGeneratorParams::default(), params, name)?)
            }
            NodeKind::Multimeter => {
                Self::Multimeter(overlay(&MultimeterParams::default(), params, name)?)
            }
            NodeKind::SpikeRecorder => {
                if !is_empty_dict(params) {
                    return Err(KernelError::InvalidParameter(format!(
                        "{name} takes no parameters"
                    )));
                }
                Self::SpikeRecorder
            }
        };
        model.validate()?;
        Ok(model)
    }

    /// Model-local checks; grid-dependent checks happen when nodes are built.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Izhikevich(p) => p.validate(),
            Self::IzhikevichPrenorm(p) => p.validate(),
            Self::PoissonGenerator(p) => p.validate(),
            Self::SpikeGenerator(p) => p.validate(),
            Self::Multimeter(_) | Self::SpikeRecorder => Ok(()),
        }
    }
}

fn is_empty_dict(params: &Value) -> bool {
    match params {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Apply the keys of `patch` on top of `base`. Keys that `base` does not
/// serialize are rejected, so typos in dictionaries surface immediately.
pub(crate) fn overlay<T>(base: &T, patch: &Value, model: &str) -> Result<T>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = serde_json::to_value(base)
        .map_err(|e| KernelError::InvalidParameter(format!("{model}: {e}")))?;
    let fields = merged.as_object_mut().ok_or_else(|| {
        KernelError::InvalidParameter(format!("{model} parameters are not a dictionary"))
    })?;

    match patch {
        Value::Null => {}
        Value::Object(map) => {
            for (key, value) in map {
                if !fields.contains_key(key) {
                    return Err(KernelError::InvalidParameter(format!(
                        "{model} has no parameter '{key}'"
                    )));
                }
                fields.insert(key.clone(), value.clone());
            }
        }
        other => {
            return Err(KernelError::InvalidParameter(format!(
                "{model} expects a dictionary of parameters, got {other}"
            )))
        }
    }

    serde_json::from_value(merged).map_err(|e| KernelError::InvalidParameter(format!("{model}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_izhikevich_defaults() {
        let rs = IzhikevichParams::default();
        assert_eq!(rs.a, 0.02);
        assert_eq!(rs.b, 0.2);
        assert_eq!(rs.v_th, 30.0);
        assert!(rs.consistent_integration);
    }

    #[test]
    fn test_prenorm_from_dictionary() {
        let model = NodeModel::from_name(
            "pp_izhikevich_prenorm",
            &json!({"norm_value": 250.0, "norm_period": 150.0, "tau_minus": 10.0}),
        )
        .unwrap();
        match model {
            NodeModel::IzhikevichPrenorm(p) => {
                assert_eq!(p.norm_value, 250.0);
                assert_eq!(p.norm_period, 150.0);
                assert_eq!(p.neuron.tau_minus, 10.0);
                assert_eq!(p.neuron.a, 0.02);
            }
            other => panic!("unexpected model {other:?}"),
        }
    }

    #[test]
    fn test_nest_parameter_names() {
        let model =
            NodeModel::from_name("izhikevich", &json!({"a": 0.1, "d": 2.0, "V_th": 25.0, "I_e": 5.0}))
                .unwrap();
        assert_eq!(
            model,
            NodeModel::Izhikevich(IzhikevichParams {
                a: 0.1,
                d: 2.0,
                v_th: 25.0,
                i_e: 5.0,
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_unknown_model_and_key() {
        assert_eq!(
            NodeModel::from_name("iaf_psc_alpha", &Value::Null),
            Err(KernelError::UnknownModel("iaf_psc_alpha".into()))
        );
        assert!(matches!(
            NodeModel::from_name("izhikevich", &json!({"tau_m": 10.0})),
            Err(KernelError::InvalidParameter(_))
        ));
        assert!(matches!(
            NodeModel::from_name("spike_detector", &json!({"to_file": true})),
            Err(KernelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(NodeModel::from_name("poisson_generator", &json!({"rate": -5.0})).is_err());
        assert!(NodeModel::from_name("izhikevich_prenorm", &json!({"norm_period": 0.0})).is_err());
        assert!(NodeModel::from_name("spike_generator", &json!({"spike_times": [2.0, 1.0]})).is_err());
        // Implausible dynamics are accepted as-is
        assert!(NodeModel::from_name("izhikevich", &json!({"a": -3.0, "c": 100.0})).is_ok());
    }

    #[test]
    fn test_poisson_for_duration() {
        let p = PoissonGeneratorParams::for_duration(10_000.0, 1000.0);
        assert_eq!(p.stop, Some(1000.0));
        assert!(p.validate().is_ok());
    }
}
