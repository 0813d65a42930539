//! Tagged-variant node dispatch.

use prenorm_core::{Current, TimeGrid};
use serde_json::{json, Map, Value};

use crate::error::{KernelError, Result};
use crate::generator::{PoissonGenerator, SpikeGenerator};
use crate::models::{overlay, NodeKind, NodeModel, PrenormParams};
use crate::neuron::{Izhikevich, IzhikevichPrenorm};
use crate::random::RandomStream;
use crate::recording::{Multimeter, Recordable, SpikeRecorder};
use crate::NodeId;

/// Simulation entity owned by the kernel
#[derive(Debug, Clone)]
pub enum Node {
    Izhikevich(Izhikevich),
    IzhikevichPrenorm(IzhikevichPrenorm),
    PoissonGenerator(PoissonGenerator),
    SpikeGenerator(SpikeGenerator),
    Multimeter(Multimeter),
    SpikeRecorder(SpikeRecorder),
}

fn norm_period_steps(params: &PrenormParams, grid: &TimeGrid) -> Result<u64> {
    grid.steps_rounded(params.norm_period)
        .filter(|&s| s > 0)
        .ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "norm_period {} ms is shorter than one step",
                params.norm_period
            ))
        })
}

impl Node {
    /// Instantiate node `id` of `model`. Poisson generators take their own
    /// stream from `rng`, numbered by node id.
    pub fn build(id: NodeId, model: &NodeModel, grid: &TimeGrid, rng: &RandomStream) -> Result<Self> {
        Ok(match model {
            NodeModel::Izhikevich(p) => Self::Izhikevich(Izhikevich::new(p.clone())),
            NodeModel::IzhikevichPrenorm(p) => {
                Self::IzhikevichPrenorm(IzhikevichPrenorm::new(p.clone(), norm_period_steps(p, grid)?))
            }
            NodeModel::PoissonGenerator(p) => {
                Self::PoissonGenerator(PoissonGenerator::new(p.clone(), rng.derive(id as u64)))
            }
            NodeModel::SpikeGenerator(p) => Self::SpikeGenerator(SpikeGenerator::new(p.clone(), grid)?),
            NodeModel::Multimeter(p) => Self::Multimeter(Multimeter::new(id, p.clone(), grid)?),
            NodeModel::SpikeRecorder => Self::SpikeRecorder(SpikeRecorder::new()),
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Izhikevich(_) => NodeKind::RegularNeuron,
            Self::IzhikevichPrenorm(_) => NodeKind::NormalizedNeuron,
            Self::PoissonGenerator(_) => NodeKind::PoissonGenerator,
            Self::SpikeGenerator(_) => NodeKind::SpikeGenerator,
            Self::Multimeter(_) => NodeKind::Multimeter,
            Self::SpikeRecorder(_) => NodeKind::SpikeRecorder,
        }
    }

    pub fn model_name(&self) -> &'static str {
        match self {
            Self::Izhikevich(_) => "izhikevich",
            Self::IzhikevichPrenorm(_) => "izhikevich_prenorm",
            Self::PoissonGenerator(_) => "poisson_generator",
            Self::SpikeGenerator(_) => "spike_generator",
            Self::Multimeter(_) => "multimeter",
            Self::SpikeRecorder(_) => "spike_recorder",
        }
    }

    /// Izhikevich core of either neuron kind
    pub fn neuron(&self) -> Option<&Izhikevich> {
        match self {
            Self::Izhikevich(n) => Some(n),
            Self::IzhikevichPrenorm(n) => Some(&n.neuron),
            _ => None,
        }
    }

    pub fn neuron_mut(&mut self) -> Option<&mut Izhikevich> {
        match self {
            Self::Izhikevich(n) => Some(n),
            Self::IzhikevichPrenorm(n) => Some(&mut n.neuron),
            _ => None,
        }
    }

    pub fn add_input(&mut self, amount: Current) {
        if let Some(n) = self.neuron_mut() {
            n.receive(amount);
        }
    }

    /// Post-synaptic trace at `step`; zero for non-neurons
    pub fn post_trace_at(&self, step: u64, dt: f64) -> f64 {
        self.neuron().map_or(0.0, |n| n.post_trace_at(step, dt))
    }

    /// Advance one step; returns the number of spikes emitted.
    pub fn update(&mut self, id: NodeId, step: u64, grid: &TimeGrid) -> Result<u32> {
        let dt = grid.resolution;
        match self {
            Self::Izhikevich(n) => Ok(u32::from(n.integrate(id, step, dt)?)),
            Self::IzhikevichPrenorm(n) => Ok(u32::from(n.integrate(id, step, dt)?)),
            Self::PoissonGenerator(g) => g.update(step, grid),
            Self::SpikeGenerator(g) => Ok(g.update(step)),
            Self::Multimeter(_) | Self::SpikeRecorder(_) => Ok(0),
        }
    }

    /// Value of a recordable the node holds itself. Synapse-derived
    /// quantities (`inc_weight_sum`, `weight_sum`) are summed by the kernel.
    pub fn local_value(&self, rec: Recordable) -> Option<f64> {
        let neuron = self.neuron()?;
        match rec {
            Recordable::VM => Some(neuron.v),
            Recordable::UM => Some(neuron.u),
            Recordable::ISyn => Some(neuron.last_input()),
            Recordable::IEff => Some(neuron.last_drive()),
            Recordable::DriveAvg => match self {
                Self::IzhikevichPrenorm(n) => Some(n.drive_avg()),
                _ => None,
            },
            Recordable::IncWeightSum | Recordable::WeightSum => None,
        }
    }

    /// Parameters and state as a NEST-style dictionary
    pub fn status(&self, id: NodeId) -> Result<Value> {
        let mut status = match self {
            Self::Izhikevich(n) => to_dict(&n.params)?,
            Self::IzhikevichPrenorm(n) => to_dict(&n.params())?,
            Self::PoissonGenerator(g) => to_dict(&g.params)?,
            Self::SpikeGenerator(g) => to_dict(&g.params)?,
            Self::Multimeter(m) => to_dict(&m.params)?,
            Self::SpikeRecorder(_) => Map::new(),
        };
        if let Some(n) = self.neuron() {
            status.insert("V_m".into(), json!(n.v));
            status.insert("U_m".into(), json!(n.u));
        }
        if let Self::IzhikevichPrenorm(n) = self {
            status.insert("drive_avg".into(), json!(n.drive_avg()));
        }
        match self {
            Self::Multimeter(m) => {
                status.insert("n_events".into(), json!(m.data.n_samples()));
            }
            Self::SpikeRecorder(r) => {
                status.insert("n_events".into(), json!(r.data.n_events()));
            }
            _ => {}
        }
        status.insert("global_id".into(), json!(id));
        status.insert("model".into(), json!(self.model_name()));
        Ok(Value::Object(status))
    }

    /// Overlay a dictionary of parameters and state variables (`V_m`,
    /// `U_m`). Recording devices cannot be changed after creation.
    pub fn set_status(&mut self, patch: &Value, grid: &TimeGrid) -> Result<()> {
        let mut fields = match patch {
            Value::Object(map) => map.clone(),
            other => {
                return Err(KernelError::InvalidParameter(format!(
                    "status must be a dictionary, got {other}"
                )))
            }
        };
        let v_m = take_number(&mut fields, "V_m")?;
        let u_m = take_number(&mut fields, "U_m")?;
        if (v_m.is_some() || u_m.is_some()) && self.neuron().is_none() {
            return Err(KernelError::InvalidParameter(format!(
                "{} has no state variables V_m/U_m",
                self.model_name()
            )));
        }
        let patch = Value::Object(fields);
        let name = self.model_name();

        match self {
            Self::Izhikevich(n) => {
                let params = overlay(&n.params, &patch, name)?;
                params.validate()?;
                n.params = params;
            }
            Self::IzhikevichPrenorm(n) => {
                let params = overlay(&n.params(), &patch, name)?;
                params.validate()?;
                let steps = norm_period_steps(&params, grid)?;
                n.set_params(params, steps);
            }
            Self::PoissonGenerator(g) => {
                let params = overlay(&g.params, &patch, name)?;
                params.validate()?;
                g.set_params(params);
            }
            Self::SpikeGenerator(g) => {
                let params = overlay(&g.params, &patch, name)?;
                params.validate()?;
                *g = SpikeGenerator::new(params, grid)?;
            }
            Self::Multimeter(_) | Self::SpikeRecorder(_) => {
                if patch.as_object().is_some_and(|m| !m.is_empty()) {
                    return Err(KernelError::InvalidParameter(format!(
                        "{name} cannot be reconfigured after creation"
                    )));
                }
            }
        }

        if let Some(n) = self.neuron_mut() {
            if let Some(v) = v_m {
                n.v = v;
            }
            if let Some(u) = u_m {
                n.u = u;
            }
        }
        Ok(())
    }
}

fn to_dict<T: serde::Serialize>(params: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(KernelError::SimulationError(format!("parameters serialized to {other}"))),
        Err(e) => Err(KernelError::SimulationError(e.to_string())),
    }
}

fn take_number(fields: &mut Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match fields.remove(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| KernelError::InvalidParameter(format!("{key} must be a number, got {value}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IzhikevichParams, PoissonGeneratorParams};

    fn grid() -> TimeGrid {
        TimeGrid::new(0.1).unwrap()
    }

    fn build(model: NodeModel) -> Node {
        Node::build(1, &model, &grid(), &RandomStream::new(1)).unwrap()
    }

    #[test]
    fn test_build_kinds() {
        let n = build(NodeModel::IzhikevichPrenorm(PrenormParams::new(250.0, 150.0, 10.0)));
        assert_eq!(n.kind(), NodeKind::NormalizedNeuron);
        assert_eq!(n.model_name(), "izhikevich_prenorm");
        match &n {
            Node::IzhikevichPrenorm(p) => assert_eq!(p.norm_period_steps, 1500),
            other => panic!("unexpected node {other:?}"),
        }
        assert!(build(NodeModel::SpikeRecorder).neuron().is_none());
    }

    #[test]
    fn test_input_and_local_values() {
        let mut n = build(NodeModel::Izhikevich(IzhikevichParams::default()));
        n.add_input(4.0);
        assert_eq!(n.update(1, 0, &grid()).unwrap(), 0);
        assert_eq!(n.local_value(Recordable::ISyn), Some(4.0));
        assert_eq!(n.local_value(Recordable::IEff), Some(4.0));
        assert_eq!(n.local_value(Recordable::DriveAvg), None);
        assert_eq!(n.local_value(Recordable::IncWeightSum), None);
    }

    #[test]
    fn test_devices_do_not_spike() {
        let mut rec = build(NodeModel::SpikeRecorder);
        rec.add_input(100.0);
        assert_eq!(rec.update(1, 0, &grid()).unwrap(), 0);
        assert_eq!(rec.post_trace_at(0, 0.1), 0.0);
    }

    #[test]
    fn test_status_round_trip() {
        let mut n = build(NodeModel::Izhikevich(IzhikevichParams::default()));
        let status = n.status(1).unwrap();
        assert_eq!(status["model"], "izhikevich");
        assert_eq!(status["V_m"], -65.0);
        assert_eq!(status["a"], 0.02);

        n.set_status(&json!({"V_m": -70.0, "I_e": 5.0}), &grid()).unwrap();
        let status = n.status(1).unwrap();
        assert_eq!(status["V_m"], -70.0);
        assert_eq!(status["I_e"], 5.0);

        assert!(n.set_status(&json!({"tau": 1.0}), &grid()).is_err());
    }

    #[test]
    fn test_set_status_generator() {
        let mut g = build(NodeModel::PoissonGenerator(PoissonGeneratorParams::new(10.0)));
        g.set_status(&json!({"rate": 50.0}), &grid()).unwrap();
        assert_eq!(g.status(1).unwrap()["rate"], 50.0);
        assert!(g.set_status(&json!({"V_m": 0.0}), &grid()).is_err());
        assert!(g.set_status(&json!({"rate": -1.0}), &grid()).is_err());
    }
}
