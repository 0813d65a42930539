//! Recording devices: multimeter and spike recorder.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use prenorm_core::{Time, TimeGrid, TimeSeries};
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};
use crate::models::{MultimeterParams, NodeKind};
use crate::NodeId;

// ============================================================================
// RECORDABLES
// ============================================================================

/// Observable quantity of a neuron
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recordable {
    /// Membrane potential (mV)
    #[serde(rename = "V_m")]
    VM,
    /// Recovery variable
    #[serde(rename = "U_m")]
    UM,
    /// Raw synaptic drive of the last step (pA)
    #[serde(rename = "I_syn")]
    ISyn,
    /// Drive after normalization (pA)
    #[serde(rename = "I_eff")]
    IEff,
    /// Cumulative weight transmitted by incoming plastic synapses
    #[serde(rename = "inc_weight_sum")]
    IncWeightSum,
    /// Current sum of incoming plastic weights
    #[serde(rename = "weight_sum")]
    WeightSum,
    /// Running average of the raw drive
    #[serde(rename = "drive_avg")]
    DriveAvg,
}

impl Recordable {
    pub const ALL: [Recordable; 7] = [
        Self::VM,
        Self::UM,
        Self::ISyn,
        Self::IEff,
        Self::IncWeightSum,
        Self::WeightSum,
        Self::DriveAvg,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::VM => "V_m",
            Self::UM => "U_m",
            Self::ISyn => "I_syn",
            Self::IEff => "I_eff",
            Self::IncWeightSum => "inc_weight_sum",
            Self::WeightSum => "weight_sum",
            Self::DriveAvg => "drive_avg",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Whether a node of `kind` exposes this quantity
    pub fn available_on(&self, kind: NodeKind) -> bool {
        match self {
            Self::DriveAvg => kind == NodeKind::NormalizedNeuron,
            _ => kind.is_neuron(),
        }
    }
}

impl fmt::Display for Recordable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// BUFFERS
// ============================================================================

/// Recorded spike events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeData {
    pub times: Vec<Time>,
    pub senders: Vec<NodeId>,
}

impl SpikeData {
    pub fn new() -> Self {
        Self {
            times: vec![],
            senders: vec![],
        }
    }

    pub fn record(&mut self, time: Time, sender: NodeId) {
        self.times.push(time);
        self.senders.push(sender);
    }

    pub fn n_events(&self) -> usize {
        self.times.len()
    }

    /// Get spike trains organized by sender
    pub fn spike_trains(&self) -> HashMap<NodeId, Vec<Time>> {
        let mut trains: HashMap<NodeId, Vec<Time>> = HashMap::new();
        for (&time, &sender) in self.times.iter().zip(self.senders.iter()) {
            trains.entry(sender).or_default().push(time);
        }
        trains
    }

    /// Spike times of a single sender
    pub fn train_of(&self, sender: NodeId) -> Vec<Time> {
        self.times
            .iter()
            .zip(self.senders.iter())
            .filter(|(_, &s)| s == sender)
            .map(|(&t, _)| t)
            .collect()
    }
}

impl Default for SpikeData {
    fn default() -> Self {
        Self::new()
    }
}

/// Recorded continuous data; one row per `(time, sender)` sample
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuousData {
    pub times: Vec<Time>,
    pub senders: Vec<NodeId>,
    pub data: BTreeMap<String, Vec<f64>>,
}

impl ContinuousData {
    fn with_fields(recordables: &[Recordable]) -> Self {
        Self {
            times: vec![],
            senders: vec![],
            data: recordables.iter().map(|r| (r.name().to_string(), vec![])).collect(),
        }
    }

    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// All `(time, value)` samples of `field`, across senders
    pub fn samples(&self, field: &str) -> Option<Vec<(Time, f64)>> {
        let values = self.data.get(field)?;
        Some(self.times.iter().copied().zip(values.iter().copied()).collect())
    }

    /// Samples of `field` taken from `sender`
    pub fn series(&self, sender: NodeId, field: &str) -> Option<TimeSeries> {
        let values = self.data.get(field)?;
        let mut series = TimeSeries::new(field);
        for ((&t, &s), &v) in self.times.iter().zip(self.senders.iter()).zip(values.iter()) {
            if s == sender {
                series.push(t, v);
            }
        }
        Some(series)
    }
}

// ============================================================================
// DEVICES
// ============================================================================

/// Periodic sampler of neuron state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Multimeter {
    pub params: MultimeterParams,
    pub recordables: Vec<Recordable>,
    pub interval_steps: u64,
    /// Observed nodes, in connection order
    pub targets: Vec<NodeId>,
    pub data: ContinuousData,
}

impl Multimeter {
    /// Repeated names in `record_from` yield a single column.
    pub fn new(id: NodeId, params: MultimeterParams, grid: &TimeGrid) -> Result<Self> {
        let mut recordables: Vec<Recordable> = Vec::with_capacity(params.record_from.len());
        for name in &params.record_from {
            let rec = Recordable::parse(name).ok_or_else(|| KernelError::UnknownRecordable {
                node: id,
                name: name.clone(),
            })?;
            if !recordables.contains(&rec) {
                recordables.push(rec);
            }
        }
        let interval_steps = grid.steps_exact(params.interval).filter(|&s| s > 0).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "multimeter interval {} ms is not a positive multiple of the resolution {} ms",
                params.interval, grid.resolution
            ))
        })?;
        Ok(Self {
            data: ContinuousData::with_fields(&recordables),
            params,
            recordables,
            interval_steps,
            targets: vec![],
        })
    }

    /// Whether the step `step` ends on a sampling point
    pub fn due(&self, step: u64) -> bool {
        (step + 1) % self.interval_steps == 0
    }

    /// Register `node`; a node already observed is not added twice.
    pub fn observe(&mut self, node: NodeId) {
        if !self.targets.contains(&node) {
            self.targets.push(node);
        }
    }

    /// Append one row; `values` are in `recordables` order.
    pub fn record(&mut self, time: Time, sender: NodeId, values: &[f64]) {
        self.data.times.push(time);
        self.data.senders.push(sender);
        for (rec, &value) in self.recordables.iter().zip(values) {
            if let Some(column) = self.data.data.get_mut(rec.name()) {
                column.push(value);
            }
        }
    }
}

/// Spike time recorder
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpikeRecorder {
    pub data: SpikeData,
}

impl SpikeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per spike; multiplicity is expanded.
    pub fn record(&mut self, time: Time, sender: NodeId, multiplicity: u32) {
        for _ in 0..multiplicity {
            self.data.record(time, sender);
        }
    }
}

/// Buffer read back from a recording device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceEvents {
    Spikes(SpikeData),
    Continuous(ContinuousData),
}
