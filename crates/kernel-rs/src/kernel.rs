//! Simulation kernel: node and synapse tables, the event queue and the
//! step loop.
//!
//! Each step `s` (covering `[s*dt, (s+1)*dt)`) runs five phases:
//!
//! 1. deliver the events due at `s`, in scheduling order;
//! 2. update every node, then apply STDP potentiation for the neurons that
//!    fired and rescale incoming weights at normalization boundaries;
//! 3. record spikes at `(s+1)*dt` and schedule their delivery at
//!    `s + delay_steps`;
//! 4. let multimeters sample at `(s+1)*dt` when their interval ends;
//! 5. advance the step counter.
//!
//! Phase 2 may run on a rayon pool; every node owns its state (and every
//! Poisson generator its random stream), so results do not depend on the
//! thread count.

use std::collections::VecDeque;

use log::{debug, info, warn};
use prenorm_core::{Time, TimeGrid, TimeSeries, Weight};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::connect::{ConnSpec, Parameter, SynSpec};
use crate::error::{KernelError, Result};
use crate::models::{NodeKind, NodeModel, NODE_MODELS};
use crate::node::Node;
use crate::random::RandomStream;
use crate::recording::{ContinuousData, DeviceEvents, Multimeter, Recordable, SpikeData};
use crate::synapse::{Synapse, SynapseId, SynapseModel, SYNAPSE_MODELS};
use crate::{NodeCollection, NodeId};

/// Incoming weight sums below this are not rescaled
const MIN_WEIGHT_SUM: f64 = 1e-12;

// ============================================================================
// PARAMETERS AND STATE
// ============================================================================

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelParams {
    pub resolution: f64,          // Time step (ms)
    pub rng_seed: u64,            // Random number generator seed
    pub local_num_threads: usize, // Threads for the node update
    pub print_time: bool,         // Log simulation progress
    pub max_delay: f64,           // Longest synaptic delay accepted (ms)
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            resolution: 0.1,
            rng_seed: 12345,
            local_num_threads: 1,
            print_time: false,
            max_delay: 100.0,
        }
    }
}

impl KernelParams {
    fn grid(&self) -> Result<TimeGrid> {
        TimeGrid::new(self.resolution).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "resolution must be positive, got {}",
                self.resolution
            ))
        })
    }

    fn max_delay_steps(&self, grid: &TimeGrid) -> Result<u64> {
        grid.steps_rounded(self.max_delay).filter(|&s| s >= 1).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "max_delay must be at least one step of {} ms, got {}",
                grid.resolution, self.max_delay
            ))
        })
    }
}

/// Lifecycle of the kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SimulationState {
    Idle,
    Running,
    /// A neuron diverged; only `reset` leaves this state
    Halted { node: NodeId, time: Time },
}

/// Spike in flight
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpikeEvent {
    synapse: SynapseId,
    multiplicity: u32,
}

/// Read-only view of a synapse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub id: SynapseId,
    pub source: NodeId,
    pub target: NodeId,
    pub synapse_model: String,
    pub weight: Weight,
    pub delay: Time,
    pub inc_weight_sum: f64,
}

/// What a `(source, target)` pair of a `connect` call creates
enum Wiring {
    Synapse,
    Observe,
    RecordSpikes,
}

// ============================================================================
// KERNEL
// ============================================================================

/// Simulation engine instance
#[derive(Debug)]
pub struct Kernel {
    params: KernelParams,
    grid: TimeGrid,
    state: SimulationState,
    /// Node `id` lives at index `id - 1`
    nodes: Vec<Node>,
    synapses: Vec<Synapse>,
    /// Outgoing synapses per node
    outgoing: Vec<Vec<SynapseId>>,
    /// Incoming plastic synapses per node
    incoming_plastic: Vec<Vec<SynapseId>>,
    /// Spike recorders attached to each node
    spike_recorders: Vec<Vec<NodeId>>,
    multimeters: Vec<NodeId>,
    /// Front holds the events due at the current step
    queue: VecDeque<Vec<SpikeEvent>>,
    step: u64,
    rng: RandomStream,
    pool: Option<rayon::ThreadPool>,
}

impl Default for Kernel {
    fn default() -> Self {
        Self {
            grid: TimeGrid::default(),
            state: SimulationState::Idle,
            nodes: vec![],
            synapses: vec![],
            outgoing: vec![],
            incoming_plastic: vec![],
            spike_recorders: vec![],
            multimeters: vec![],
            queue: VecDeque::new(),
            step: 0,
            rng: RandomStream::new(KernelParams::default().rng_seed),
            pool: None,
            params: KernelParams::default(),
        }
    }
}

impl Kernel {
    pub fn new(params: KernelParams) -> Result<Self> {
        let mut kernel = Self::default();
        kernel.set_kernel_params(params)?;
        Ok(kernel)
    }

    pub fn params(&self) -> &KernelParams {
        &self.params
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Current simulation time (ms)
    pub fn time(&self) -> Time {
        self.grid.time_of(self.step)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_connections(&self) -> usize {
        self.synapses.len()
    }

    /// Registered node models
    pub fn models(&self) -> &'static [&'static str] {
        &NODE_MODELS
    }

    /// Registered synapse models
    pub fn synapse_models(&self) -> &'static [&'static str] {
        &SYNAPSE_MODELS
    }

    /// Change kernel parameters. The resolution is fixed once nodes exist;
    /// a new seed applies to draws made from now on.
    pub fn set_kernel_params(&mut self, params: KernelParams) -> Result<()> {
        let grid = params.grid()?;
        if grid != self.grid && (!self.nodes.is_empty() || self.step > 0) {
            return Err(KernelError::InvalidParameter(
                "resolution cannot be changed after nodes were created or time has passed".into(),
            ));
        }
        let max_steps = params.max_delay_steps(&grid)?;
        if let Some(longest) = self.synapses.iter().map(|s| s.delay_steps).max() {
            if longest > max_steps {
                return Err(KernelError::InvalidParameter(format!(
                    "max_delay {} ms is shorter than an existing delay of {} ms",
                    params.max_delay,
                    grid.time_of(longest)
                )));
            }
        }
        if params.local_num_threads == 0 {
            return Err(KernelError::InvalidParameter(
                "local_num_threads must be at least 1".into(),
            ));
        }

        if params.local_num_threads != self.params.local_num_threads || self.pool.is_none() {
            self.pool = if params.local_num_threads > 1 {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(params.local_num_threads)
                    .build()
                    .map_err(|e| KernelError::SimulationError(format!("thread pool: {e}")))?;
                Some(pool)
            } else {
                None
            };
        }
        if params.rng_seed != self.params.rng_seed {
            self.rng = RandomStream::new(params.rng_seed);
        }
        self.grid = grid;
        self.params = params;
        Ok(())
    }

    /// Kernel parameters plus the current time as a dictionary
    pub fn get_kernel_status(&self) -> Value {
        json!({
            "resolution": self.params.resolution,
            "rng_seed": self.params.rng_seed,
            "local_num_threads": self.params.local_num_threads,
            "print_time": self.params.print_time,
            "max_delay": self.params.max_delay,
            "biological_time": self.time(),
            "network_size": self.nodes.len(),
            "num_connections": self.synapses.len(),
        })
    }

    /// Remove all nodes, synapses and recordings and rewind time to zero.
    /// Kernel parameters are kept and the random stream is reseeded.
    pub fn reset(&mut self) {
        debug!(
            "Resetting kernel ({} nodes, {} synapses, t = {} ms)",
            self.nodes.len(),
            self.synapses.len(),
            self.time()
        );
        self.state = SimulationState::Idle;
        self.nodes.clear();
        self.synapses.clear();
        self.outgoing.clear();
        self.incoming_plastic.clear();
        self.spike_recorders.clear();
        self.multimeters.clear();
        self.queue.clear();
        self.step = 0;
        self.rng = RandomStream::new(self.params.rng_seed);
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    fn node(&self, id: NodeId) -> Result<&Node> {
        id.checked_sub(1)
            .and_then(|i| self.nodes.get(i))
            .ok_or(KernelError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        id.checked_sub(1)
            .and_then(|i| self.nodes.get_mut(i))
            .ok_or(KernelError::NodeNotFound(id))
    }

    /// Create `n` nodes of `model`; ids are consecutive and start at 1.
    pub fn create(&mut self, model: NodeModel, n: usize) -> Result<NodeCollection> {
        model.validate()?;
        if n == 0 {
            return Err(KernelError::InvalidParameter(format!(
                "cannot create 0 nodes of {}",
                model.name()
            )));
        }

        let first = self.nodes.len() + 1;
        let built = (first..first + n)
            .map(|id| Node::build(id, &model, &self.grid, &self.rng))
            .collect::<Result<Vec<_>>>()?;

        let kind = model.kind();
        for node in built {
            self.nodes.push(node);
            self.outgoing.push(vec![]);
            self.incoming_plastic.push(vec![]);
            self.spike_recorders.push(vec![]);
        }
        if kind == NodeKind::Multimeter {
            self.multimeters.extend(first..first + n);
        }

        debug!("Created {} {} nodes (ids {}..={})", n, model.name(), first, first + n - 1);
        Ok(NodeCollection::new((first..first + n).collect()))
    }

    /// Create nodes from a model name and a NEST-style parameter dictionary
    pub fn create_by_name(&mut self, name: &str, n: usize, params: &Value) -> Result<NodeCollection> {
        let model = NodeModel::from_name(name, params)?;
        self.create(model, n)
    }

    pub fn node_kind(&self, id: NodeId) -> Result<NodeKind> {
        Ok(self.node(id)?.kind())
    }

    /// Parameters and state of node `id`
    pub fn get_status(&self, id: NodeId) -> Result<Value> {
        let mut status = self.node(id)?.status(id)?;
        if let (Some(map), Some(_)) = (status.as_object_mut(), self.node(id)?.neuron()) {
            map.insert("inc_weight_sum".into(), json!(self.incoming_sum(id, Recordable::IncWeightSum)));
            map.insert("weight_sum".into(), json!(self.incoming_sum(id, Recordable::WeightSum)));
        }
        Ok(status)
    }

    pub fn set_status(&mut self, id: NodeId, params: &Value) -> Result<()> {
        let grid = self.grid;
        self.node_mut(id)?.set_status(params, &grid)
    }

    // ------------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------------

    fn wiring(&self, pre: NodeId, post: NodeId, model: &SynapseModel) -> Result<Wiring> {
        let (source, target) = (self.node(pre)?.kind(), self.node(post)?.kind());
        let illegal = |reason: String| KernelError::IllegalConnection { pre, post, reason };
        match (source, target) {
            (NodeKind::Multimeter, t) if t.is_neuron() => Ok(Wiring::Observe),
            (NodeKind::Multimeter, t) => Err(illegal(format!("a multimeter cannot observe a {t:?}"))),
            (s, NodeKind::SpikeRecorder) if s.is_spike_source() => Ok(Wiring::RecordSpikes),
            // plastic synapses read the post-synaptic trace of a normalized neuron
            (s, t) if s.is_spike_source() && model.is_plastic() && t != NodeKind::NormalizedNeuron => {
                Err(illegal(format!("{} requires an izhikevich_prenorm target, got {t:?}", model.name())))
            }
            (s, t) if s.is_spike_source() && t.is_neuron() => Ok(Wiring::Synapse),
            (s, t) => Err(illegal(format!("{s:?} cannot send spikes to {t:?}"))),
        }
    }

    fn delay_steps(&self, delay: &Parameter, value: f64, pre: NodeId, post: NodeId) -> Result<u64> {
        // fixed delays must be on the grid, drawn ones are rounded to it
        let steps = if delay.is_fixed() {
            self.grid.steps_exact(value)
        } else {
            self.grid.steps_rounded(value)
        };
        let max_steps = self.params.max_delay_steps(&self.grid)?;
        steps
            .filter(|&s| (1..=max_steps).contains(&s))
            .ok_or(KernelError::InvalidDelay { pre, post, delay: value })
    }

    /// Connect `sources` to `targets`. Neuron and generator pairs get a
    /// synapse per `syn_spec`; a multimeter source starts observing its
    /// targets and a spike recorder target starts recording its sources.
    ///
    /// Either every pair is connected or, on error, nothing changes.
    pub fn connect(
        &mut self,
        sources: &NodeCollection,
        targets: &NodeCollection,
        conn_spec: &ConnSpec,
        syn_spec: &SynSpec,
    ) -> Result<()> {
        syn_spec.model.validate()?;
        for &id in sources.iter().chain(targets.iter()) {
            self.node(id)?;
        }

        let mut rng = self.rng.clone();
        let pairs = conn_spec.pairs(&sources.ids, &targets.ids, &mut rng)?;

        let mut new_synapses = Vec::new();
        let mut observations = Vec::new();
        let mut recordings = Vec::new();
        for (pre, post) in pairs {
            match self.wiring(pre, post, &syn_spec.model)? {
                Wiring::Synapse => {
                    let weight = syn_spec.weight.sample(&mut rng)?;
                    let delay = syn_spec.delay.sample(&mut rng)?;
                    if !weight.is_finite() {
                        return Err(KernelError::InvalidParameter(format!(
                            "weight {weight} on connection {pre} -> {post}"
                        )));
                    }
                    if let SynapseModel::StdpConnectionNorm(p) = &syn_spec.model {
                        if !p.admits(weight) {
                            return Err(KernelError::InvalidParameter(format!(
                                "weight {weight} on connection {pre} -> {post} is outside [0, {}]",
                                p.w_max.map_or("inf".to_string(), |w| w.to_string())
                            )));
                        }
                    }
                    let delay_steps = self.delay_steps(&syn_spec.delay, delay, pre, post)?;
                    new_synapses.push(Synapse::new(pre, post, weight, delay_steps, &syn_spec.model));
                }
                Wiring::Observe => {
                    let kind = self.node(post)?.kind();
                    if let Node::Multimeter(mm) = self.node(pre)? {
                        if let Some(rec) = mm.recordables.iter().find(|r| !r.available_on(kind)) {
                            return Err(KernelError::UnknownRecordable {
                                node: post,
                                name: rec.name().to_string(),
                            });
                        }
                    }
                    observations.push((pre, post));
                }
                Wiring::RecordSpikes => recordings.push((pre, post)),
            }
        }

        // commit
        let n_synapses = new_synapses.len();
        for synapse in new_synapses {
            let id = self.synapses.len();
            self.outgoing[synapse.source - 1].push(id);
            if synapse.is_plastic() {
                self.incoming_plastic[synapse.target - 1].push(id);
            }
            self.synapses.push(synapse);
        }
        for (meter, node) in &observations {
            if let Node::Multimeter(mm) = &mut self.nodes[meter - 1] {
                mm.observe(*node);
            }
        }
        for &(node, recorder) in &recordings {
            let attached = &mut self.spike_recorders[node - 1];
            if !attached.contains(&recorder) {
                attached.push(recorder);
            }
        }
        self.rng = rng;

        debug!(
            "Connected {} -> {} nodes: {} {} synapses, {} observations, {} spike recordings",
            sources.len(),
            targets.len(),
            n_synapses,
            syn_spec.model.name(),
            observations.len(),
            recordings.len()
        );
        Ok(())
    }

    /// Synapses filtered by source and/or target
    pub fn get_connections(
        &self,
        sources: Option<&NodeCollection>,
        targets: Option<&NodeCollection>,
    ) -> Vec<ConnectionInfo> {
        let matches = |set: Option<&NodeCollection>, id: NodeId| set.map_or(true, |c| c.ids.contains(&id));
        self.synapses
            .iter()
            .enumerate()
            .filter(|(_, s)| matches(sources, s.source) && matches(targets, s.target))
            .map(|(id, s)| ConnectionInfo {
                id,
                source: s.source,
                target: s.target,
                synapse_model: s.model_name().to_string(),
                weight: s.weight,
                delay: self.grid.time_of(s.delay_steps),
                inc_weight_sum: s.inc_weight_sum(),
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Simulation
    // ------------------------------------------------------------------------

    /// Advance the network by `duration` ms; calls accumulate.
    pub fn simulate(&mut self, duration: Time) -> Result<()> {
        if let SimulationState::Halted { node, time } = self.state {
            return Err(KernelError::NumericDivergence { node, time });
        }
        let n_steps = self.grid.steps_exact(duration).ok_or_else(|| {
            KernelError::InvalidParameter(format!(
                "duration {duration} ms is not a non-negative multiple of the resolution {} ms",
                self.grid.resolution
            ))
        })?;

        let t_start = self.time();
        info!(
            "Simulating {} ms ({} steps) from t = {} ms: {} nodes, {} synapses",
            duration,
            n_steps,
            t_start,
            self.nodes.len(),
            self.synapses.len()
        );
        self.state = SimulationState::Running;

        let report_every = (n_steps / 10).max(1);
        for i in 0..n_steps {
            if let Err(e) = self.advance() {
                if let KernelError::NumericDivergence { node, time } = e {
                    warn!("Node {} diverged at t = {} ms, halting", node, time);
                    self.state = SimulationState::Halted { node, time };
                } else {
                    self.state = SimulationState::Idle;
                }
                return Err(e);
            }
            if self.params.print_time && (i + 1) % report_every == 0 {
                info!(
                    "t = {:.1} ms ({:.0}%)",
                    self.time(),
                    100.0 * (i + 1) as f64 / n_steps as f64
                );
            }
        }

        self.state = SimulationState::Idle;
        info!("Simulation finished at t = {} ms", self.time());
        Ok(())
    }

    /// One simulation step
    fn advance(&mut self) -> Result<()> {
        let step = self.step;
        let dt = self.grid.resolution;

        // 1. delivery
        if let Some(due) = self.queue.pop_front() {
            for event in due {
                let synapse = &mut self.synapses[event.synapse];
                let target = &mut self.nodes[synapse.target - 1];
                let post_trace = target.post_trace_at(step, dt);
                let amount = synapse.deliver(step, event.multiplicity, post_trace, dt);
                target.add_input(amount);
            }
        }

        // 2. node update
        let spikes = self.update_nodes(step)?;
        for (idx, &count) in spikes.iter().enumerate() {
            if count > 0 {
                for &syn in &self.incoming_plastic[idx] {
                    self.synapses[syn].on_post_spike(step, dt);
                }
            }
        }
        self.normalize_weights(step);

        // 3. propagation
        let time = self.grid.time_of(step + 1);
        for (idx, &count) in spikes.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let sender = idx + 1;
            for &recorder in &self.spike_recorders[idx] {
                if let Node::SpikeRecorder(r) = &mut self.nodes[recorder - 1] {
                    r.record(time, sender, count);
                }
            }
            for &syn in &self.outgoing[idx] {
                let slot = (self.synapses[syn].delay_steps - 1) as usize;
                if self.queue.len() <= slot {
                    self.queue.resize_with(slot + 1, Vec::new);
                }
                self.queue[slot].push(SpikeEvent {
                    synapse: syn,
                    multiplicity: count,
                });
            }
        }

        // 4. sampling
        for i in 0..self.multimeters.len() {
            let meter = self.multimeters[i];
            let rows = match &self.nodes[meter - 1] {
                Node::Multimeter(mm) if mm.due(step) => self.sample(mm),
                _ => continue,
            };
            if let Node::Multimeter(mm) = &mut self.nodes[meter - 1] {
                for (sender, values) in rows {
                    mm.record(time, sender, &values);
                }
            }
        }

        // 5.
        self.step += 1;
        Ok(())
    }

    /// Update all nodes and return their spike counts in id order. Every
    /// node is updated even if one fails; the lowest failing id is reported.
    fn update_nodes(&mut self, step: u64) -> Result<Vec<u32>> {
        let grid = self.grid;
        let results: Vec<Result<u32>> = match &self.pool {
            Some(pool) => pool.install(|| {
                self.nodes
                    .par_iter_mut()
                    .enumerate()
                    .map(|(idx, node)| node.update(idx + 1, step, &grid))
                    .collect()
            }),
            None => self
                .nodes
                .iter_mut()
                .enumerate()
                .map(|(idx, node)| node.update(idx + 1, step, &grid))
                .collect(),
        };
        results.into_iter().collect()
    }

    /// Rescale the incoming plastic weights of normalized neurons whose
    /// period ends at `step` so that they sum to `norm_value`.
    fn normalize_weights(&mut self, step: u64) {
        for (idx, node) in self.nodes.iter().enumerate() {
            let Node::IzhikevichPrenorm(n) = node else {
                continue;
            };
            if !n.normalize_weights || !n.at_period_boundary(step) {
                continue;
            }
            let incoming = &self.incoming_plastic[idx];
            let sum: Weight = incoming.iter().map(|&s| self.synapses[s].weight).sum();
            if sum <= MIN_WEIGHT_SUM {
                continue;
            }
            let factor = n.norm_value / sum;
            for &s in incoming {
                self.synapses[s].scale_weight(factor);
            }
        }
    }

    fn incoming_sum(&self, id: NodeId, rec: Recordable) -> f64 {
        self.incoming_plastic[id - 1]
            .iter()
            .map(|&s| match rec {
                Recordable::WeightSum => self.synapses[s].weight,
                _ => self.synapses[s].inc_weight_sum(),
            })
            .sum()
    }

    fn recordable_value(&self, id: NodeId, rec: Recordable) -> f64 {
        match rec {
            Recordable::IncWeightSum | Recordable::WeightSum => self.incoming_sum(id, rec),
            _ => self.nodes[id - 1].local_value(rec).unwrap_or(f64::NAN),
        }
    }

    fn sample(&self, mm: &Multimeter) -> Vec<(NodeId, Vec<f64>)> {
        mm.targets
            .iter()
            .map(|&t| {
                let values = mm.recordables.iter().map(|&r| self.recordable_value(t, r)).collect();
                (t, values)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Read-back
    // ------------------------------------------------------------------------

    fn multimeter(&self, device: NodeId) -> Result<&Multimeter> {
        match self.node(device)? {
            Node::Multimeter(mm) => Ok(mm),
            other => Err(KernelError::InvalidParameter(format!(
                "node {device} is a {}, not a multimeter",
                other.model_name()
            ))),
        }
    }

    /// All `(time, value)` samples of `field` recorded by `device`
    pub fn get_observations(&self, device: NodeId, field: &str) -> Result<Vec<(Time, f64)>> {
        self.multimeter(device)?
            .data
            .samples(field)
            .ok_or_else(|| KernelError::UnknownRecordable {
                node: device,
                name: field.to_string(),
            })
    }

    /// Samples of `field` that `device` took from `node`
    pub fn get_observations_for(&self, device: NodeId, node: NodeId, field: &str) -> Result<TimeSeries> {
        let mm = self.multimeter(device)?;
        let series = mm.data.series(node, field).ok_or_else(|| KernelError::UnknownRecordable {
            node: device,
            name: field.to_string(),
        })?;
        Ok(match Recordable::parse(field) {
            Some(Recordable::VM) => series.with_units("mV"),
            Some(Recordable::ISyn | Recordable::IEff | Recordable::DriveAvg) => series.with_units("pA"),
            _ => series,
        })
    }

    /// Buffer of a recording device
    pub fn get_events(&self, device: NodeId) -> Result<DeviceEvents> {
        match self.node(device)? {
            Node::Multimeter(mm) => Ok(DeviceEvents::Continuous(mm.data.clone())),
            Node::SpikeRecorder(r) => Ok(DeviceEvents::Spikes(r.data.clone())),
            other => Err(KernelError::InvalidParameter(format!(
                "node {device} is a {}, not a recording device",
                other.model_name()
            ))),
        }
    }

    /// Spikes recorded by a spike recorder
    pub fn get_spike_data(&self, device: NodeId) -> Result<&SpikeData> {
        match self.node(device)? {
            Node::SpikeRecorder(r) => Ok(&r.data),
            other => Err(KernelError::InvalidParameter(format!(
                "node {device} is a {}, not a spike recorder",
                other.model_name()
            ))),
        }
    }

    /// Samples recorded by a multimeter
    pub fn get_continuous_data(&self, device: NodeId) -> Result<&ContinuousData> {
        Ok(&self.multimeter(device)?.data)
    }
}
