//! # Prenorm Kernel: spiking network engine
//!
//! Time-stepped, event-driven simulator for networks of Izhikevich neurons
//! with homeostatic drive normalization and normalized STDP.
//!
//! Key features:
//! - Izhikevich neurons and a variant that rescales incoming drive against a
//!   running average (`izhikevich_prenorm`)
//! - `stdp_connection_norm` synapses with power-law weight dependence
//! - Seeded Poisson and spike-time generators
//! - Bulk connectivity (one-to-one, fixed in/out-degree, all-to-all,
//!   pairwise Bernoulli) with per-synapse weight and delay distributions
//! - Recording devices (multimeter, spike recorder)
//!
//! ```no_run
//! use prenorm_kernel::{ConnSpec, Kernel, KernelParams, NodeModel, SynSpec};
//! use prenorm_kernel::models::{MultimeterParams, PoissonGeneratorParams, PrenormParams};
//!
//! let mut kernel = Kernel::new(KernelParams::default())?;
//! let noise = kernel.create(NodeModel::PoissonGenerator(PoissonGeneratorParams::new(1000.0)), 10)?;
//! let neuron = kernel.create(NodeModel::IzhikevichPrenorm(PrenormParams::new(10.0, 50.0, 10.0)), 1)?;
//! let meter = kernel.create(NodeModel::Multimeter(MultimeterParams::new(&["I_eff"], 1.0)), 1)?;
//!
//! kernel.connect(&noise, &neuron, &ConnSpec::all_to_all(), &SynSpec::default())?;
//! kernel.connect(&meter, &neuron, &ConnSpec::all_to_all(), &SynSpec::default())?;
//! kernel.simulate(1000.0)?;
//!
//! let drive = kernel.get_observations(meter.ids[0], "I_eff")?;
//! # Ok::<(), prenorm_kernel::KernelError>(())
//! ```

use serde::{Deserialize, Serialize};

pub mod analysis;
pub mod connect;
pub mod error;
pub mod generator;
pub mod kernel;
pub mod models;
pub mod neuron;
pub mod node;
pub mod random;
pub mod recording;
pub mod synapse;

pub use connect::{ConnSpec, ConnectionRule, Distribution, Parameter, SynSpec};
pub use error::{KernelError, Result};
pub use kernel::{ConnectionInfo, Kernel, KernelParams, SimulationState};
pub use models::{NodeKind, NodeModel};
pub use recording::{ContinuousData, DeviceEvents, Recordable, SpikeData};
pub use synapse::{StdpNormParams, SynapseModel};

// ============================================================================
// NODE IDS
// ============================================================================

/// Global node identifier
pub type NodeId = usize;

/// Collection of node IDs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCollection {
    pub ids: Vec<NodeId>,
}

impl NodeCollection {
    pub fn new(ids: Vec<NodeId>) -> Self {
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn first(&self) -> Option<NodeId> {
        self.ids.first().copied()
    }

    pub fn last(&self) -> Option<NodeId> {
        self.ids.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> + '_ {
        self.ids.iter()
    }

    /// Slice of nodes
    pub fn slice(&self, start: usize, end: usize) -> Self {
        Self::new(self.ids[start..end].to_vec())
    }

    /// Both collections, in order
    pub fn concat(&self, other: &NodeCollection) -> Self {
        Self::new(self.ids.iter().chain(other.ids.iter()).copied().collect())
    }
}

impl IntoIterator for NodeCollection {
    type Item = NodeId;
    type IntoIter = std::vec::IntoIter<NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

impl<'a> IntoIterator for &'a NodeCollection {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_collection() {
        let nodes = NodeCollection::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(nodes.len(), 5);
        assert_eq!(nodes.first(), Some(1));
        assert_eq!(nodes.last(), Some(5));

        let slice = nodes.slice(1, 3);
        assert_eq!(slice.ids, vec![2, 3]);

        let joined = slice.concat(&NodeCollection::new(vec![9]));
        assert_eq!(joined.ids, vec![2, 3, 9]);
        assert_eq!((&joined).into_iter().count(), 3);
    }
}
