use prenorm_core::Time;
use thiserror::Error;

use crate::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KernelError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Size mismatch: {sources} sources cannot be paired with {targets} targets")]
    SizeMismatch { sources: usize, targets: usize },
    #[error("Insufficient sources for node {node}: degree {degree} exceeds {available} eligible partners")]
    InsufficientSources {
        node: NodeId,
        degree: usize,
        available: usize,
    },
    #[error("Invalid delay {delay} ms on connection {pre} -> {post}")]
    InvalidDelay { pre: NodeId, post: NodeId, delay: f64 },
    #[error("Numeric divergence in node {node} at t = {time} ms")]
    NumericDivergence { node: NodeId, time: Time },
    #[error("Illegal connection {pre} -> {post}: {reason}")]
    IllegalConnection {
        pre: NodeId,
        post: NodeId,
        reason: String,
    },
    #[error("Node {node} has no recordable '{name}'")]
    UnknownRecordable { node: NodeId, name: String },
    #[error("Simulation error: {0}")]
    SimulationError(String),
}

pub type Result<T> = std::result::Result<T, KernelError>;
