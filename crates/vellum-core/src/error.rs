//! Error type shared by the core.
//!
//! Only configuration mistakes surface here (attach/bind time). Runtime
//! no-ops such as scrolling an empty list or measuring a zero-area surface
//! return safe defaults instead.

use thiserror::Error;

use crate::NodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The node id is stale or was never spawned on this stage.
    #[error("node {0:?} does not exist on this stage")]
    NodeNotFound(NodeId),

    /// Parenting would make a node its own ancestor.
    #[error("cannot add {child:?} under {parent:?}: it would create a cycle")]
    CyclicParent { parent: NodeId, child: NodeId },

    #[error("unknown anchor point '{0}'")]
    UnknownAnchor(String),

    #[error("invalid hex color '{0}'")]
    InvalidColor(String),

    /// A path model needs at least one segment to address.
    #[error("model path is empty")]
    EmptyModelPath,

    /// A path model could not convert between JSON and the bound value type.
    #[error("model value at '{path}' could not be converted: {reason}")]
    ModelConversion { path: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
