//! Error types for the action and validation boundaries

use crate::sim::NodeId;

/// Reasons a user action is rejected before it touches the world.
///
/// Rejections are surfaced to the player; they never unwind the tick loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("value must not be empty")]
    EmptyValue,
    #[error("value {0:?} is not a number")]
    InvalidValue(String),
    #[error("address {0:?} is already taken")]
    DuplicateAddress(String),
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("no node has address {0:?}")]
    AddressNotFound(String),
    #[error("a node cannot point to itself")]
    SelfLoop,
    #[error("node {0:?} already has a next pointer")]
    AlreadyLinked(NodeId),
    #[error("node {0:?} has no next pointer")]
    NotLinked(NodeId),
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("the list is empty")]
    EmptyList,
    #[error("{0} is not allowed in this mode")]
    ModeRestricted(&'static str),
    #[error("the portal is extracting, wait for it to finish")]
    PortalBusy,
    #[error("time is up")]
    TimeUp,
}

/// Internal validator faults. Never leaves the validation boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ValidationError {
    #[error("no exercise loaded")]
    NoExercise,
    #[error("expected structure repeats value {0}")]
    AmbiguousValue(i64),
    #[error("no node holds expected value {0}")]
    MissingValue(i64),
}
