//! State extraction errors

use thiserror::Error;

use cueflow_core::Time;

/// Fatal errors from state extraction. These signal a broken engine
/// invariant, not bad input, and are never silently resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Two objects claim the same layer at the same instant: the
    /// priority-resolution invariant was broken upstream.
    #[error("layer {layer:?} occupied by both {first} and {second} at {time:?}")]
    DuplicateLayerOccupancy {
        layer: String,
        first: String,
        second: String,
        time: Time,
    },
}

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;
