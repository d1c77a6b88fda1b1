//! Error types for the race core and its physics backends.

use thiserror::Error;

use crate::marble::MarbleId;
use crate::race::RacePhase;

/// Failure reported by a physics backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not bring up its world. Fatal to the controller.
    #[error("physics backend failed to initialize: {0}")]
    InitFailed(String),
    /// The backend does not implement an optional operation.
    #[error("physics backend does not support `{0}`")]
    Unsupported(&'static str),
    /// No body is registered under this marble id.
    #[error("no marble with id {0} in the physics world")]
    UnknownMarble(MarbleId),
}

/// Errors surfaced by [`RaceController`](crate::race::RaceController).
#[derive(Debug, Error)]
pub enum RaceError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("speed multiplier must be larger than 0, got {0}")]
    InvalidSpeed(f32),

    #[error("map index {index} is out of range (0..{count})")]
    MapOutOfRange { index: i64, count: usize },

    #[error("no map has been selected")]
    NoStageSelected,

    #[error("cannot start a race without marbles")]
    NoMarbles,

    #[error("`{operation}` is not allowed while the race is {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: RacePhase,
    },

    #[error("no participant named `{0}`")]
    UnknownParticipant(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Snapshot(#[from] postcard::Error),
}
