//! Error types.
//!
//! Two channels, kept apart on purpose by their handling:
//!
//! - [`MoveError`]: a submitted move was rejected. Recoverable; nothing
//!   changed (except effects already run when a move callback failed).
//!   The message text is what the client sees.
//! - [`FlowError`]: the program and the persisted state disagree, or a
//!   client did something no honest client can do. Fatal for the request.

use thiserror::Error;

use super::player::PlayerId;

/// Rejection of a submitted move.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MoveError {
    /// Malformed argument, bounds violation, unknown action or selection.
    #[error("{0}")]
    Structural(String),

    /// An author-supplied validation rejected the choice.
    #[error("{0}")]
    Validation(String),

    /// Required choices are still missing.
    #[error("incomplete action")]
    Incomplete,

    /// A move callback failed. Effects before it already ran.
    #[error("{0}")]
    Effect(String),
}

impl MoveError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::Structural(message.into())
    }
}

/// Program-shape and protocol errors.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("flow stack mismatch at level {level}: program has {expected}, state has {found}")]
    StackMismatch {
        level: usize,
        expected: String,
        found: String,
    },

    #[error("invalid {kind} position at level {level}: {source}")]
    InvalidPosition {
        level: usize,
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown subflow `{0}`")]
    UnknownSubflow(String),

    #[error("duplicate subflow `{0}`")]
    DuplicateSubflow(String),

    #[error("action `{0}` is used by the flow but was never registered")]
    UnknownAction(String),

    #[error("{0} is not allowed to act now")]
    IneligiblePlayer(PlayerId),

    #[error("no action step is waiting for a move")]
    NotAwaitingMove,

    #[error("no enclosing loop{}", loop_suffix(.0))]
    NoEnclosingLoop(Option<String>),

    #[error("flow ran {0} steps without waiting for a player")]
    StepLimit(usize),

    #[error("game has not been started")]
    NotStarted,

    #[error("failed to encode flow position: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Anything `Game::process_move` can fail with.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Move(#[from] MoveError),

    #[error(transparent)]
    Flow(#[from] FlowError),
}

impl GameError {
    /// True for rejected moves that leave the game usable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GameError::Move(_))
    }

    /// The move rejection, if this is one.
    #[must_use]
    pub fn as_move_error(&self) -> Option<&MoveError> {
        match self {
            GameError::Move(e) => Some(e),
            GameError::Flow(_) => None,
        }
    }
}

fn loop_suffix(name: &Option<String>) -> String {
    name.as_deref()
        .map(|n| format!(" named `{n}`"))
        .unwrap_or_default()
}
