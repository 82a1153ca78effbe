//! Submitted moves.

use serde::{Deserialize, Serialize};

use crate::core::{Args, Argument, MoveError, PlayerId};

/// A player's submission for one action.
///
/// ```
/// use rust_turnflow::core::PlayerId;
/// use rust_turnflow::game::Move;
///
/// let m = Move::from_json(r#"{"player": 2, "action": "take", "args": {"n": 3}}"#).unwrap();
/// assert_eq!(m.player, PlayerId::new(1));
/// assert_eq!(m, Move::new(PlayerId::new(1), "take").with_arg("n", 3_i64));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub player: PlayerId,
    pub action: String,
    #[serde(default)]
    pub args: Args,
}

impl Move {
    #[must_use]
    pub fn new(player: PlayerId, action: impl Into<String>) -> Self {
        Self {
            player,
            action: action.into(),
            args: Args::new(),
        }
    }

    /// Add an argument (builder pattern).
    #[must_use]
    pub fn with_arg(mut self, name: impl Into<String>, value: impl Into<Argument>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    /// Decode a client submission. Malformed input is a structural rejection.
    pub fn from_json(json: &str) -> Result<Self, MoveError> {
        serde_json::from_str(json)
            .map_err(|e| MoveError::structural(format!("malformed move: {e}")))
    }
}
