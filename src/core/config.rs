//! Engine configuration.
//!
//! Games configure their structure (actions, flow, players) through
//! `GameBuilder`. The knobs here govern the engine itself and are plain
//! serde data so a host can load them alongside its own settings.

use serde::{Deserialize, Serialize};

/// Tunables for the flow interpreter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on interpreter steps taken by one `play()` call.
    ///
    /// A program that never reaches an action step (e.g. an unbounded loop
    /// of plain steps) fails with `FlowError::StepLimit` instead of hanging.
    pub max_steps_per_play: usize,
}

impl EngineConfig {
    /// Default step budget for a single `play()`.
    pub const DEFAULT_MAX_STEPS: usize = 100_000;

    /// Set the step budget (builder pattern).
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps_per_play = max_steps;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps_per_play: Self::DEFAULT_MAX_STEPS,
        }
    }
}
