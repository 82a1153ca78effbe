//! What steps see, and what they can ask of the interpreter.

use crate::core::{Args, Argument, GameRng, PlayerId};

/// Non-local control request returned by a step or raised by a move.
///
/// Loop signals target the nearest live loop, or the nearest one with the
/// given name. They are resolved against the live frame stack at the moment
/// they are raised, not against the program's static nesting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FlowControl {
    /// Carry on normally.
    #[default]
    Complete,
    /// Re-enter the loop at its current value.
    Repeat(Option<String>),
    /// Advance the loop now, abandoning the rest of the iteration.
    Skip(Option<String>),
    /// Leave the loop.
    Break(Option<String>),
    /// Jump into a named subflow; control returns here when it finishes.
    Subflow { name: String, args: Args },
}

impl FlowControl {
    #[must_use]
    pub fn repeat() -> Self {
        FlowControl::Repeat(None)
    }

    #[must_use]
    pub fn skip() -> Self {
        FlowControl::Skip(None)
    }

    #[must_use]
    pub fn break_loop() -> Self {
        FlowControl::Break(None)
    }

    #[must_use]
    pub fn repeat_named(name: impl Into<String>) -> Self {
        FlowControl::Repeat(Some(name.into()))
    }

    #[must_use]
    pub fn skip_named(name: impl Into<String>) -> Self {
        FlowControl::Skip(Some(name.into()))
    }

    #[must_use]
    pub fn break_named(name: impl Into<String>) -> Self {
        FlowControl::Break(Some(name.into()))
    }

    #[must_use]
    pub fn subflow(name: impl Into<String>, args: Args) -> Self {
        FlowControl::Subflow {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, FlowControl::Complete)
    }
}

impl From<()> for FlowControl {
    fn from((): ()) -> Self {
        FlowControl::Complete
    }
}

/// Read-only view handed to flow evaluations (loop bounds, switch values,
/// for-each collections, action-step players).
pub struct FlowScope<'a, G> {
    pub game: &'a G,
    /// Subflow args plus the values of every named enclosing block.
    pub args: &'a Args,
    pub players: &'a [PlayerId],
    pub current_players: &'a [PlayerId],
}

impl<G> FlowScope<'_, G> {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Argument::as_number)
    }

    #[must_use]
    pub fn player(&self, name: &str) -> Option<PlayerId> {
        self.arg(name).and_then(Argument::as_player)
    }
}

/// Mutable view handed to plain steps.
pub struct StepContext<'a, G> {
    pub game: &'a mut G,
    pub args: &'a Args,
    pub players: &'a [PlayerId],
    pub current_players: &'a mut Vec<PlayerId>,
    pub rng: &'a mut GameRng,
    pub(crate) messages: &'a mut Vec<String>,
}

impl<G> StepContext<'_, G> {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Argument::as_number)
    }

    #[must_use]
    pub fn player(&self, name: &str) -> Option<PlayerId> {
        self.arg(name).and_then(Argument::as_player)
    }

    /// Append to the game's message log.
    pub fn message(&mut self, text: impl Into<String>) {
        self.messages.push(text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_converts_to_complete() {
        let control: FlowControl = ().into();
        assert!(control.is_complete());
        assert_eq!(FlowControl::default(), FlowControl::Complete);
    }

    #[test]
    fn test_named_signals() {
        assert_eq!(FlowControl::break_named("round"), FlowControl::Break(Some("round".into())));
        assert_eq!(FlowControl::repeat(), FlowControl::Repeat(None));
        assert!(!FlowControl::skip().is_complete());
    }

    #[test]
    fn test_scope_lookups() {
        let args: Args = [
            ("round".to_string(), Argument::Number(2)),
            ("turn".to_string(), Argument::Player(PlayerId::new(1))),
        ]
        .into_iter()
        .collect();
        let players = [PlayerId::new(0), PlayerId::new(1)];
        let scope = FlowScope {
            game: &(),
            args: &args,
            players: &players,
            current_players: &players[..1],
        };

        assert_eq!(scope.number("round"), Some(2));
        assert_eq!(scope.player("turn"), Some(PlayerId::new(1)));
        assert_eq!(scope.number("turn"), None);
        assert!(scope.arg("missing").is_none());
    }
}
