//! Pending moves: what a client must still decide to complete an action.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::selection::ResolvedSelection;
use crate::core::{Args, Argument};

/// The next selection(s) for one action, given the arguments chosen so far.
///
/// `selections` usually holds one entry. Combined selections travel together
/// so the client can show them under a single confirmation. An empty list
/// means the action can be submitted as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingMove {
    pub action: String,
    pub args: Args,
    pub selections: SmallVec<[ResolvedSelection; 1]>,
}

impl PendingMove {
    #[must_use]
    pub fn new(action: impl Into<String>, args: Args, selection: ResolvedSelection) -> Self {
        let mut selections = SmallVec::new();
        selections.push(selection);
        Self {
            action: action.into(),
            args,
            selections,
        }
    }

    /// An action with nothing left to choose.
    #[must_use]
    pub fn ready(action: impl Into<String>, args: Args) -> Self {
        Self {
            action: action.into(),
            args,
            selections: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.selections.is_empty()
    }

    /// The selection the client should present first.
    #[must_use]
    pub fn selection(&self) -> Option<&ResolvedSelection> {
        self.selections.first()
    }

    /// Argument map with every forced selection of this move filled in.
    #[must_use]
    pub fn forced_args(&self) -> Args {
        let mut args = self.args.clone();
        for selection in &self.selections {
            if let Some(value) = selection.is_forced() {
                args.insert(selection.name.clone(), value);
            }
        }
        args
    }

    /// Value already chosen for `name`.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::selection::{ArgContext, Selection};
    use crate::core::PlayerId;

    fn resolved(selection: Selection<()>) -> ResolvedSelection {
        selection.resolve(&ArgContext::new(&(), PlayerId::new(0), &Args::new()))
    }

    #[test]
    fn test_ready_move() {
        let pending = PendingMove::ready("pass", Args::new());
        assert!(pending.is_ready());
        assert!(pending.selection().is_none());
    }

    #[test]
    fn test_forced_args() {
        let mut pending = PendingMove::new(
            "take",
            Args::new(),
            resolved(Selection::choices("pile", vec!["left"])),
        );
        pending
            .selections
            .push(resolved(Selection::number("n").min(1).max(3)));

        let args = pending.forced_args();
        assert_eq!(args.get("pile"), Some(&Argument::from("left")));
        assert!(args.get("n").is_none());
    }

    #[test]
    fn test_serialization_shape() {
        let args: Args = [("pile".to_string(), Argument::from("left"))]
            .into_iter()
            .collect();
        let pending = PendingMove::new("take", args, resolved(Selection::number("n").max(3)));

        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["action"], "take");
        assert_eq!(json["args"]["pile"], "left");
        assert_eq!(json["selections"][0]["name"], "n");
        assert_eq!(json["selections"][0]["type"], "number");
    }
}
