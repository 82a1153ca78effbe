//! Positions: the serializable live state of each flow node.
//!
//! A running flow is fully described by the chain of node positions from a
//! root down to the active leaf. Each level is persisted as
//! `{type, name?, position}`; the static program supplies everything else.
//!
//! | Kind          | Position                                             |
//! |---------------|------------------------------------------------------|
//! | `sequence`    | `{index}`                                            |
//! | `loop`        | `{index, value?}`, `index = -1` once exhausted       |
//! | `foreach`     | `{index, value?, collection}`, `index = -1` once done |
//! | `switch-case` | `{index?, default, value}`                           |
//! | `action`      | `{players, player?, actionName?, args?, completed?}` |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::{Args, Argument, PlayerId};

/// Index of an exhausted loop or for-each.
pub const EXHAUSTED: i64 = -1;

/// Node kind as it appears in the persisted stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowKind {
    Sequence,
    Loop,
    Foreach,
    SwitchCase,
    Action,
}

impl FlowKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::Sequence => "sequence",
            FlowKind::Loop => "loop",
            FlowKind::Foreach => "foreach",
            FlowKind::SwitchCase => "switch-case",
            FlowKind::Action => "action",
        }
    }
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePosition {
    pub index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopPosition {
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Argument>,
}

impl LoopPosition {
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.index == EXHAUSTED
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForEachPosition {
    pub index: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Argument>,
    pub collection: Vec<Argument>,
}

impl ForEachPosition {
    /// Position at `index`, or the exhausted sentinel past the end.
    #[must_use]
    pub fn at(collection: Vec<Argument>, index: usize) -> Self {
        match collection.get(index).cloned() {
            Some(value) => Self {
                index: index as i64,
                value: Some(value),
                collection,
            },
            None => Self {
                index: EXHAUSTED,
                value: None,
                collection,
            },
        }
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.index == EXHAUSTED
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchPosition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub default: bool,
    pub value: Argument,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPosition {
    pub players: Vec<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
    /// Players who already moved, in every-player mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<Vec<PlayerId>>,
}

impl ActionPosition {
    #[must_use]
    pub fn new(players: Vec<PlayerId>, every_player: bool) -> Self {
        Self {
            players,
            player: None,
            action_name: None,
            args: None,
            completed: every_player.then(Vec::new),
        }
    }

    /// Players who may still submit a move.
    #[must_use]
    pub fn eligible(&self) -> Vec<PlayerId> {
        match &self.completed {
            Some(done) => self
                .players
                .iter()
                .copied()
                .filter(|p| !done.contains(p))
                .collect(),
            None => self.players.clone(),
        }
    }

    /// True once a move has been recorded.
    #[must_use]
    pub fn has_move(&self) -> bool {
        self.action_name.is_some()
    }

    pub(crate) fn record(&mut self, player: PlayerId, action: &str, args: Args) {
        self.player = Some(player);
        self.action_name = Some(action.to_string());
        self.args = Some(args);
    }

    pub(crate) fn clear_move(&mut self) {
        self.player = None;
        self.action_name = None;
        self.args = None;
    }
}

/// Live position of one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Position {
    Sequence(SequencePosition),
    Loop(LoopPosition),
    ForEach(ForEachPosition),
    Switch(SwitchPosition),
    Action(ActionPosition),
}

impl Position {
    #[must_use]
    pub fn kind(&self) -> FlowKind {
        match self {
            Position::Sequence(_) => FlowKind::Sequence,
            Position::Loop(_) => FlowKind::Loop,
            Position::ForEach(_) => FlowKind::Foreach,
            Position::Switch(_) => FlowKind::SwitchCase,
            Position::Action(_) => FlowKind::Action,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Position::Sequence(p) => serde_json::to_value(p),
            Position::Loop(p) => serde_json::to_value(p),
            Position::ForEach(p) => serde_json::to_value(p),
            Position::Switch(p) => serde_json::to_value(p),
            Position::Action(p) => serde_json::to_value(p),
        }
    }

    pub fn from_json(kind: FlowKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            FlowKind::Sequence => Position::Sequence(serde_json::from_value(value)?),
            FlowKind::Loop => Position::Loop(serde_json::from_value(value)?),
            FlowKind::Foreach => Position::ForEach(serde_json::from_value(value)?),
            FlowKind::SwitchCase => Position::Switch(serde_json::from_value(value)?),
            FlowKind::Action => Position::Action(serde_json::from_value(value)?),
        })
    }
}

/// One persisted stack level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchJson {
    #[serde(rename = "type")]
    pub kind: FlowKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub position: serde_json::Value,
}

/// One persisted branch: `main`, or an active subflow invocation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchStack {
    pub name: String,
    #[serde(default, skip_serializing_if = "Args::is_empty")]
    pub args: Args,
    /// Entered from a step, whose parent advances when this branch returns.
    #[serde(default, rename = "resumeAdvance", skip_serializing_if = "is_false")]
    pub resume_advance: bool,
    pub stack: Vec<BranchJson>,
}

fn is_false(value: &bool) -> bool {
    !value
}
