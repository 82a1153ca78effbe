//! Arena-compiled flow program.
//!
//! Declarative [`Flow`] trees are flattened into a `Vec<Node>` with
//! index-based references, like an arena tree. The program is the static
//! half of a running game: it never changes after `build()`, and every live
//! frame refers back into it by [`NodeId`].
//!
//! Each node kind defines three operations over its [`Position`]:
//!
//! - `reset`: initial position on entry, from static configuration and the
//!   bindings of the enclosing frames
//! - `current_block`: the child to run for a position, if any
//! - `advance`: move on once that child completed

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::builder::{Case, Flow, LoopKind, ScopeFn, StepFn};
use super::control::FlowScope;
use super::position::{
    ActionPosition, FlowKind, ForEachPosition, LoopPosition, Position, SequencePosition,
    SwitchPosition, EXHAUSTED,
};
use crate::core::{Argument, FlowError, PlayerId};

/// Name of the entry flow.
pub const MAIN: &str = "main";

/// Node ID (index into the program's node arena).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }
}

/// Outcome of advancing a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Advance {
    Continue,
    Complete,
}

pub(crate) enum NodeKind<G> {
    Step(StepFn<G>),
    Sequence(Vec<NodeId>),
    Loop {
        kind: LoopKind<G>,
        body: NodeId,
    },
    ForEach {
        collection: ScopeFn<G, Vec<Argument>>,
        body: NodeId,
    },
    EachPlayer {
        starting: Option<ScopeFn<G, PlayerId>>,
        body: NodeId,
    },
    Switch {
        value: ScopeFn<G, Argument>,
        cases: Vec<(Case, NodeId)>,
        default: Option<NodeId>,
    },
    Action {
        actions: Vec<(String, Option<NodeId>)>,
        players: Option<ScopeFn<G, Vec<PlayerId>>>,
        prompt: Option<String>,
        every_player: bool,
    },
}

pub(crate) struct Node<G> {
    name: Option<String>,
    kind: NodeKind<G>,
}

/// Static flow program: `main` plus named subflows.
pub struct FlowProgram<G> {
    nodes: Vec<Node<G>>,
    roots: FxHashMap<String, NodeId>,
}

impl<G> FlowProgram<G> {
    /// Compile the main flow.
    pub fn new(main: Flow<G>) -> Self {
        let mut program = Self {
            nodes: Vec::new(),
            roots: FxHashMap::default(),
        };
        let root = program.compile_block(main);
        program.roots.insert(MAIN.to_string(), root);
        program
    }

    /// Compile a named subflow.
    pub fn add_subflow(&mut self, name: impl Into<String>, flow: Flow<G>) -> Result<(), FlowError> {
        let name = name.into();
        if self.roots.contains_key(&name) {
            return Err(FlowError::DuplicateSubflow(name));
        }
        let root = self.compile_block(flow);
        self.roots.insert(name, root);
        Ok(())
    }

    /// Root node of `main` or a subflow.
    #[must_use]
    pub fn root(&self, name: &str) -> Option<NodeId> {
        self.roots.get(name).copied()
    }

    /// Number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node(&self, id: NodeId) -> &Node<G> {
        &self.nodes[id.0 as usize]
    }

    fn alloc(&mut self, name: Option<String>, kind: NodeKind<G>) -> NodeId {
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node { name, kind });
        id
    }

    /// Compile a block. Bare steps are wrapped so that only composite and
    /// action nodes ever own a frame.
    fn compile_block(&mut self, flow: Flow<G>) -> NodeId {
        match flow {
            Flow::Step(step) => {
                let step = self.alloc(None, NodeKind::Step(step));
                self.alloc(None, NodeKind::Sequence(vec![step]))
            }
            other => self.compile(other),
        }
    }

    fn compile(&mut self, flow: Flow<G>) -> NodeId {
        match flow {
            Flow::Step(step) => self.alloc(None, NodeKind::Step(step)),
            Flow::Sequence(children) => {
                let children = children.into_iter().map(|c| self.compile(c)).collect();
                self.alloc(None, NodeKind::Sequence(children))
            }
            Flow::Loop(node) => {
                let body = self.compile_block(*node.body);
                self.alloc(
                    node.name,
                    NodeKind::Loop {
                        kind: node.kind,
                        body,
                    },
                )
            }
            Flow::ForEach(node) => {
                let body = self.compile_block(*node.body);
                self.alloc(
                    Some(node.name),
                    NodeKind::ForEach {
                        collection: node.collection,
                        body,
                    },
                )
            }
            Flow::EachPlayer(node) => {
                let body = self.compile_block(*node.body);
                self.alloc(
                    Some(node.name),
                    NodeKind::EachPlayer {
                        starting: node.starting,
                        body,
                    },
                )
            }
            Flow::Switch(node) => {
                let cases = node
                    .cases
                    .into_iter()
                    .map(|(case, block)| (case, self.compile_block(block)))
                    .collect();
                let default = node.default.map(|block| self.compile_block(*block));
                self.alloc(
                    node.name,
                    NodeKind::Switch {
                        value: node.value,
                        cases,
                        default,
                    },
                )
            }
            Flow::Actions(node) => {
                let actions = node
                    .actions
                    .into_iter()
                    .map(|choice| {
                        let followup = choice.followup.map(|f| self.compile_block(f));
                        (choice.name, followup)
                    })
                    .collect();
                self.alloc(
                    node.name,
                    NodeKind::Action {
                        actions,
                        players: node.players,
                        prompt: node.prompt,
                        every_player: node.every_player,
                    },
                )
            }
        }
    }

    /// Persisted kind of a node. Steps have none; they never own a frame.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> Option<FlowKind> {
        match self.node(id).kind {
            NodeKind::Step(_) => None,
            NodeKind::Sequence(_) => Some(FlowKind::Sequence),
            NodeKind::Loop { .. } => Some(FlowKind::Loop),
            NodeKind::ForEach { .. } | NodeKind::EachPlayer { .. } => Some(FlowKind::Foreach),
            NodeKind::Switch { .. } => Some(FlowKind::SwitchCase),
            NodeKind::Action { .. } => Some(FlowKind::Action),
        }
    }

    #[must_use]
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.node(id).name.as_deref()
    }

    /// Loop-kind nodes are the targets of loop signals.
    pub(crate) fn is_loop(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).kind,
            NodeKind::Loop { .. } | NodeKind::ForEach { .. } | NodeKind::EachPlayer { .. }
        )
    }

    pub(crate) fn step(&self, id: NodeId) -> Option<&StepFn<G>> {
        match &self.node(id).kind {
            NodeKind::Step(step) => Some(step),
            _ => None,
        }
    }

    /// Every action name used by an action step, in arena order.
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().flat_map(|node| match &node.kind {
            NodeKind::Action { actions, .. } => {
                actions.iter().map(|(name, _)| name.as_str()).collect()
            }
            _ => Vec::new(),
        })
    }

    /// Actions offered by an action step, in declared order.
    pub(crate) fn step_actions(&self, id: NodeId) -> Vec<&str> {
        match &self.node(id).kind {
            NodeKind::Action { actions, .. } => {
                actions.iter().map(|(name, _)| name.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn step_prompt(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Action { prompt, .. } => prompt.as_deref(),
            _ => None,
        }
    }

    fn followup(&self, id: NodeId, action: &str) -> Option<NodeId> {
        match &self.node(id).kind {
            NodeKind::Action { actions, .. } => actions
                .iter()
                .find(|(name, _)| name == action)
                .and_then(|(_, followup)| *followup),
            _ => None,
        }
    }

    /// Initial position on entry.
    pub(crate) fn reset(&self, id: NodeId, scope: &FlowScope<'_, G>) -> Option<Position> {
        let position = match &self.node(id).kind {
            NodeKind::Step(_) => return None,
            NodeKind::Sequence(_) => Position::Sequence(SequencePosition { index: 0 }),
            NodeKind::Loop { kind, .. } => Position::Loop(match kind {
                LoopKind::Forever => LoopPosition {
                    index: 0,
                    value: None,
                },
                LoopKind::While(condition) => LoopPosition {
                    index: if condition(scope) { 0 } else { EXHAUSTED },
                    value: None,
                },
                LoopKind::For {
                    initial, condition, ..
                } => {
                    let value = initial(scope);
                    LoopPosition {
                        index: if condition(scope, value) { 0 } else { EXHAUSTED },
                        value: Some(Argument::Number(value)),
                    }
                }
            }),
            NodeKind::ForEach { collection, .. } => {
                Position::ForEach(ForEachPosition::at(collection(scope), 0))
            }
            NodeKind::EachPlayer { starting, .. } => {
                let start = starting.as_ref().map(|f| f(scope));
                let order = seat_order(scope.players, start);
                Position::ForEach(ForEachPosition::at(order, 0))
            }
            NodeKind::Switch {
                value,
                cases,
                default,
            } => {
                let value = value(scope);
                let index = cases.iter().position(|(case, _)| case.matches(&value));
                Position::Switch(SwitchPosition {
                    index,
                    default: index.is_none() && default.is_some(),
                    value,
                })
            }
            NodeKind::Action {
                players,
                every_player,
                ..
            } => {
                let players = match players {
                    Some(f) => f(scope),
                    None => scope.current_players.to_vec(),
                };
                Position::Action(ActionPosition::new(players, *every_player))
            }
        };
        Some(position)
    }

    /// Child to run next for `position`.
    pub(crate) fn current_block(&self, id: NodeId, position: &Position) -> Option<NodeId> {
        match (&self.node(id).kind, position) {
            (NodeKind::Sequence(children), Position::Sequence(p)) => children.get(p.index).copied(),
            (NodeKind::Loop { body, .. }, Position::Loop(p)) => {
                (!p.is_exhausted()).then_some(*body)
            }
            (
                NodeKind::ForEach { body, .. } | NodeKind::EachPlayer { body, .. },
                Position::ForEach(p),
            ) => (!p.is_exhausted()).then_some(*body),
            (NodeKind::Switch { cases, default, .. }, Position::Switch(p)) => match p.index {
                Some(i) => cases.get(i).map(|(_, block)| *block),
                None if p.default => *default,
                None => None,
            },
            (NodeKind::Action { .. }, Position::Action(p)) => p
                .action_name
                .as_deref()
                .and_then(|action| self.followup(id, action)),
            _ => None,
        }
    }

    /// Move past the completed child.
    pub(crate) fn advance(
        &self,
        id: NodeId,
        position: &mut Position,
        scope: &FlowScope<'_, G>,
    ) -> Advance {
        match (&self.node(id).kind, position) {
            (NodeKind::Sequence(children), Position::Sequence(p)) => {
                p.index += 1;
                if p.index < children.len() {
                    Advance::Continue
                } else {
                    Advance::Complete
                }
            }
            (NodeKind::Loop { kind, .. }, Position::Loop(p)) => {
                let proceed = match kind {
                    LoopKind::Forever => true,
                    LoopKind::While(condition) => condition(scope),
                    LoopKind::For {
                        next, condition, ..
                    } => {
                        let current = p.value.as_ref().and_then(Argument::as_number);
                        let value = next(current.unwrap_or(0));
                        p.value = Some(Argument::Number(value));
                        condition(scope, value)
                    }
                };
                if proceed {
                    p.index += 1;
                    Advance::Continue
                } else {
                    p.index = EXHAUSTED;
                    Advance::Complete
                }
            }
            (NodeKind::ForEach { .. } | NodeKind::EachPlayer { .. }, Position::ForEach(p)) => {
                let next = if p.is_exhausted() { p.collection.len() } else { p.index as usize + 1 };
                *p = ForEachPosition::at(std::mem::take(&mut p.collection), next);
                if p.is_exhausted() {
                    Advance::Complete
                } else {
                    Advance::Continue
                }
            }
            (NodeKind::Action { .. }, Position::Action(p)) => {
                let Some(done) = p.completed.as_mut() else {
                    return Advance::Complete;
                };
                if let Some(player) = p.player {
                    done.push(player);
                }
                p.clear_move();
                if p.eligible().is_empty() {
                    Advance::Complete
                } else {
                    Advance::Continue
                }
            }
            _ => Advance::Complete,
        }
    }

    /// Value a frame binds for the blocks nested in it.
    pub(crate) fn binding(&self, id: NodeId, position: &Position) -> Option<(&str, Argument)> {
        let name = self.name(id)?;
        let value = match position {
            Position::Loop(p) => p.value.clone().unwrap_or(Argument::Number(p.index)),
            Position::ForEach(p) => p.value.clone()?,
            Position::Switch(p) => p.value.clone(),
            Position::Sequence(_) | Position::Action(_) => return None,
        };
        Some((name, value))
    }

    /// Player an each-player frame makes current.
    pub(crate) fn turn_player(&self, id: NodeId, position: &Position) -> Option<PlayerId> {
        match (&self.node(id).kind, position) {
            (NodeKind::EachPlayer { .. }, Position::ForEach(p)) => {
                p.value.as_ref().and_then(Argument::as_player)
            }
            _ => None,
        }
    }
}

/// Seat order rotated to begin at `start`.
fn seat_order(players: &[PlayerId], start: Option<PlayerId>) -> Vec<Argument> {
    let offset = start
        .and_then(|s| players.iter().position(|p| *p == s))
        .unwrap_or(0);
    players[offset..]
        .iter()
        .chain(&players[..offset])
        .copied()
        .map(Argument::Player)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Args;
    use crate::flow::builder::{EachPlayer, ForEach, IfElse, Loop, PlayerActions, Switch};

    fn players() -> Vec<PlayerId> {
        PlayerId::all(3).collect()
    }

    fn scope<'a>(args: &'a Args, players: &'a [PlayerId]) -> FlowScope<'a, ()> {
        FlowScope {
            game: &(),
            args,
            players,
            current_players: &players[..1],
        }
    }

    #[test]
    fn test_bare_step_is_wrapped() {
        let program: FlowProgram<()> = FlowProgram::new(Flow::step(|_| {}));
        let root = program.root(MAIN).unwrap();

        assert_eq!(program.kind(root), Some(FlowKind::Sequence));
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_duplicate_subflow_rejected() {
        let mut program: FlowProgram<()> = FlowProgram::new(Flow::sequence(vec![]));
        assert!(program.add_subflow("bonus", Flow::sequence(vec![])).is_ok());
        assert!(matches!(
            program.add_subflow("bonus", Flow::sequence(vec![])),
            Err(FlowError::DuplicateSubflow(_))
        ));
        assert!(program.add_subflow(MAIN, Flow::sequence(vec![])).is_err());
    }

    #[test]
    fn test_for_loop_visits_range_then_sentinel() {
        let program: FlowProgram<()> = FlowProgram::new(
            Loop::for_loop(|_| 10, |v| v + 1, |_, v| v < 13, Flow::step(|_| {}))
                .named("i")
                .into(),
        );
        let root = program.root(MAIN).unwrap();
        let (args, players) = (Args::new(), players());
        let scope = scope(&args, &players);

        let mut position = program.reset(root, &scope).unwrap();
        let mut visited = Vec::new();
        loop {
            let (_, value) = program.binding(root, &position).unwrap();
            visited.push(value);
            if program.advance(root, &mut position, &scope) == Advance::Complete {
                break;
            }
        }

        assert_eq!(visited, vec![Argument::Number(10), Argument::Number(11), Argument::Number(12)]);
        assert_eq!(
            position,
            Position::Loop(LoopPosition {
                index: EXHAUSTED,
                value: Some(Argument::Number(13)),
            })
        );
        assert!(program.current_block(root, &position).is_none());
    }

    #[test]
    fn test_while_loop_false_on_entry() {
        let program: FlowProgram<()> =
            FlowProgram::new(Loop::repeat_while(|_| false, Flow::step(|_| {})).into());
        let root = program.root(MAIN).unwrap();
        let (args, players) = (Args::new(), players());

        let position = program.reset(root, &scope(&args, &players)).unwrap();
        assert!(program.current_block(root, &position).is_none());
    }

    #[test]
    fn test_each_player_rotation() {
        let program: FlowProgram<()> = FlowProgram::new(
            EachPlayer::new("turn", PlayerActions::new(["pass"]))
                .starting_with(|_| PlayerId::new(2))
                .into(),
        );
        let root = program.root(MAIN).unwrap();
        let (args, players) = (Args::new(), players());
        let scope = scope(&args, &players);

        let mut position = program.reset(root, &scope).unwrap();
        let mut order = Vec::new();
        loop {
            order.push(program.turn_player(root, &position).unwrap());
            if program.advance(root, &mut position, &scope) == Advance::Complete {
                break;
            }
        }
        assert_eq!(order, vec![PlayerId::new(2), PlayerId::new(0), PlayerId::new(1)]);
    }

    #[test]
    fn test_foreach_empty_collection() {
        let program: FlowProgram<()> =
            FlowProgram::new(ForEach::new("card", |_| Vec::new(), Flow::step(|_| {})).into());
        let root = program.root(MAIN).unwrap();
        let (args, players) = (Args::new(), players());

        let position = program.reset(root, &scope(&args, &players)).unwrap();
        assert!(program.current_block(root, &position).is_none());
        assert!(program.binding(root, &position).is_none());
    }

    #[test]
    fn test_switch_selects_case_or_default() {
        let program: FlowProgram<()> = FlowProgram::new(
            Switch::new(|scope| scope.arg("mode").cloned().unwrap_or(Argument::Number(0)))
                .case("fast", Flow::step(|_| {}))
                .case_when(|v| v.as_number().is_some(), Flow::step(|_| {}))
                .default(Flow::step(|_| {}))
                .named("mode-switch")
                .into(),
        );
        let root = program.root(MAIN).unwrap();
        let players = players();

        let fast: Args = [("mode".to_string(), Argument::from("fast"))].into_iter().collect();
        let slow: Args = [("mode".to_string(), Argument::from("slow"))].into_iter().collect();

        let Some(Position::Switch(p)) = program.reset(root, &scope(&fast, &players)) else {
            panic!("expected a switch position");
        };
        assert_eq!((p.index, p.default), (Some(0), false));

        let Some(Position::Switch(p)) = program.reset(root, &scope(&Args::new(), &players)) else {
            panic!("expected a switch position");
        };
        assert_eq!((p.index, p.default), (Some(1), false));

        let Some(Position::Switch(p)) = program.reset(root, &scope(&slow, &players)) else {
            panic!("expected a switch position");
        };
        assert_eq!((p.index, p.default), (None, true));
    }

    #[test]
    fn test_if_without_else_runs_nothing() {
        let program: FlowProgram<()> =
            FlowProgram::new(IfElse::new(|_| false, Flow::step(|_| {})).into());
        let root = program.root(MAIN).unwrap();
        let (args, players) = (Args::new(), players());

        let position = program.reset(root, &scope(&args, &players)).unwrap();
        assert!(program.current_block(root, &position).is_none());
    }

    #[test]
    fn test_action_names() {
        let program: FlowProgram<()> = FlowProgram::new(Flow::sequence(vec![
            PlayerActions::new(["take", "pass"]).into(),
            PlayerActions::new(Vec::<String>::new())
                .action_then("bid", Flow::step(|_| {}))
                .into(),
        ]));
        let names: Vec<_> = program.action_names().collect();
        assert_eq!(names, vec!["take", "pass", "bid"]);
    }
}
