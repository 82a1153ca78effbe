//! The flow interpreter.
//!
//! Live state is an explicit stack of frames per branch: `main` first, then
//! one branch per active subflow invocation. A frame is a node plus its
//! position. The top frame of the last branch is the active one.
//!
//! ## Stepping
//!
//! Each call to `play_one_step` looks at the active frame:
//!
//! - action step without a recorded move: suspend with an
//!   [`ActionRequest`], or complete the step when nobody can act
//! - action step with a recorded move: run that action's follow-up block,
//!   or advance
//! - any other frame: enter its current child, run it if it is a plain
//!   step, or complete the frame when it has none
//!
//! Completing a frame pops it and advances its parent, which may complete
//! in turn. A branch whose frames run out is popped; control returns to the
//! branch below exactly where it jumped. A branch entered from a step owes
//! its caller the advance past that step, taken only once it pops.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::builder::StepFn;
use super::control::{FlowControl, FlowScope, StepContext};
use super::position::{ActionPosition, BranchJson, BranchStack, FlowKind, Position};
use super::program::{Advance, FlowProgram, NodeId, MAIN};
use crate::actions::ActionRegistry;
use crate::core::{Args, EngineConfig, FlowError, GameError, GameRng, MoveError, PlayerId};

/// One live node.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub node: NodeId,
    pub position: Position,
}

/// Root-to-leaf frames of `main` or of one subflow invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub name: String,
    pub args: Args,
    pub frames: Vec<Frame>,
    /// Entered from a step: advance the branch below on return.
    pub resume_advance: bool,
}

/// Complete live state of a flow.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlowState {
    pub branches: Vec<Branch>,
}

/// Actions one player may take right now.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedActions {
    pub player: PlayerId,
    pub actions: Vec<String>,
}

/// Returned when the flow waits for players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub allowed: Vec<AllowedActions>,
}

impl ActionRequest {
    /// Players with at least one possible action.
    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.allowed.iter().map(|a| a.player)
    }

    /// Actions `player` may take, if any.
    #[must_use]
    pub fn actions_for(&self, player: PlayerId) -> Option<&[String]> {
        self.allowed
            .iter()
            .find(|a| a.player == player)
            .map(|a| a.actions.as_slice())
    }
}

impl FlowState {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.branches.is_empty()
    }

    /// The action step waiting for a move, if any.
    #[must_use]
    pub fn awaiting(&self) -> Option<(NodeId, &ActionPosition)> {
        let frame = self.branches.last()?.frames.last()?;
        match &frame.position {
            Position::Action(position) if !position.has_move() => Some((frame.node, position)),
            _ => None,
        }
    }

    /// Persisted form: one stack per branch, root to leaf.
    pub fn to_json<G>(&self, program: &FlowProgram<G>) -> Result<Vec<BranchStack>, FlowError> {
        self.branches
            .iter()
            .map(|branch| {
                let stack = branch
                    .frames
                    .iter()
                    .map(|frame| {
                        Ok(BranchJson {
                            kind: frame.position.kind(),
                            name: program.name(frame.node).map(str::to_string),
                            position: frame.position.to_json().map_err(FlowError::Encode)?,
                        })
                    })
                    .collect::<Result<Vec<_>, FlowError>>()?;
                Ok(BranchStack {
                    name: branch.name.clone(),
                    args: branch.args.clone(),
                    resume_advance: branch.resume_advance,
                    stack,
                })
            })
            .collect()
    }

    /// Rebuild live state from its persisted form.
    ///
    /// Every level must match the node the program has at that point of
    /// the chain. A mismatch means the program changed under the saved
    /// state and is fatal.
    pub fn from_json<G>(
        program: &FlowProgram<G>,
        stacks: &[BranchStack],
    ) -> Result<Self, FlowError> {
        let mut branches = Vec::with_capacity(stacks.len());
        for saved in stacks {
            let root = program
                .root(&saved.name)
                .ok_or_else(|| FlowError::UnknownSubflow(saved.name.clone()))?;

            let mut expected = Some(root);
            let mut frames = Vec::with_capacity(saved.stack.len());
            for (level, entry) in saved.stack.iter().enumerate() {
                let found = describe(Some(entry.kind), entry.name.as_deref());
                let Some(node) = expected else {
                    return Err(FlowError::StackMismatch {
                        level,
                        expected: "end of stack".into(),
                        found,
                    });
                };
                let kind = program.kind(node);
                let name = program.name(node);
                if kind != Some(entry.kind) || name != entry.name.as_deref() {
                    return Err(FlowError::StackMismatch {
                        level,
                        expected: describe(kind, name),
                        found,
                    });
                }

                let position = Position::from_json(entry.kind, entry.position.clone()).map_err(
                    |source| FlowError::InvalidPosition {
                        level,
                        kind: entry.kind.to_string(),
                        source,
                    },
                )?;
                expected = program
                    .current_block(node, &position)
                    .filter(|child| program.kind(*child).is_some());
                frames.push(Frame { node, position });
            }

            branches.push(Branch {
                name: saved.name.clone(),
                args: saved.args.clone(),
                frames,
                resume_advance: saved.resume_advance,
            });
        }
        Ok(Self { branches })
    }
}

fn describe(kind: Option<FlowKind>, name: Option<&str>) -> String {
    let kind = kind.map_or("step", FlowKind::as_str);
    match name {
        Some(name) => format!("{kind} `{name}`"),
        None => kind.to_string(),
    }
}

/// Branch args plus the bindings of the first `depth` frames.
fn bindings<G>(program: &FlowProgram<G>, branch: &Branch, depth: usize) -> Args {
    let mut args = branch.args.clone();
    for frame in &branch.frames[..depth] {
        if let Some((name, value)) = program.binding(frame.node, &frame.position) {
            args.insert(name.to_string(), value);
        }
    }
    args
}

/// What the players of an action step may do now.
pub(crate) fn request_for<G>(
    program: &FlowProgram<G>,
    actions: &ActionRegistry<G>,
    game: &G,
    node: NodeId,
    position: &ActionPosition,
) -> Option<ActionRequest> {
    let offered = program.step_actions(node);
    let allowed: Vec<AllowedActions> = position
        .eligible()
        .into_iter()
        .filter_map(|player| {
            let possible: Vec<String> = offered
                .iter()
                .filter(|name| actions.get(name).is_some_and(|a| a.is_possible(game, player)))
                .map(|name| (*name).to_string())
                .collect();
            (!possible.is_empty()).then_some(AllowedActions {
                player,
                actions: possible,
            })
        })
        .collect();

    (!allowed.is_empty()).then(|| ActionRequest {
        step: program.name(node).map(str::to_string),
        prompt: program.step_prompt(node).map(str::to_string),
        allowed,
    })
}

enum StepOutcome {
    Continue,
    Await(ActionRequest),
    Finished,
}

enum Signal {
    Repeat,
    Skip,
    Break,
}

/// Borrowed view of a game that drives its flow.
pub(crate) struct Interpreter<'a, G> {
    pub program: &'a FlowProgram<G>,
    pub actions: &'a ActionRegistry<G>,
    pub config: &'a EngineConfig,
    pub players: &'a [PlayerId],
    pub state: &'a mut FlowState,
    pub game: &'a mut G,
    pub current: &'a mut Vec<PlayerId>,
    pub rng: &'a mut GameRng,
    pub messages: &'a mut Vec<String>,
}

impl<G> Interpreter<'_, G> {
    /// Reset to the beginning of `main`.
    pub fn start(&mut self) -> Result<(), FlowError> {
        self.state.branches.clear();
        self.push_branch(MAIN, Args::new(), false)
    }

    /// Run until a player must act or the flow finishes.
    pub fn play(&mut self) -> Result<Option<ActionRequest>, FlowError> {
        for _ in 0..self.config.max_steps_per_play {
            match self.play_one_step()? {
                StepOutcome::Continue => {}
                StepOutcome::Await(request) => return Ok(Some(request)),
                StepOutcome::Finished => return Ok(None),
            }
        }
        Err(FlowError::StepLimit(self.config.max_steps_per_play))
    }

    fn play_one_step(&mut self) -> Result<StepOutcome, FlowError> {
        let program = self.program;
        let Some(branch) = self.state.branches.last() else {
            return Ok(StepOutcome::Finished);
        };
        let Some(frame) = branch.frames.last() else {
            self.pop_branch()?;
            return Ok(StepOutcome::Continue);
        };
        let node = frame.node;

        if let Position::Action(position) = &frame.position {
            if !position.has_move() {
                let game = &*self.game;
                if let Some(request) = request_for(program, self.actions, game, node, position) {
                    return Ok(StepOutcome::Await(request));
                }
                debug!(step = program.name(node), "no player can act, skipping step");
                self.complete_top()?;
                return Ok(StepOutcome::Continue);
            }
        }

        match program.current_block(node, &frame.position) {
            None if matches!(frame.position, Position::Action(_)) => self.advance_top()?,
            None => self.complete_top()?,
            Some(child) => match program.step(child) {
                Some(step) => self.run_step(step)?,
                None => self.enter(child)?,
            },
        }
        Ok(StepOutcome::Continue)
    }

    /// Push a frame for `node` on the current branch.
    fn enter(&mut self, node: NodeId) -> Result<(), FlowError> {
        let program = self.program;
        let branch = self.state.branches.last_mut().ok_or(FlowError::NotStarted)?;
        let args = bindings(program, branch, branch.frames.len());
        let scope = FlowScope {
            game: &*self.game,
            args: &args,
            players: self.players,
            current_players: &self.current[..],
        };
        let Some(position) = program.reset(node, &scope) else {
            return Ok(());
        };
        if let Some(player) = program.turn_player(node, &position) {
            *self.current = vec![player];
        }
        trace!(kind = ?position.kind(), name = program.name(node), "enter");
        branch.frames.push(Frame { node, position });
        Ok(())
    }

    /// The active frame's child completed.
    fn advance_top(&mut self) -> Result<(), FlowError> {
        let program = self.program;
        let Some(branch) = self.state.branches.last_mut() else {
            return Ok(());
        };
        let Some(top) = branch.frames.len().checked_sub(1) else {
            return self.pop_branch();
        };
        let args = bindings(program, branch, top);
        let scope = FlowScope {
            game: &*self.game,
            args: &args,
            players: self.players,
            current_players: &self.current[..],
        };
        let frame = &mut branch.frames[top];
        match program.advance(frame.node, &mut frame.position, &scope) {
            Advance::Continue => {
                trace!(kind = ?frame.position.kind(), name = program.name(frame.node), "advance");
                if let Some(player) = program.turn_player(frame.node, &frame.position) {
                    *self.current = vec![player];
                }
                Ok(())
            }
            Advance::Complete => self.complete_top(),
        }
    }

    /// Pop the active frame and advance its parent.
    fn complete_top(&mut self) -> Result<(), FlowError> {
        let Some(branch) = self.state.branches.last_mut() else {
            return Ok(());
        };
        if let Some(frame) = branch.frames.pop() {
            trace!(kind = ?frame.position.kind(), name = self.program.name(frame.node), "complete");
        }
        if branch.frames.is_empty() {
            self.pop_branch()
        } else {
            self.advance_top()
        }
    }

    /// Drop the finished branch and resume the one below.
    fn pop_branch(&mut self) -> Result<(), FlowError> {
        let Some(branch) = self.state.branches.pop() else {
            return Ok(());
        };
        debug!(flow = %branch.name, "flow finished");
        if branch.resume_advance {
            self.advance_top()
        } else {
            Ok(())
        }
    }

    fn push_branch(
        &mut self,
        name: &str,
        args: Args,
        resume_advance: bool,
    ) -> Result<(), FlowError> {
        let root = self
            .program
            .root(name)
            .ok_or_else(|| FlowError::UnknownSubflow(name.to_string()))?;
        debug!(flow = name, resume_advance, "entering flow");
        self.state.branches.push(Branch {
            name: name.to_string(),
            args,
            frames: Vec::new(),
            resume_advance,
        });
        self.enter(root)
    }

    fn run_step(&mut self, step: &StepFn<G>) -> Result<(), FlowError> {
        let program = self.program;
        let branch = self.state.branches.last().ok_or(FlowError::NotStarted)?;
        let args = bindings(program, branch, branch.frames.len());
        let control = {
            let mut ctx = StepContext {
                game: &mut *self.game,
                args: &args,
                players: self.players,
                current_players: &mut *self.current,
                rng: &mut *self.rng,
                messages: &mut *self.messages,
            };
            step(&mut ctx)
        };
        self.apply(control, true)
    }

    /// Act on a step's or a move's request.
    ///
    /// A jump leaves the caller's position untouched. A step's caller is
    /// advanced past the step once the subflow returns; a move is already
    /// recorded and its action step resumes on its own.
    fn apply(&mut self, control: FlowControl, from_step: bool) -> Result<(), FlowError> {
        let (signal, target) = match control {
            FlowControl::Complete if from_step => return self.advance_top(),
            FlowControl::Complete => return Ok(()),
            FlowControl::Subflow { name, args } => return self.push_branch(&name, args, from_step),
            FlowControl::Repeat(target) => (Signal::Repeat, target),
            FlowControl::Skip(target) => (Signal::Skip, target),
            FlowControl::Break(target) => (Signal::Break, target),
        };

        let program = self.program;
        let branch = self.state.branches.last_mut().ok_or(FlowError::NotStarted)?;
        let Some(index) = branch.frames.iter().rposition(|frame| {
            program.is_loop(frame.node)
                && target
                    .as_deref()
                    .map_or(true, |t| program.name(frame.node) == Some(t))
        }) else {
            return Err(FlowError::NoEnclosingLoop(target));
        };
        branch.frames.truncate(index + 1);
        debug!(loop_name = target.as_deref(), "loop signal");

        match signal {
            Signal::Repeat => Ok(()),
            Signal::Skip => self.advance_top(),
            Signal::Break => self.complete_top(),
        }
    }

    /// Hand a submitted move to the waiting action step.
    pub fn process_move(
        &mut self,
        player: PlayerId,
        action: &str,
        args: &Args,
    ) -> Result<(), GameError> {
        let program = self.program;
        let (node, position) = self.state.awaiting().ok_or(FlowError::NotAwaitingMove)?;
        if !position.eligible().contains(&player) {
            return Err(FlowError::IneligiblePlayer(player).into());
        }
        if !program.step_actions(node).contains(&action) {
            return Err(MoveError::structural(format!("`{action}` is not available now")).into());
        }
        let registered = self
            .actions
            .get(action)
            .ok_or_else(|| FlowError::UnknownAction(action.to_string()))?;

        let outcome = match registered.process(self.game, player, args, self.rng) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(action, %player, error = %e, "move rejected");
                return Err(e.into());
            }
        };
        debug!(action, %player, "move processed");
        self.messages.extend(outcome.messages);

        if let Some(Frame {
            position: Position::Action(position),
            ..
        }) = self.state.branches.last_mut().and_then(|b| b.frames.last_mut())
        {
            position.record(player, action, outcome.args);
        }
        Ok(self.apply(outcome.control, false)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::flow::builder::{Flow, Loop, PlayerActions};

    #[derive(Default)]
    struct Log {
        entries: Vec<String>,
    }

    struct Harness {
        program: FlowProgram<Log>,
        actions: ActionRegistry<Log>,
        config: EngineConfig,
        players: Vec<PlayerId>,
        state: FlowState,
        game: Log,
        current: Vec<PlayerId>,
        rng: GameRng,
        messages: Vec<String>,
    }

    impl Harness {
        fn new(main: Flow<Log>) -> Self {
            let mut actions = ActionRegistry::new();
            actions.register("go", Action::<Log>::new());
            let players: Vec<_> = PlayerId::all(2).collect();
            Self {
                program: FlowProgram::new(main),
                actions,
                config: EngineConfig::default().with_max_steps(1000),
                current: players.clone(),
                players,
                state: FlowState::default(),
                game: Log::default(),
                rng: GameRng::new(7),
                messages: Vec::new(),
            }
        }

        fn interpreter(&mut self) -> Interpreter<'_, Log> {
            Interpreter {
                program: &self.program,
                actions: &self.actions,
                config: &self.config,
                players: &self.players,
                state: &mut self.state,
                game: &mut self.game,
                current: &mut self.current,
                rng: &mut self.rng,
                messages: &mut self.messages,
            }
        }
    }

    fn log(text: &'static str) -> Flow<Log> {
        Flow::step(move |ctx: &mut StepContext<'_, Log>| ctx.game.entries.push(text.to_string()))
    }

    #[test]
    fn test_sequence_runs_to_completion() {
        let mut h = Harness::new(Flow::sequence(vec![log("a"), log("b")]));
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        assert_eq!(interpreter.play().unwrap(), None);

        assert!(h.state.is_finished());
        assert_eq!(h.game.entries, vec!["a", "b"]);
    }

    #[test]
    fn test_waits_at_action_step() {
        let mut h = Harness::new(Flow::sequence(vec![
            log("before"),
            PlayerActions::new(["go"]).into(),
        ]));
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        let request = interpreter.play().unwrap().unwrap();

        assert_eq!(request.players().count(), 2);
        assert_eq!(request.actions_for(PlayerId::new(0)), Some(&["go".to_string()][..]));
        assert!(h.state.awaiting().is_some());
    }

    #[test]
    fn test_break_leaves_loop() {
        let mut h = Harness::new(Flow::sequence(vec![
            Loop::forever(Flow::sequence(vec![
                log("body"),
                Flow::step(|_: &mut StepContext<'_, Log>| FlowControl::break_loop()),
                log("unreachable"),
            ]))
            .into(),
            log("after"),
        ]));
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        interpreter.play().unwrap();

        assert_eq!(h.game.entries, vec!["body", "after"]);
    }

    #[test]
    fn test_signal_outside_loop_is_fatal() {
        let mut h = Harness::new(Flow::step(|_: &mut StepContext<'_, Log>| FlowControl::skip()));
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        assert!(matches!(interpreter.play(), Err(FlowError::NoEnclosingLoop(None))));
    }

    #[test]
    fn test_step_limit() {
        let mut h = Harness::new(Loop::forever(log("spin")).into());
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        assert!(matches!(interpreter.play(), Err(FlowError::StepLimit(1000))));
    }

    #[test]
    fn test_json_round_trip_mid_flow() {
        let mut h = Harness::new(
            Loop::for_loop(|_| 0, |v| v + 1, |_, v| v < 3, PlayerActions::new(["go"]))
                .named("round")
                .into(),
        );
        let mut interpreter = h.interpreter();
        interpreter.start().unwrap();
        interpreter.play().unwrap();
        interpreter.process_move(PlayerId::new(1), "go", &Args::new()).unwrap();
        interpreter.play().unwrap();

        let json = h.state.to_json(&h.program).unwrap();
        let restored = FlowState::from_json(&h.program, &json).unwrap();
        assert_eq!(restored, h.state);
        assert_eq!(json[0].stack[0].position["value"], 1);
    }

    #[test]
    fn test_from_json_rejects_mismatch() {
        let h = Harness::new(Flow::sequence(vec![PlayerActions::new(["go"]).into()]));
        let stacks = vec![BranchStack {
            name: MAIN.into(),
            args: Args::new(),
            resume_advance: false,
            stack: vec![BranchJson {
                kind: FlowKind::Loop,
                name: None,
                position: serde_json::json!({"index": 0}),
            }],
        }];

        let err = FlowState::from_json(&h.program, &stacks).unwrap_err();
        assert!(matches!(err, FlowError::StackMismatch { level: 0, .. }));
    }
}
