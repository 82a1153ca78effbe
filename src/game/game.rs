//! The game driver: players, registered actions, the flow program and the
//! live state, behind one request-sized API.

use tracing::{debug, info};

use super::moves::Move;
use super::snapshot::GameSnapshot;
use crate::actions::{Action, ActionRegistry, PendingMove};
use crate::core::{Args, EngineConfig, FlowError, GameError, GameRng, PlayerId};
use crate::flow::interpreter::{request_for, Interpreter};
use crate::flow::{ActionRequest, BranchStack, Flow, FlowProgram, FlowState};

/// Builder for a [`Game`].
///
/// ```
/// use rust_turnflow::actions::{Action, Selection};
/// use rust_turnflow::flow::{Flow, PlayerActions};
/// use rust_turnflow::game::{GameBuilder, Move};
/// use rust_turnflow::core::PlayerId;
///
/// let mut game = GameBuilder::new(0_i64, 2)
///     .action(
///         "add",
///         Action::<i64>::new()
///             .select(Selection::number("n").min(1).max(3))
///             .perform(|ctx| {
///                 *ctx.game += ctx.number("n").unwrap_or(0);
///                 Ok(())
///             }),
///     )
///     .flow(PlayerActions::new(["add"]).into())
///     .build()
///     .unwrap();
///
/// assert!(game.start().unwrap().is_some());
/// let done = game.process_move(&Move::new(PlayerId::new(0), "add").with_arg("n", 2_i64)).unwrap();
/// assert!(done.is_none());
/// assert_eq!(*game.state(), 2);
/// ```
pub struct GameBuilder<G> {
    state: G,
    player_count: usize,
    actions: ActionRegistry<G>,
    main: Option<Flow<G>>,
    subflows: Vec<(String, Flow<G>)>,
    config: EngineConfig,
    seed: u64,
}

impl<G> GameBuilder<G> {
    pub fn new(state: G, player_count: usize) -> Self {
        assert!(player_count > 0, "Must have at least 1 player");
        assert!(player_count <= 255, "At most 255 players supported");
        Self {
            state,
            player_count,
            actions: ActionRegistry::new(),
            main: None,
            subflows: Vec::new(),
            config: EngineConfig::default(),
            seed: 0,
        }
    }

    #[must_use]
    pub fn action(mut self, name: impl Into<String>, action: Action<G>) -> Self {
        self.actions.register(name, action);
        self
    }

    /// The main flow. Without one the game finishes as soon as it starts.
    #[must_use]
    pub fn flow(mut self, main: Flow<G>) -> Self {
        self.main = Some(main);
        self
    }

    /// A named subflow, reachable by an explicit jump.
    #[must_use]
    pub fn subflow(mut self, name: impl Into<String>, flow: Flow<G>) -> Self {
        self.subflows.push((name.into(), flow));
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Compile the flow and check it against the registered actions.
    pub fn build(self) -> Result<Game<G>, FlowError> {
        let mut program = FlowProgram::new(self.main.unwrap_or(Flow::Sequence(Vec::new())));
        for (name, flow) in self.subflows {
            program.add_subflow(name, flow)?;
        }
        if let Some(missing) = program.action_names().find(|name| !self.actions.contains(name)) {
            return Err(FlowError::UnknownAction(missing.to_string()));
        }

        let players: Vec<PlayerId> = PlayerId::all(self.player_count).collect();
        Ok(Game {
            program,
            actions: self.actions,
            config: self.config,
            current_players: players.clone(),
            players,
            state: self.state,
            flow: FlowState::default(),
            rng: GameRng::new(self.seed),
            messages: Vec::new(),
            started: false,
        })
    }
}

/// A running game.
///
/// A stateless host rebuilds the `Game` from code on every request, then
/// either [`restore`](Game::restore)s the persisted snapshot or
/// [`start`](Game::start)s fresh.
pub struct Game<G> {
    program: FlowProgram<G>,
    actions: ActionRegistry<G>,
    config: EngineConfig,
    players: Vec<PlayerId>,
    state: G,
    flow: FlowState,
    current_players: Vec<PlayerId>,
    rng: GameRng,
    messages: Vec<String>,
    started: bool,
}

impl<G> Game<G> {
    fn interpreter(&mut self) -> Interpreter<'_, G> {
        Interpreter {
            program: &self.program,
            actions: &self.actions,
            config: &self.config,
            players: &self.players,
            state: &mut self.flow,
            game: &mut self.state,
            current: &mut self.current_players,
            rng: &mut self.rng,
            messages: &mut self.messages,
        }
    }

    /// Begin `main` and run to the first action step.
    pub fn start(&mut self) -> Result<Option<ActionRequest>, FlowError> {
        info!(players = self.players.len(), "starting game");
        self.current_players = self.players.clone();
        self.started = true;
        let mut interpreter = self.interpreter();
        interpreter.start()?;
        interpreter.play()
    }

    /// Run until a player must act or the flow finishes.
    pub fn play(&mut self) -> Result<Option<ActionRequest>, FlowError> {
        if !self.started {
            return Err(FlowError::NotStarted);
        }
        self.interpreter().play()
    }

    /// What the flow is currently waiting for.
    #[must_use]
    pub fn action_request(&self) -> Option<ActionRequest> {
        let (node, position) = self.flow.awaiting()?;
        request_for(&self.program, &self.actions, &self.state, node, position)
    }

    /// Actions `player` may take right now.
    #[must_use]
    pub fn allowed_actions(&self, player: PlayerId) -> Vec<String> {
        self.action_request()
            .and_then(|request| request.actions_for(player).map(<[String]>::to_vec))
            .unwrap_or_default()
    }

    /// Every pending move `player` could start now.
    ///
    /// An action with nothing left to choose is listed with no selections.
    #[must_use]
    pub fn pending_moves(&self, player: PlayerId) -> Vec<PendingMove> {
        let args = Args::new();
        self.allowed_actions(player)
            .iter()
            .filter_map(|name| {
                let moves = self
                    .actions
                    .get(name)?
                    .get_pending_moves(name, &self.state, player, &args)?;
                Some(if moves.is_empty() {
                    vec![PendingMove::ready(name.as_str(), args.clone())]
                } else {
                    moves
                })
            })
            .flatten()
            .collect()
    }

    /// Apply a move and run to the next suspension.
    ///
    /// A [`MoveError`](crate::core::MoveError) leaves the flow where it was.
    pub fn process_move(&mut self, mv: &Move) -> Result<Option<ActionRequest>, GameError> {
        if !self.started {
            return Err(FlowError::NotStarted.into());
        }
        let mut interpreter = self.interpreter();
        interpreter.process_move(mv.player, &mv.action, &mv.args)?;
        Ok(interpreter.play()?)
    }

    /// Persisted flow stack, one entry per branch.
    pub fn flow_json(&self) -> Result<Vec<BranchStack>, FlowError> {
        self.flow.to_json(&self.program)
    }

    /// Replace the live flow state with a persisted one.
    pub fn set_flow_from_json(&mut self, stacks: &[BranchStack]) -> Result<(), FlowError> {
        self.flow = FlowState::from_json(&self.program, stacks)?;
        self.started = true;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<GameSnapshot<G>, FlowError>
    where
        G: Clone,
    {
        Ok(GameSnapshot {
            players: self.players.clone(),
            entity_tree: self.state.clone(),
            flow_stack: self.flow_json()?,
            random_seed: self.rng.state(),
            current_players: self.current_players.clone(),
        })
    }

    /// Load persisted state. The flow stack is checked against this game's
    /// program before anything is replaced.
    pub fn restore(&mut self, snapshot: GameSnapshot<G>) -> Result<(), FlowError> {
        let flow = FlowState::from_json(&self.program, &snapshot.flow_stack)?;
        debug!(branches = flow.branches.len(), "restoring game");
        self.players = snapshot.players;
        self.state = snapshot.entity_tree;
        self.flow = flow;
        self.rng = GameRng::from_state(&snapshot.random_seed);
        self.current_players = snapshot.current_players;
        self.started = true;
        Ok(())
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.started && self.flow.is_finished()
    }

    #[must_use]
    pub fn state(&self) -> &G {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut G {
        &mut self.state
    }

    #[must_use]
    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    #[must_use]
    pub fn current_players(&self) -> &[PlayerId] {
        &self.current_players
    }

    #[must_use]
    pub fn flow_state(&self) -> &FlowState {
        &self.flow
    }

    #[must_use]
    pub fn rng(&self) -> &GameRng {
        &self.rng
    }

    /// Messages logged since the last [`take_messages`](Game::take_messages).
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn take_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Selection;
    use crate::core::MoveError;
    use crate::flow::{FlowControl, PlayerActions, StepContext};

    fn counter() -> GameBuilder<i64> {
        GameBuilder::new(0_i64, 2).action(
            "bump",
            Action::<i64>::new().perform(|ctx| {
                *ctx.game += 1;
                Ok(())
            }),
        )
    }

    #[test]
    fn test_build_rejects_unregistered_action() {
        let result = GameBuilder::new(0_i64, 2)
            .flow(PlayerActions::new(["missing"]).into())
            .build();
        assert!(matches!(result, Err(FlowError::UnknownAction(name)) if name == "missing"));
    }

    #[test]
    fn test_build_rejects_main_redefinition() {
        let result = counter()
            .subflow("main", Flow::sequence(Vec::new()))
            .build();
        assert!(matches!(result, Err(FlowError::DuplicateSubflow(_))));
    }

    #[test]
    fn test_move_before_start_is_fatal() {
        let mut game = counter().flow(PlayerActions::new(["bump"]).into()).build().unwrap();
        let err = game.process_move(&Move::new(PlayerId::new(0), "bump")).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(!game.is_finished());
    }

    #[test]
    fn test_empty_main_finishes_immediately() {
        let mut game = counter().build().unwrap();
        assert_eq!(game.start().unwrap(), None);
        assert!(game.is_finished());
    }

    #[test]
    fn test_pending_moves_lists_ready_actions() {
        let game = {
            let mut game = counter()
                .action(
                    "pick",
                    Action::<i64>::new().select(Selection::number("n").min(1).max(4)),
                )
                .flow(PlayerActions::new(["bump", "pick"]).into())
                .build()
                .unwrap();
            game.start().unwrap();
            game
        };

        let moves = game.pending_moves(PlayerId::new(1));
        assert_eq!(moves.len(), 2);
        assert!(moves[0].is_ready());
        assert_eq!(moves[1].selection().map(|s| s.name.as_str()), Some("n"));
    }

    #[test]
    fn test_rejected_move_leaves_flow_in_place() {
        let mut game = counter()
            .action(
                "pick",
                Action::<i64>::new().select(Selection::number("n").min(1).max(4)),
            )
            .flow(PlayerActions::new(["pick"]).into())
            .build()
            .unwrap();
        game.start().unwrap();
        let before = game.flow_json().unwrap();

        let err = game
            .process_move(&Move::new(PlayerId::new(0), "pick").with_arg("n", 9_i64))
            .unwrap_err();
        assert!(matches!(err.as_move_error(), Some(MoveError::Structural(_))));
        assert_eq!(game.flow_json().unwrap(), before);
    }

    #[test]
    fn test_step_messages_reach_the_log() {
        let mut game = counter()
            .flow(Flow::step(|ctx: &mut StepContext<'_, i64>| {
                ctx.message("hello");
                FlowControl::Complete
            }))
            .build()
            .unwrap();
        game.start().unwrap();

        assert_eq!(game.take_messages(), vec!["hello".to_string()]);
        assert!(game.messages().is_empty());
    }
}
