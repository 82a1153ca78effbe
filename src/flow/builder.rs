//! Declarative flow programs.
//!
//! Games describe their turn structure as a tree of [`Flow`] values:
//!
//! ```
//! use rust_turnflow::flow::{EachPlayer, Flow, Loop, PlayerActions};
//!
//! struct Pile {
//!     tokens: i64,
//! }
//!
//! let main: Flow<Pile> = Loop::<Pile>::repeat_while(
//!     |scope| scope.game.tokens > 0,
//!     EachPlayer::new("turn", PlayerActions::new(["take"])),
//! )
//! .into();
//! # let _ = main;
//! ```
//!
//! The tree is compiled once into a [`FlowProgram`](super::FlowProgram);
//! nothing here holds live state.

use crate::core::{Argument, PlayerId};

use super::control::{FlowControl, FlowScope, StepContext};

/// Plain step: game code run for its side effects.
pub type StepFn<G> = Box<dyn Fn(&mut StepContext<'_, G>) -> FlowControl>;

/// Evaluation against the current scope.
pub type ScopeFn<G, T> = Box<dyn Fn(&FlowScope<'_, G>) -> T>;

/// One node of a flow tree.
pub enum Flow<G> {
    Step(StepFn<G>),
    Sequence(Vec<Flow<G>>),
    Loop(Loop<G>),
    ForEach(ForEach<G>),
    EachPlayer(EachPlayer<G>),
    Switch(Switch<G>),
    Actions(PlayerActions<G>),
}

impl<G: 'static> Flow<G> {
    /// A plain step. Return `()` to carry on or a [`FlowControl`] to jump.
    pub fn step<R: Into<FlowControl>>(
        f: impl Fn(&mut StepContext<'_, G>) -> R + 'static,
    ) -> Self {
        Flow::Step(Box::new(move |ctx: &mut StepContext<'_, G>| f(ctx).into()))
    }

    /// Run the given blocks in order.
    #[must_use]
    pub fn sequence(steps: Vec<Flow<G>>) -> Self {
        Flow::Sequence(steps)
    }
}

impl<G> From<Vec<Flow<G>>> for Flow<G> {
    fn from(steps: Vec<Flow<G>>) -> Self {
        Flow::Sequence(steps)
    }
}

pub(crate) enum LoopKind<G> {
    Forever,
    While(ScopeFn<G, bool>),
    For {
        initial: ScopeFn<G, i64>,
        next: Box<dyn Fn(i64) -> i64>,
        condition: Box<dyn Fn(&FlowScope<'_, G>, i64) -> bool>,
    },
}

/// Repeats its body until a condition fails or a step breaks out.
pub struct Loop<G> {
    pub(crate) name: Option<String>,
    pub(crate) kind: LoopKind<G>,
    pub(crate) body: Box<Flow<G>>,
}

impl<G> Loop<G> {
    /// Loop until broken out of.
    pub fn forever(body: impl Into<Flow<G>>) -> Self {
        Self {
            name: None,
            kind: LoopKind::Forever,
            body: Box::new(body.into()),
        }
    }

    /// Loop while `condition` holds, checked before every iteration.
    pub fn repeat_while(
        condition: impl Fn(&FlowScope<'_, G>) -> bool + 'static,
        body: impl Into<Flow<G>>,
    ) -> Self {
        Self {
            name: None,
            kind: LoopKind::While(Box::new(condition)),
            body: Box::new(body.into()),
        }
    }

    /// Counting loop: `initial`, then `next` after each iteration, while
    /// `condition` holds for the value.
    pub fn for_loop(
        initial: impl Fn(&FlowScope<'_, G>) -> i64 + 'static,
        next: impl Fn(i64) -> i64 + 'static,
        condition: impl Fn(&FlowScope<'_, G>, i64) -> bool + 'static,
        body: impl Into<Flow<G>>,
    ) -> Self {
        Self {
            name: None,
            kind: LoopKind::For {
                initial: Box::new(initial),
                next: Box::new(next),
                condition: Box::new(condition),
            },
            body: Box::new(body.into()),
        }
    }

    /// Name the loop. Its value is bound under this name, and loop signals
    /// can target it.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Runs its body once per element of a collection.
pub struct ForEach<G> {
    pub(crate) name: String,
    pub(crate) collection: ScopeFn<G, Vec<Argument>>,
    pub(crate) body: Box<Flow<G>>,
}

impl<G> ForEach<G> {
    /// The collection is evaluated once, on entry. The current element is
    /// bound under `name`.
    pub fn new(
        name: impl Into<String>,
        collection: impl Fn(&FlowScope<'_, G>) -> Vec<Argument> + 'static,
        body: impl Into<Flow<G>>,
    ) -> Self {
        Self {
            name: name.into(),
            collection: Box::new(collection),
            body: Box::new(body.into()),
        }
    }
}

/// Runs its body once per player, making each the current player in turn.
pub struct EachPlayer<G> {
    pub(crate) name: String,
    pub(crate) starting: Option<ScopeFn<G, PlayerId>>,
    pub(crate) body: Box<Flow<G>>,
}

impl<G> EachPlayer<G> {
    pub fn new(name: impl Into<String>, body: impl Into<Flow<G>>) -> Self {
        Self {
            name: name.into(),
            starting: None,
            body: Box::new(body.into()),
        }
    }

    /// Start from this player instead of the first seat, wrapping around.
    #[must_use]
    pub fn starting_with(mut self, f: impl Fn(&FlowScope<'_, G>) -> PlayerId + 'static) -> Self {
        self.starting = Some(Box::new(f));
        self
    }
}

/// How a switch case matches the evaluated value.
pub enum Case {
    Eq(Argument),
    Test(Box<dyn Fn(&Argument) -> bool>),
}

impl Case {
    pub(crate) fn matches(&self, value: &Argument) -> bool {
        match self {
            Case::Eq(expected) => expected == value,
            Case::Test(f) => f(value),
        }
    }
}

/// Runs the block of the first matching case, or the default.
pub struct Switch<G> {
    pub(crate) name: Option<String>,
    pub(crate) value: ScopeFn<G, Argument>,
    pub(crate) cases: Vec<(Case, Flow<G>)>,
    pub(crate) default: Option<Box<Flow<G>>>,
}

impl<G> Switch<G> {
    pub fn new(value: impl Fn(&FlowScope<'_, G>) -> Argument + 'static) -> Self {
        Self {
            name: None,
            value: Box::new(value),
            cases: Vec::new(),
            default: None,
        }
    }

    /// Case matched by equality.
    #[must_use]
    pub fn case(mut self, value: impl Into<Argument>, block: impl Into<Flow<G>>) -> Self {
        self.cases.push((Case::Eq(value.into()), block.into()));
        self
    }

    /// Case matched by predicate.
    #[must_use]
    pub fn case_when(
        mut self,
        test: impl Fn(&Argument) -> bool + 'static,
        block: impl Into<Flow<G>>,
    ) -> Self {
        self.cases.push((Case::Test(Box::new(test)), block.into()));
        self
    }

    #[must_use]
    pub fn default(mut self, block: impl Into<Flow<G>>) -> Self {
        self.default = Some(Box::new(block.into()));
        self
    }

    /// Name the switch; its value is bound under this name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Two-way switch on a condition.
pub struct IfElse<G> {
    condition: ScopeFn<G, bool>,
    then: Flow<G>,
    otherwise: Option<Flow<G>>,
}

impl<G> IfElse<G> {
    pub fn new(
        condition: impl Fn(&FlowScope<'_, G>) -> bool + 'static,
        then: impl Into<Flow<G>>,
    ) -> Self {
        Self {
            condition: Box::new(condition),
            then: then.into(),
            otherwise: None,
        }
    }

    #[must_use]
    pub fn otherwise(mut self, block: impl Into<Flow<G>>) -> Self {
        self.otherwise = Some(block.into());
        self
    }
}

impl<G: 'static> From<IfElse<G>> for Switch<G> {
    fn from(if_else: IfElse<G>) -> Self {
        let condition = if_else.condition;
        let switch =
            Switch::new(move |scope| Argument::Bool(condition(scope))).case(true, if_else.then);
        match if_else.otherwise {
            Some(block) => switch.default(block),
            None => switch,
        }
    }
}

/// One action offered by an action step.
pub struct ActionChoice<G> {
    pub(crate) name: String,
    pub(crate) followup: Option<Flow<G>>,
}

/// Waits for a player to take one of the listed actions.
pub struct PlayerActions<G> {
    pub(crate) name: Option<String>,
    pub(crate) actions: Vec<ActionChoice<G>>,
    pub(crate) players: Option<ScopeFn<G, Vec<PlayerId>>>,
    pub(crate) prompt: Option<String>,
    pub(crate) every_player: bool,
}

impl<G> PlayerActions<G> {
    pub fn new<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            actions: actions
                .into_iter()
                .map(|name| ActionChoice {
                    name: name.into(),
                    followup: None,
                })
                .collect(),
            players: None,
            prompt: None,
            every_player: false,
        }
    }

    /// Offer another action, running `followup` after it is taken.
    #[must_use]
    pub fn action_then(mut self, name: impl Into<String>, followup: impl Into<Flow<G>>) -> Self {
        self.actions.push(ActionChoice {
            name: name.into(),
            followup: Some(followup.into()),
        });
        self
    }

    /// Who may act. Defaults to the current players.
    #[must_use]
    pub fn players(mut self, f: impl Fn(&FlowScope<'_, G>) -> Vec<PlayerId> + 'static) -> Self {
        self.players = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Require one move from each eligible player before moving on.
    #[must_use]
    pub fn every_player(mut self) -> Self {
        self.every_player = true;
        self
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<G> From<Loop<G>> for Flow<G> {
    fn from(node: Loop<G>) -> Self {
        Flow::Loop(node)
    }
}

impl<G> From<ForEach<G>> for Flow<G> {
    fn from(node: ForEach<G>) -> Self {
        Flow::ForEach(node)
    }
}

impl<G> From<EachPlayer<G>> for Flow<G> {
    fn from(node: EachPlayer<G>) -> Self {
        Flow::EachPlayer(node)
    }
}

impl<G> From<Switch<G>> for Flow<G> {
    fn from(node: Switch<G>) -> Self {
        Flow::Switch(node)
    }
}

impl<G: 'static> From<IfElse<G>> for Flow<G> {
    fn from(node: IfElse<G>) -> Self {
        Flow::Switch(node.into())
    }
}

impl<G> From<PlayerActions<G>> for Flow<G> {
    fn from(node: PlayerActions<G>) -> Self {
        Flow::Actions(node)
    }
}
