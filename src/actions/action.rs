//! Actions and the move resolver.
//!
//! An [`Action`] is an ordered list of [`Selection`]s followed by effects
//! (move callbacks and message templates). The resolver explores the
//! selections depth-first to find what a player still has to decide:
//!
//! ```text
//! pending_moves(args):
//!     S = first selection missing from args      none left => []
//!     S not possible                             => dead end
//!     S unbounded (text, button, huge range)     => [S]
//!     for each candidate c of S:
//!         validation(S = c) fails                => prune c
//!         pending_moves(args + S = c) dead end   => prune c
//!     nothing survived                           => dead end
//!     some pruned                                => narrow S to survivors
//!     skip rule allows collapsing S              => children's moves
//!     otherwise                                  => [S]
//! ```
//!
//! Collapsing is what makes forced choices disappear: a selection with a
//! single viable value is filled in silently and the player sees the next
//! real decision instead.
//!
//! `process` re-checks a submitted argument map, fills anything that is now
//! forced, and runs the effects in declared order.

use std::fmt::Write as _;

use tracing::{trace, warn};

use super::pending::PendingMove;
use super::selection::{ArgContext, ResolvedSelection, Selection, SelectionKind, SkipPolicy};
use crate::core::{Args, Argument, GameRng, MoveError, PlayerId};
use crate::flow::FlowControl;

/// Move callback. An `Err` aborts the remaining effects.
pub type MoveFn<G> = Box<dyn Fn(&mut MoveContext<'_, G>) -> Result<(), String>>;

/// Whether a player may take the action at all.
pub type ConditionFn<G> = Box<dyn Fn(&G, PlayerId) -> bool>;

enum Effect<G> {
    Move(MoveFn<G>),
    Message(String),
}

/// What a move callback sees.
pub struct MoveContext<'a, G> {
    pub game: &'a mut G,
    pub player: PlayerId,
    pub args: &'a Args,
    pub rng: &'a mut GameRng,
    control: FlowControl,
}

impl<G> MoveContext<'_, G> {
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Argument::as_number)
    }

    /// Raise a loop signal or subflow jump, applied once the move finishes.
    /// A later call replaces an earlier one.
    pub fn signal(&mut self, control: FlowControl) {
        self.control = control;
    }
}

/// Result of a successfully processed move.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessOutcome {
    /// Final arguments, forced values included.
    pub args: Args,
    /// Rendered message templates, in effect order.
    pub messages: Vec<String>,
    /// Flow request raised by a move callback.
    pub control: FlowControl,
}

/// A player-invokable operation.
///
/// ```
/// use rust_turnflow::actions::{Action, Selection};
///
/// struct Counter {
///     total: i64,
/// }
///
/// let add = Action::<Counter>::new()
///     .prompt("Add")
///     .select(Selection::number("n").min(1).max(3))
///     .perform(|ctx| {
///         ctx.game.total += ctx.number("n").unwrap_or(0);
///         Ok(())
///     })
///     .message("{{player}} added {{n}}");
/// assert_eq!(add.selections().len(), 1);
/// ```
pub struct Action<G> {
    prompt: Option<String>,
    condition: Option<ConditionFn<G>>,
    selections: Vec<Selection<G>>,
    effects: Vec<Effect<G>>,
}

impl<G> Default for Action<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Candidates of one selection after exploring each of them.
struct Branches {
    viable: Vec<Argument>,
    moves: Vec<PendingMove>,
    pruned: bool,
    complete: bool,
}

impl<G> Action<G> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prompt: None,
            condition: None,
            selections: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Button text / description (builder pattern).
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Restrict who may take the action (builder pattern).
    #[must_use]
    pub fn condition(mut self, f: impl Fn(&G, PlayerId) -> bool + 'static) -> Self {
        self.condition = Some(Box::new(f));
        self
    }

    /// Append a selection.
    ///
    /// # Panics
    ///
    /// Panics if a selection of the same name exists or an effect was
    /// already declared.
    #[must_use]
    pub fn select(mut self, selection: Selection<G>) -> Self {
        assert!(
            self.effects.is_empty(),
            "selection `{}` declared after an effect",
            selection.name()
        );
        assert!(
            self.selection(selection.name()).is_none(),
            "duplicate selection `{}`",
            selection.name()
        );
        self.selections.push(selection);
        self
    }

    /// Present the named selections together.
    ///
    /// # Panics
    ///
    /// Panics if a name is not a declared selection.
    #[must_use]
    pub fn combine(mut self, names: &[&str]) -> Self {
        for name in names {
            assert!(
                self.selection(name).is_some(),
                "cannot combine unknown selection `{name}`"
            );
        }
        for selection in &mut self.selections {
            if !names.contains(&selection.name()) {
                continue;
            }
            let own = selection.name().to_string();
            for name in names.iter().filter(|n| **n != own) {
                if !selection.combine_with.iter().any(|c| c == *name) {
                    selection.combine_with.push((*name).to_string());
                }
            }
        }
        self
    }

    /// Append a move callback.
    #[must_use]
    pub fn perform(
        mut self,
        f: impl Fn(&mut MoveContext<'_, G>) -> Result<(), String> + 'static,
    ) -> Self {
        self.effects.push(Effect::Move(Box::new(f)));
        self
    }

    /// Append a message template. `{{name}}` is replaced by the argument of
    /// that name and `{{player}}` by the acting player.
    #[must_use]
    pub fn message(mut self, template: impl Into<String>) -> Self {
        self.effects.push(Effect::Message(template.into()));
        self
    }

    #[must_use]
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    #[must_use]
    pub fn selections(&self) -> &[Selection<G>] {
        &self.selections
    }

    #[must_use]
    pub fn selection(&self, name: &str) -> Option<&Selection<G>> {
        self.selections.iter().find(|s| s.name() == name)
    }

    /// The action's own condition, ignoring its selections.
    #[must_use]
    pub fn is_allowed(&self, game: &G, player: PlayerId) -> bool {
        self.condition.as_ref().map_or(true, |f| f(game, player))
    }

    /// True when the player could complete this action from scratch.
    #[must_use]
    pub fn is_possible(&self, game: &G, player: PlayerId) -> bool {
        self.is_allowed(game, player) && self.explore("", game, player, &Args::new()).is_some()
    }

    /// Every selection still to be decided, given `args`.
    ///
    /// `None` means no completion exists. An empty list means `args` is
    /// already complete.
    #[must_use]
    pub fn get_pending_moves(
        &self,
        name: &str,
        game: &G,
        player: PlayerId,
        args: &Args,
    ) -> Option<Vec<PendingMove>> {
        if !self.is_allowed(game, player) {
            return None;
        }
        let moves = self.explore(name, game, player, args)?;
        Some(
            moves
                .into_iter()
                .map(|pending| self.combine_pending(pending, game, player))
                .collect(),
        )
    }

    fn next_missing(&self, args: &Args) -> Option<&Selection<G>> {
        self.selections.iter().find(|s| !args.contains_key(s.name()))
    }

    fn explore(
        &self,
        name: &str,
        game: &G,
        player: PlayerId,
        args: &Args,
    ) -> Option<Vec<PendingMove>> {
        let Some(template) = self.next_missing(args) else {
            return Some(Vec::new());
        };
        let mut selection = template.resolve(&ArgContext::new(game, player, args));
        if !selection.is_possible() {
            trace!(action = name, selection = %selection.name, "selection impossible");
            return None;
        }

        let Some(candidates) = enumerable(&selection) else {
            return Some(vec![PendingMove::new(name, args.clone(), selection)]);
        };

        let branches = self.branches(name, template, &selection, candidates, game, player, args)?;
        if branches.pruned && !selection.is_multi() {
            selection.override_options(branches.viable.clone());
        }

        let collapse = match selection.skip_if {
            SkipPolicy::Always => !branches.complete,
            SkipPolicy::OnlyOne => {
                branches.viable.len() == 1
                    && !(branches.complete && selection.kind == SelectionKind::Board)
            }
            SkipPolicy::Never => false,
        };

        if collapse {
            Some(branches.moves)
        } else {
            Some(vec![PendingMove::new(name, args.clone(), selection)])
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn branches(
        &self,
        name: &str,
        template: &Selection<G>,
        selection: &ResolvedSelection,
        candidates: Vec<Argument>,
        game: &G,
        player: PlayerId,
        args: &Args,
    ) -> Option<Branches> {
        let mut branches = Branches {
            viable: Vec::new(),
            moves: Vec::new(),
            pruned: false,
            complete: false,
        };

        for candidate in candidates {
            let next = args.update(selection.name.clone(), candidate.clone());
            if !selection.is_multi()
                && template.check(&ArgContext::new(game, player, &next)).is_err()
            {
                branches.pruned = true;
                continue;
            }
            match self.explore(name, game, player, &next) {
                Some(moves) => {
                    branches.complete |= moves.is_empty();
                    branches.viable.push(candidate);
                    branches.moves.extend(moves);
                }
                None => branches.pruned = true,
            }
        }

        (!branches.viable.is_empty()).then_some(branches)
    }

    /// Extend a pending move with the selections combined with its last one.
    fn combine_pending(&self, mut pending: PendingMove, game: &G, player: PlayerId) -> PendingMove {
        let mut args = pending.args.clone();
        loop {
            let Some(last) = pending.selections.last() else {
                break;
            };
            if last.combine_with.is_empty() {
                break;
            }
            if let Some(value) = last.is_forced() {
                args.insert(last.name.clone(), value);
            }
            let Some(position) = self.selections.iter().position(|s| s.name() == last.name) else {
                break;
            };
            let Some(next) = self.selections[position + 1..]
                .iter()
                .find(|s| !args.contains_key(s.name()))
            else {
                break;
            };
            if !last.combine_with.iter().any(|c| c == next.name()) {
                break;
            }
            let resolved = next.resolve(&ArgContext::new(game, player, &args));
            pending.selections.push(resolved);
        }
        pending
    }

    /// Fill every selection that has become forced.
    fn fill_forced(&self, game: &G, player: PlayerId, args: &Args) -> Args {
        let mut args = args.clone();
        while let Some(template) = self.next_missing(&args) {
            let mut selection = template.resolve(&ArgContext::new(game, player, &args));
            if !selection.is_possible() {
                break;
            }
            if let Some(candidates) = enumerable(&selection) {
                let Some(branches) =
                    self.branches("", template, &selection, candidates, game, player, &args)
                else {
                    break;
                };
                if branches.pruned && !selection.is_multi() {
                    selection.override_options(branches.viable);
                }
            }
            match selection.is_forced() {
                Some(value) => {
                    args.insert(selection.name, value);
                }
                None => break,
            }
        }
        args
    }

    /// Validate `args` and run the effects.
    ///
    /// Nothing changes on error, except when a move callback fails: effects
    /// before it have already run.
    pub fn process(
        &self,
        game: &mut G,
        player: PlayerId,
        args: &Args,
        rng: &mut GameRng,
    ) -> Result<ProcessOutcome, MoveError> {
        if !self.is_allowed(game, player) {
            return Err(MoveError::structural("this action is not available"));
        }
        if let Some(unknown) = args.keys().find(|k| self.selection(k).is_none()) {
            return Err(MoveError::structural(format!("unknown selection `{unknown}`")));
        }

        for template in &self.selections {
            let Some(value) = args.get(template.name()) else {
                continue;
            };
            let ctx = ArgContext::new(&*game, player, args);
            template
                .resolve(&ctx)
                .validate(value)
                .map_err(MoveError::Structural)?;
            template.check(&ctx).map_err(MoveError::Validation)?;
        }

        let args = self.fill_forced(game, player, args);
        match self.explore("", game, player, &args) {
            None => {
                return Err(MoveError::structural(
                    "these choices cannot lead to a legal move",
                ))
            }
            Some(pending) if !pending.is_empty() => return Err(MoveError::Incomplete),
            Some(_) => {}
        }

        self.execute(game, player, args, rng)
    }

    fn execute(
        &self,
        game: &mut G,
        player: PlayerId,
        args: Args,
        rng: &mut GameRng,
    ) -> Result<ProcessOutcome, MoveError> {
        let mut messages = Vec::new();
        let mut ctx = MoveContext {
            game,
            player,
            args: &args,
            rng,
            control: FlowControl::Complete,
        };

        for effect in &self.effects {
            match effect {
                Effect::Move(f) => {
                    if let Err(e) = f(&mut ctx) {
                        warn!(%player, error = %e, "move callback failed");
                        return Err(MoveError::Effect(e));
                    }
                }
                Effect::Message(template) => messages.push(render(template, &args, player)),
            }
        }

        let control = ctx.control;
        Ok(ProcessOutcome {
            args,
            messages,
            control,
        })
    }
}

/// Candidate values worth exploring, or `None` when the selection must be
/// shown as-is.
fn enumerable(selection: &ResolvedSelection) -> Option<Vec<Argument>> {
    if selection.is_unbounded() {
        return None;
    }
    if selection.is_multi() {
        return selection.is_forced().map(|forced| vec![forced]);
    }
    Some(selection.options())
}

/// Substitute `{{name}}` and `{{player}}` placeholders.
fn render(template: &str, args: &Args, player: PlayerId) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        if key == "player" {
            let _ = write!(out, "{player}");
        } else if let Some(value) = args.get(key) {
            let _ = write!(out, "{value}");
        } else {
            out.push_str(&rest[start..start + 2 + end + 2]);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
