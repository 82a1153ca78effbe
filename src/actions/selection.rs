//! Selections: one unit of player choice within an action.
//!
//! A `Selection<G>` is a declare-time template. Any of its fields may be a
//! function of the game and the arguments chosen so far; `resolve` evaluates
//! them all against one concrete argument map and returns a
//! [`ResolvedSelection`], which is plain serializable data.
//!
//! ## Kinds
//!
//! - `number`: integer in `[min, max]` (`min` defaults to 1)
//! - `choices`: one of an explicit list
//! - `board`: one entity from a candidate list, or several when `min`/`max`
//!   are set (multi-select)
//! - `text`: free string
//! - `button`: a single fixed value, used for explicit confirmation

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::core::{Args, Argument, EntityId, PlayerId};

/// Number ranges wider than this are not enumerated.
pub const MAX_ENUMERABLE_RANGE: i64 = 1000;

/// What a computed field gets to look at.
pub struct ArgContext<'a, G> {
    pub game: &'a G,
    pub player: PlayerId,
    pub args: &'a Args,
}

impl<'a, G> ArgContext<'a, G> {
    #[must_use]
    pub fn new(game: &'a G, player: PlayerId, args: &'a Args) -> Self {
        Self { game, player, args }
    }

    /// Argument chosen for an earlier selection.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Argument> {
        self.args.get(name)
    }

    /// Numeric argument chosen for an earlier selection.
    #[must_use]
    pub fn number(&self, name: &str) -> Option<i64> {
        self.arg(name).and_then(Argument::as_number)
    }
}

/// A selection field: fixed at declare time or computed from prior args.
pub enum Field<G, T> {
    Literal(T),
    Computed(Box<dyn Fn(&ArgContext<'_, G>) -> T>),
}

impl<G, T: Clone> Field<G, T> {
    pub fn computed(f: impl Fn(&ArgContext<'_, G>) -> T + 'static) -> Self {
        Field::Computed(Box::new(f))
    }

    /// Evaluate against a concrete context.
    pub fn eval(&self, ctx: &ArgContext<'_, G>) -> T {
        match self {
            Field::Literal(value) => value.clone(),
            Field::Computed(f) => f(ctx),
        }
    }

    #[must_use]
    pub fn is_computed(&self) -> bool {
        matches!(self, Field::Computed(_))
    }
}

/// Selection kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionKind {
    Board,
    Choices,
    Text,
    Number,
    Button,
}

/// When a selection may be collapsed instead of shown.
pub enum SkipIf<G> {
    /// Always show it.
    Never,
    /// Show the follow-up choices instead whenever that yields something.
    Always,
    /// Collapse it when exactly one value can lead anywhere.
    OnlyOne,
    /// Decide per argument map: true behaves like `Always`, false like `Never`.
    When(Box<dyn Fn(&ArgContext<'_, G>) -> bool>),
}

impl<G> Default for SkipIf<G> {
    fn default() -> Self {
        SkipIf::OnlyOne
    }
}

impl<G> SkipIf<G> {
    pub fn when(f: impl Fn(&ArgContext<'_, G>) -> bool + 'static) -> Self {
        SkipIf::When(Box::new(f))
    }

    fn resolve(&self, ctx: &ArgContext<'_, G>) -> SkipPolicy {
        match self {
            SkipIf::Never => SkipPolicy::Never,
            SkipIf::Always => SkipPolicy::Always,
            SkipIf::OnlyOne => SkipPolicy::OnlyOne,
            SkipIf::When(f) if f(ctx) => SkipPolicy::Always,
            SkipIf::When(_) => SkipPolicy::Never,
        }
    }
}

/// Skip rule after evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipPolicy {
    Never,
    Always,
    OnlyOne,
}

/// One entry of a `choices` selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub value: Argument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Choice {
    #[must_use]
    pub fn new(value: impl Into<Argument>) -> Self {
        Self {
            value: value.into(),
            label: None,
        }
    }

    #[must_use]
    pub fn labeled(value: impl Into<Argument>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: Some(label.into()),
        }
    }
}

type ValidateFn<G> = Box<dyn Fn(&ArgContext<'_, G>) -> Result<(), String>>;

/// Declare-time selection template.
pub struct Selection<G> {
    name: String,
    kind: SelectionKind,
    prompt: Option<Field<G, String>>,
    choices: Option<Field<G, Vec<Choice>>>,
    candidates: Option<Field<G, Vec<EntityId>>>,
    min: Option<Field<G, i64>>,
    max: Option<Field<G, i64>>,
    multi: bool,
    value: Argument,
    skip_if: SkipIf<G>,
    confirm: Option<Field<G, String>>,
    validation: Option<ValidateFn<G>>,
    client_context: Option<serde_json::Value>,
    pub(crate) combine_with: Vec<String>,
}

impl<G> Selection<G> {
    fn new(name: impl Into<String>, kind: SelectionKind) -> Self {
        Self {
            name: name.into(),
            kind,
            prompt: None,
            choices: None,
            candidates: None,
            min: None,
            max: None,
            multi: false,
            value: Argument::Bool(true),
            skip_if: SkipIf::default(),
            confirm: None,
            validation: None,
            client_context: None,
            combine_with: Vec::new(),
        }
    }

    /// Integer selection; bound it with `min`/`max`.
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, SelectionKind::Number)
    }

    /// Pick one of a fixed list of values.
    pub fn choices<T: Into<Argument>>(name: impl Into<String>, values: Vec<T>) -> Self {
        let choices = values.into_iter().map(Choice::new).collect();
        let mut selection = Self::new(name, SelectionKind::Choices);
        selection.choices = Some(Field::Literal(choices));
        selection
    }

    /// Pick one of a list computed from prior args.
    pub fn choices_with(
        name: impl Into<String>,
        f: impl Fn(&ArgContext<'_, G>) -> Vec<Choice> + 'static,
    ) -> Self {
        let mut selection = Self::new(name, SelectionKind::Choices);
        selection.choices = Some(Field::computed(f));
        selection
    }

    /// Pick from fixed board entities.
    pub fn board(name: impl Into<String>, candidates: Vec<EntityId>) -> Self {
        let mut selection = Self::new(name, SelectionKind::Board);
        selection.candidates = Some(Field::Literal(candidates));
        selection
    }

    /// Pick from board entities computed from the game and prior args.
    pub fn board_with(
        name: impl Into<String>,
        f: impl Fn(&ArgContext<'_, G>) -> Vec<EntityId> + 'static,
    ) -> Self {
        let mut selection = Self::new(name, SelectionKind::Board);
        selection.candidates = Some(Field::computed(f));
        selection
    }

    /// Free text.
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, SelectionKind::Text)
    }

    /// Confirmation button; its value is `true` unless set with `value`.
    pub fn button(name: impl Into<String>) -> Self {
        Self::new(name, SelectionKind::Button)
    }

    /// Set the prompt (builder pattern).
    #[must_use]
    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(Field::Literal(prompt.into()));
        self
    }

    #[must_use]
    pub fn prompt_with(mut self, f: impl Fn(&ArgContext<'_, G>) -> String + 'static) -> Self {
        self.prompt = Some(Field::computed(f));
        self
    }

    /// Lower bound: the number itself, or the count for board selections.
    #[must_use]
    pub fn min(mut self, min: i64) -> Self {
        self.set_min(Field::Literal(min));
        self
    }

    #[must_use]
    pub fn min_with(mut self, f: impl Fn(&ArgContext<'_, G>) -> i64 + 'static) -> Self {
        self.set_min(Field::computed(f));
        self
    }

    /// Upper bound: the number itself, or the count for board selections.
    #[must_use]
    pub fn max(mut self, max: i64) -> Self {
        self.set_max(Field::Literal(max));
        self
    }

    #[must_use]
    pub fn max_with(mut self, f: impl Fn(&ArgContext<'_, G>) -> i64 + 'static) -> Self {
        self.set_max(Field::computed(f));
        self
    }

    /// Board multi-select of exactly `n` entities.
    #[must_use]
    pub fn count(self, n: i64) -> Self {
        self.min(n).max(n)
    }

    fn set_min(&mut self, min: Field<G, i64>) {
        self.multi |= self.kind == SelectionKind::Board;
        self.min = Some(min);
    }

    fn set_max(&mut self, max: Field<G, i64>) {
        self.multi |= self.kind == SelectionKind::Board;
        self.max = Some(max);
    }

    /// Button value (builder pattern).
    #[must_use]
    pub fn value(mut self, value: impl Into<Argument>) -> Self {
        self.value = value.into();
        self
    }

    /// Skip rule (builder pattern). Defaults to `SkipIf::OnlyOne`.
    #[must_use]
    pub fn skip_if(mut self, skip_if: SkipIf<G>) -> Self {
        self.skip_if = skip_if;
        self
    }

    /// Ask for confirmation with this text before submitting.
    #[must_use]
    pub fn confirm(mut self, text: impl Into<String>) -> Self {
        self.confirm = Some(Field::Literal(text.into()));
        self
    }

    /// Business-rule check. Runs with this selection's value already in
    /// `ctx.args`; an `Err` message is shown to the player.
    #[must_use]
    pub fn validate(
        mut self,
        f: impl Fn(&ArgContext<'_, G>) -> Result<(), String> + 'static,
    ) -> Self {
        self.validation = Some(Box::new(f));
        self
    }

    /// Opaque hints passed through to the client.
    #[must_use]
    pub fn client_context(mut self, context: serde_json::Value) -> Self {
        self.client_context = Some(context);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> SelectionKind {
        self.kind
    }

    /// True while any field still depends on prior args.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        let computed = |f: &Option<Field<G, i64>>| f.as_ref().is_some_and(Field::is_computed);
        computed(&self.min)
            || computed(&self.max)
            || self.prompt.as_ref().is_some_and(Field::is_computed)
            || self.choices.as_ref().is_some_and(Field::is_computed)
            || self.candidates.as_ref().is_some_and(Field::is_computed)
            || self.confirm.as_ref().is_some_and(Field::is_computed)
            || matches!(self.skip_if, SkipIf::When(_))
    }

    /// Evaluate every field against `ctx`.
    pub fn resolve(&self, ctx: &ArgContext<'_, G>) -> ResolvedSelection {
        let min = self.min.as_ref().map(|f| f.eval(ctx));
        let max = self.max.as_ref().map(|f| f.eval(ctx));
        let (min, max) = match self.kind {
            SelectionKind::Number => (Some(min.unwrap_or(1)), max),
            SelectionKind::Board if self.multi => (Some(min.unwrap_or(1)), max),
            _ => (None, None),
        };

        ResolvedSelection {
            name: self.name.clone(),
            kind: self.kind,
            prompt: self.prompt.as_ref().map(|f| f.eval(ctx)),
            choices: self.choices.as_ref().map(|f| f.eval(ctx)).unwrap_or_default(),
            candidates: self.candidates.as_ref().map(|f| f.eval(ctx)).unwrap_or_default(),
            min,
            max,
            multi: self.multi,
            value: (self.kind == SelectionKind::Button).then(|| self.value.clone()),
            skip_if: self.skip_if.resolve(ctx),
            confirm: self.confirm.as_ref().map(|f| f.eval(ctx)),
            client_context: self.client_context.clone(),
            combine_with: self.combine_with.clone(),
            overrides: None,
        }
    }

    /// Run the business-rule validation, if any.
    pub fn check(&self, ctx: &ArgContext<'_, G>) -> Result<(), String> {
        match &self.validation {
            Some(f) => f(ctx),
            None => Ok(()),
        }
    }
}

/// A selection with every field evaluated. This is what clients receive.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSelection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SelectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default)]
    pub multi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Argument>,
    pub skip_if: SkipPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combine_with: Vec<String>,
    /// Narrowed candidate set once impossible branches were pruned.
    #[serde(default, rename = "options", skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Vec<Argument>>,
}

impl ResolvedSelection {
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.multi
    }

    fn min_value(&self) -> i64 {
        self.min.unwrap_or(1)
    }

    /// Text and buttons, and number ranges without a usable upper bound.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        match self.kind {
            SelectionKind::Text | SelectionKind::Button => true,
            SelectionKind::Number => self
                .max
                .map_or(true, |max| max.saturating_sub(self.min_value()) > MAX_ENUMERABLE_RANGE),
            SelectionKind::Board | SelectionKind::Choices => false,
        }
    }

    /// Distinct candidate values in declared order, narrowed by
    /// `override_options` when it was called.
    #[must_use]
    pub fn options(&self) -> Vec<Argument> {
        if let Some(overrides) = &self.overrides {
            return overrides.clone();
        }
        let mut seen = FxHashSet::default();
        let options: Vec<Argument> = match self.kind {
            SelectionKind::Number if self.is_unbounded() => return Vec::new(),
            SelectionKind::Number => {
                let max = self.max.unwrap_or(self.min_value());
                return (self.min_value()..=max).map(Argument::Number).collect();
            }
            SelectionKind::Board => self.candidates.iter().copied().map(Argument::Entity).collect(),
            SelectionKind::Choices => self.choices.iter().map(|c| c.value.clone()).collect(),
            SelectionKind::Text | SelectionKind::Button => return Vec::new(),
        };
        options.into_iter().filter(|o| seen.insert(o.clone())).collect()
    }

    /// False when no value could possibly be submitted.
    #[must_use]
    pub fn is_possible(&self) -> bool {
        if self.overrides.as_ref().is_some_and(Vec::is_empty) {
            return false;
        }
        match self.kind {
            SelectionKind::Number => self.max.map_or(true, |max| self.min_value() <= max),
            SelectionKind::Choices => !self.choices.is_empty(),
            SelectionKind::Board if self.multi => {
                self.options().len() as i64 >= self.min_value()
                    && self.max.map_or(true, |max| self.min_value() <= max)
            }
            SelectionKind::Board => !self.candidates.is_empty(),
            SelectionKind::Text | SelectionKind::Button => true,
        }
    }

    /// The only value this selection can take, when the skip rule lets the
    /// engine choose it on the player's behalf.
    #[must_use]
    pub fn is_forced(&self) -> Option<Argument> {
        if self.skip_if == SkipPolicy::Never {
            return None;
        }
        match self.kind {
            SelectionKind::Board if self.multi => {
                let options = self.options();
                let n = options.len() as i64;
                (self.min == Some(n) && self.max == Some(n)).then(|| Argument::List(options))
            }
            SelectionKind::Board | SelectionKind::Number | SelectionKind::Choices => {
                let mut options = self.options();
                (options.len() == 1).then(|| options.remove(0))
            }
            SelectionKind::Text | SelectionKind::Button => None,
        }
    }

    /// Keep only the candidates that can still lead to a complete move.
    pub fn override_options(&mut self, options: Vec<Argument>) {
        self.overrides = Some(options);
    }

    /// Structural check of a submitted value.
    pub fn validate(&self, arg: &Argument) -> Result<(), String> {
        let name = &self.name;
        match self.kind {
            SelectionKind::Number => {
                let n = arg
                    .as_number()
                    .ok_or_else(|| format!("{name}: expected a number"))?;
                if n < self.min_value() {
                    return Err(format!("{name}: must be at least {}", self.min_value()));
                }
                if let Some(max) = self.max.filter(|max| n > *max) {
                    return Err(format!("{name}: must be at most {max}"));
                }
                self.check_overrides(arg)
            }
            SelectionKind::Choices => {
                if self.options().contains(arg) {
                    Ok(())
                } else {
                    Err(format!("{name}: `{arg}` is not one of the choices"))
                }
            }
            SelectionKind::Board if self.multi => self.validate_many(arg),
            SelectionKind::Board => match arg.as_entity() {
                Some(e) if self.candidates.contains(&e) => self.check_overrides(arg),
                Some(e) => Err(format!("{name}: {e} cannot be chosen")),
                None => Err(format!("{name}: expected a board element")),
            },
            SelectionKind::Text => match arg {
                Argument::String(_) => Ok(()),
                _ => Err(format!("{name}: expected text")),
            },
            SelectionKind::Button => {
                if self.value.as_ref() == Some(arg) {
                    Ok(())
                } else {
                    Err(format!("{name}: unexpected value `{arg}`"))
                }
            }
        }
    }

    fn validate_many(&self, arg: &Argument) -> Result<(), String> {
        let name = &self.name;
        let items = arg
            .as_list()
            .ok_or_else(|| format!("{name}: expected a list of board elements"))?;

        let mut seen = FxHashSet::default();
        for item in items {
            let entity = item
                .as_entity()
                .ok_or_else(|| format!("{name}: expected a list of board elements"))?;
            if !self.candidates.contains(&entity) {
                return Err(format!("{name}: {entity} cannot be chosen"));
            }
            if !seen.insert(entity) {
                return Err(format!("{name}: {entity} chosen twice"));
            }
        }

        let count = items.len() as i64;
        if count < self.min_value() {
            return Err(format!("{name}: choose at least {}", self.min_value()));
        }
        if let Some(max) = self.max.filter(|max| count > *max) {
            return Err(format!("{name}: choose at most {max}"));
        }
        Ok(())
    }

    fn check_overrides(&self, arg: &Argument) -> Result<(), String> {
        match &self.overrides {
            Some(options) if !options.contains(arg) => {
                Err(format!("{}: `{arg}` cannot lead to a legal move", self.name))
            }
            _ => Ok(()),
        }
    }
}
