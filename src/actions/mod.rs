//! Actions, selections and the move resolver.
//!
//! ## Key Types
//!
//! - `Selection`: declare-time template for one player choice
//! - `ResolvedSelection`: a selection evaluated against concrete args
//! - `Action`: ordered selections plus effects
//! - `PendingMove`: what a client must still decide
//! - `ActionRegistry`: actions by name

pub mod action;
pub mod pending;
pub mod registry;
pub mod selection;

pub use action::{Action, ConditionFn, MoveContext, MoveFn, ProcessOutcome};
pub use pending::PendingMove;
pub use registry::ActionRegistry;
pub use selection::{
    ArgContext, Choice, Field, ResolvedSelection, Selection, SelectionKind, SkipIf, SkipPolicy,
    MAX_ENUMERABLE_RANGE,
};
