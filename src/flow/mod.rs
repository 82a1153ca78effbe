//! Resumable turn flow.
//!
//! ## Key Types
//!
//! - `Flow`: declarative tree games build their turn structure from
//! - `FlowProgram`: the tree compiled into an arena, plus named subflows
//! - `FlowState`: the live stack of frames, persisted as `BranchStack`s
//! - `FlowControl`: what a step or move asks the interpreter to do next
//!
//! The program is static and rebuilt from game code on every request; only
//! `FlowState` is saved between requests.

pub mod builder;
pub mod control;
pub mod interpreter;
pub mod position;
pub mod program;

pub use builder::{
    Case, EachPlayer, Flow, ForEach, IfElse, Loop, PlayerActions, ScopeFn, StepFn, Switch,
};
pub use control::{FlowControl, FlowScope, StepContext};
pub use interpreter::{ActionRequest, AllowedActions, Branch, FlowState, Frame};
pub use position::{
    ActionPosition, BranchJson, BranchStack, FlowKind, ForEachPosition, LoopPosition, Position,
    SequencePosition, SwitchPosition, EXHAUSTED,
};
pub use program::{FlowProgram, NodeId, MAIN};
