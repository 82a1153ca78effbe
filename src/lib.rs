//! # rust-turnflow
//!
//! Choice resolution and resumable control flow for turn-based games.
//!
//! ## Design Principles
//!
//! 1. **Game-Agnostic**: The engine never looks inside the game's state.
//!    Every callback is generic over the game's own type `G`.
//!
//! 2. **N-Player First**: Players are opaque seats with a stable order.
//!    Nothing assumes two players or a single active player.
//!
//! 3. **Stateless Hosting**: The flow program is rebuilt from code on every
//!    request. Only positions, the game state and the RNG state are
//!    persisted, and together they rebuild the live game exactly.
//!
//! ## Architecture
//!
//! - **Speculative Resolution**: Actions explore their selections
//!   depth-first, pruning choices that cannot lead to a legal move and
//!   collapsing choices that have only one answer.
//!
//! - **Explicit Flow Stack**: The interpreter keeps the live path from the
//!   root to the active node as data, so it serializes as-is and loop
//!   signals walk it at run time.
//!
//! - **Persistent Data Structures**: Argument maps use `im-rs` so every
//!   resolver frame extends its own copy in O(1).
//!
//! ## Modules
//!
//! - `core`: Arguments, entity and player IDs, RNG, configuration, errors
//! - `actions`: Selections, actions and the move resolver
//! - `flow`: Flow builders, the compiled program and the interpreter
//! - `game`: The driver: builder, moves, snapshots
//! - `games`: Example games

pub mod core;
pub mod actions;
pub mod flow;
pub mod game;
pub mod games;

// Re-export commonly used types
pub use crate::core::{
    Args, Argument,
    EntityId, PlayerId, PlayerMap,
    GameRng, GameRngState,
    EngineConfig,
    FlowError, GameError, MoveError,
};

pub use crate::actions::{
    Action, ActionRegistry, ArgContext, Choice, MoveContext, PendingMove,
    ResolvedSelection, Selection, SelectionKind, SkipIf, SkipPolicy,
};

pub use crate::flow::{
    EachPlayer, Flow, FlowControl, FlowScope, ForEach, IfElse, Loop,
    PlayerActions, StepContext, Switch,
    FlowProgram, FlowState, BranchStack, FlowKind,
};

pub use crate::game::{ActionRequest, Game, GameBuilder, GameSnapshot, Move};
