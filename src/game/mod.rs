//! The driver a host talks to.
//!
//! ## Key Types
//!
//! - `GameBuilder`: registers players, actions, the main flow and subflows
//! - `Game`: the live game; start, submit moves, save and restore
//! - `Move`: a player's submission
//! - `GameSnapshot`: everything a stateless host persists between requests

mod game;
mod moves;
mod snapshot;

pub use game::{Game, GameBuilder};
pub use moves::Move;
pub use snapshot::GameSnapshot;

pub use crate::flow::{ActionRequest, AllowedActions};
