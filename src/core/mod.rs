//! Core engine types: arguments, entities, players, RNG, configuration, errors.
//!
//! These are the game-agnostic building blocks shared by the action resolver
//! and the flow interpreter. Games never modify them; they configure the
//! engine through `GameBuilder`.

pub mod argument;
pub mod config;
pub mod entity;
pub mod error;
pub mod player;
pub mod rng;

pub use argument::{Args, Argument};
pub use config::EngineConfig;
pub use entity::EntityId;
pub use error::{FlowError, GameError, MoveError};
pub use player::{PlayerId, PlayerMap};
pub use rng::{GameRng, GameRngState};
