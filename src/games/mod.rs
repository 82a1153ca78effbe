//! Example games built on the engine.

pub mod nim;

pub use nim::{Nim, NimBuilder};
