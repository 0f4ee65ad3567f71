//! Turn runtime
//!
//! Drives one inbound message through the pipeline the engine expects:
//! load state, resolve action, deliver, resolve next state, persist. All I/O
//! goes through the traits in [`traits`] so the pipeline can run against
//! in-memory implementations.

mod executor;
mod memory;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, TurnOutcome, DEFAULT_MAX_ACTIONS_PER_TURN};
pub use memory::MemoryStateStore;
pub use traits::*;

use crate::error::ResolutionError;
use thiserror::Error;

/// Errors that end a turn
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("State store error: {0}")]
    Store(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("User context error: {0}")]
    UserContext(String),
}
