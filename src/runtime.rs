//! Runtime for executing conversation turns
//!
//! Loads the session, feeds the inbound message through the state machine,
//! runs the resulting effects against the narrator and saves the outcome.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationRuntime, RuntimeConfig, TurnError, TurnOutcome};
pub use traits::*;

use std::sync::Arc;

/// Runtime as wired up by the server: store and narrator chosen at startup
pub type ProductionRuntime = ConversationRuntime<Arc<dyn SessionStore>, Arc<dyn Narrator>>;
