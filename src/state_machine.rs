//! Conversation state machine
//!
//! Elm-style: a pure `transition` function maps (session, event) to a new
//! session plus effects. The runtime executes the effects, which may feed
//! further events back in within the same turn.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{ConvContext, ConvState, Session, MAX_QUESTIONS};
pub use transition::{transition, TransitionError};
