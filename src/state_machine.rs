//! Core session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition` decides, the session manager executes the returned effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{SessionContext, SessionState};
pub use transition::{transition, TransitionError, TransitionResult};
