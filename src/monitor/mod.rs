//! Session monitoring: counters, triggers, health, phase tracking.

mod counters;
mod event;
mod health;
mod phase;
mod session;
mod triggers;

pub use counters::*;
pub use event::*;
pub use health::*;
pub use phase::*;
pub use session::*;
pub use triggers::*;
