//! Acceptance tracking and threshold adaptation.

mod engine;
mod stats;

pub use engine::*;
pub use stats::*;
