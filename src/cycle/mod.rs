//! Review cycle orchestration.

mod runner;

pub use runner::*;
