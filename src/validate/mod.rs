//! Suggestion validation against knowledge and rejection history.

mod similarity;
mod validator;

pub use similarity::*;
pub use validator::*;
