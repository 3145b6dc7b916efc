//! Analysis worker client.
//!
//! The worker receives one rendered context bundle and answers with raw
//! suggestions. Transport failures and deadline overruns degrade to zero
//! suggestions at the cycle level; they never abort a session.

mod client;
mod parse;

pub use client::*;
pub use parse::*;
