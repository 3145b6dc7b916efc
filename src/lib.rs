//! Claude Sentinel - Adaptive review gating and knowledge validation for Claude Code sessions.

pub mod config;
pub mod context;
pub mod cycle;
pub mod display;
pub mod knowledge;
pub mod learning;
pub mod monitor;
pub mod storage;
pub mod validate;
pub mod worker;
