//! Persisted state: directory layout, JSON records, advisory locking.

mod error;
mod lock;
mod paths;
mod repository;

pub use error::*;
pub use lock::*;
pub use paths::*;
pub use repository::*;
