//! Context extraction for review prompts.
//!
//! A task plus persisted knowledge becomes one bounded prompt bundle:
//! target files, relevance-ranked entries, recent rejections, rendered
//! through the task's template.

mod bundle;
mod extractor;
mod task;
mod template;
mod vcs;

pub use bundle::*;
pub use extractor::*;
pub use task::*;
pub use template::*;
pub use vcs::*;
