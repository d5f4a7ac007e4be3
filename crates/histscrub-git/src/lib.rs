//! Git plumbing for histscrub
//!
//! Every operation shells out to the `git` command line (and to the rewrite
//! engine) with prompts disabled. Secrets are never passed as arguments or
//! environment variables.

pub mod command;
pub mod reclaim;
pub mod repo;
pub mod rewrite;
pub mod snapshot;
pub mod verify;

#[cfg(test)]
pub(crate) mod test_support;

pub use reclaim::reclaim;
pub use repo::Repository;
pub use rewrite::{ExpressionsFile, FilterRepo, RewriteEngine};
pub use snapshot::{Snapshot, ensure_absent};
pub use verify::scan_history;
