//! Commit persistence
//!
//! The crawler records what it finds on each fork branch through
//! [`CommitStore`]. [`JsonCommitStore`] keeps one JSON document per branch.

mod json;

pub use json::{BranchCommits, JsonCommitStore};

use crate::source::{Branch, Commit, Repository};

pub trait CommitStore: Send + Sync {
    /// Record `commits` discovered on `branch` of `repo`.
    fn save_commits(&self, repo: &Repository, branch: &Branch, commits: &[Commit]) -> impl Future<Output = crate::Result<()>> + Send;
}
