use super::CommitStore;
use crate::Result;
use crate::document;
use crate::path_utils::{nested_path, sanitize_path_component};
use crate::source::{Branch, Commit, Repository};
use chrono::{DateTime, Utc};
use ohno::EnrichableExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "     store";

/// Everything known about one branch of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchCommits {
    pub repository: Repository,
    pub branch: String,
    pub last_commit: DateTime<Utc>,

    /// Newest first.
    pub commits: Vec<Commit>,
}

/// [`CommitStore`] writing `<root>/<source>/<owner>/<name>/<branch>.json`.
#[derive(Debug, Clone)]
pub struct JsonCommitStore {
    root: PathBuf,
}

impl JsonCommitStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn branch_path(&self, repo: &Repository, branch: &str) -> PathBuf {
        let source = repo.source.to_string();
        nested_path(&self.root, [source.as_str(), repo.owner.as_str(), repo.name.as_str()]).join(format!("{}.json", sanitize_path_component(branch)))
    }

    /// Load what was recorded for `branch` of `repo`, if anything.
    pub fn load(&self, repo: &Repository, branch: &str) -> Result<Option<BranchCommits>> {
        document::load_if_exists(self.branch_path(repo, branch), format!("commits of {repo}@{branch}"))
    }

    fn merge(&self, repo: &Repository, branch: &Branch, commits: &[Commit]) -> Result<usize> {
        let path = self.branch_path(repo, &branch.name);
        let mut doc = self.load(repo, &branch.name)?.unwrap_or_else(|| BranchCommits {
            repository: repo.clone(),
            branch: branch.name.clone(),
            last_commit: branch.last_commit,
            commits: Vec::new(),
        });

        let mut by_hash: HashMap<_, _> = doc.commits.drain(..).map(|c| (c.hash.clone(), c)).collect();
        let mut added = 0;
        for commit in commits {
            if by_hash.insert(commit.hash.clone(), commit.clone()).is_none() {
                added += 1;
            }
        }

        doc.commits = by_hash.into_values().collect();
        doc.commits.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.hash.cmp(&b.hash)));
        doc.last_commit = doc.last_commit.max(branch.last_commit);

        document::save(&doc, &path)?;
        Ok(added)
    }
}

impl CommitStore for JsonCommitStore {
    async fn save_commits(&self, repo: &Repository, branch: &Branch, commits: &[Commit]) -> Result<()> {
        let added = self
            .merge(repo, branch, commits)
            .map_err(|e| e.enrich_with(|| format!("storing commits of {repo}@{}", branch.name)))?;

        log::debug!(target: LOG_TARGET, "Stored {} commits of {repo}@{} ({added} new)", commits.len(), branch.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;
    use chrono::TimeZone;

    fn repo() -> Repository {
        Repository::new(SourceKind::Github, "jane", "ach")
    }

    fn branch(name: &str, day: u32) -> Branch {
        Branch {
            name: name.to_string(),
            last_commit: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            repository: repo(),
        }
    }

    fn commit(hash: &str, day: u32, message: &str) -> Commit {
        Commit {
            hash: hash.to_string(),
            author: "Jane".to_string(),
            date: Utc.with_ymd_and_hms(2024, 3, day, 0, 0, 0).unwrap(),
            message: message.to_string(),
            repository: repo(),
            branch: "feature/nacha".to_string(),
        }
    }

    #[tokio::test]
    async fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCommitStore::new(dir.path());

        store
            .save_commits(&repo(), &branch("feature/nacha", 2), &[commit("a1", 2, "first")])
            .await
            .unwrap();

        assert!(dir.path().join("github/jane/ach/feature_nacha.json").exists());

        store
            .save_commits(&repo(), &branch("release-1.0", 2), &[commit("b1", 2, "release")])
            .await
            .unwrap();
        assert!(dir.path().join("github/jane/ach/release-1.0.json").exists());
    }

    #[tokio::test]
    async fn test_commits_accumulate_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCommitStore::new(dir.path());

        store
            .save_commits(&repo(), &branch("main", 2), &[commit("a1", 1, "first"), commit("a2", 2, "second")])
            .await
            .unwrap();
        store
            .save_commits(&repo(), &branch("main", 3), &[commit("a2", 2, "second, amended"), commit("a3", 3, "third")])
            .await
            .unwrap();

        let doc = store.load(&repo(), "main").unwrap().unwrap();
        let hashes: Vec<_> = doc.commits.iter().map(|c| c.hash.as_str()).collect();
        assert_eq!(hashes, ["a3", "a2", "a1"]);
        assert_eq!(doc.commits[1].message, "second, amended");
        assert_eq!(doc.last_commit, branch("main", 3).last_commit);
    }

    #[tokio::test]
    async fn test_load_unknown_branch() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCommitStore::new(dir.path());
        assert!(store.load(&repo(), "nope").unwrap().is_none());
    }
}
