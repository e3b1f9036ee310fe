use super::SourceKind;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// A repository on a hosting platform.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Repository {
    pub source: SourceKind,
    pub owner: String,
    pub name: String,
}

impl Repository {
    #[must_use]
    pub fn new(source: SourceKind, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source,
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Stable identifier of the form `source/owner/name`.
    #[must_use]
    pub fn id(&self) -> String {
        self.to_string()
    }

    /// The `owner/name` part of the identifier.
    #[must_use]
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl Display for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.source, self.owner, self.name)
    }
}

/// A branch together with the time of its most recent commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,

    /// The later of the head commit's author and committer dates.
    pub last_commit: DateTime<Utc>,

    pub repository: Repository,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub message: String,
    pub repository: Repository,
    pub branch: String,
}

/// A push observed in a repository's network activity feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    /// `owner/name` of the repository the commits were pushed to.
    pub repo_slug: String,
    pub commits: Vec<WebCommit>,
    pub created_at: DateTime<Utc>,
}

/// A commit addressed by its browser URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WebCommit {
    pub commit_url: String,
    pub message: String,
}
