use crate::source::Repository;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display as StrumDisplay, EnumString};

pub const TYPE_KEY: &str = "type";
pub const SOURCE_KEY: &str = "source";
pub const OWNER_KEY: &str = "owner";
pub const NAME_KEY: &str = "name";

/// Identifier assigned by the queue on enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl Display for JobId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kinds of work the crawler schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum JobKind {
    Repository,
}

/// String-keyed job description.
///
/// Two payloads with the same entries describe the same unit of work.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(BTreeMap<String, String>);

impl JobPayload {
    /// Payload for crawling `repo`.
    #[must_use]
    pub fn repository(repo: &Repository) -> Self {
        let mut payload = Self::default();
        payload.insert(TYPE_KEY, JobKind::Repository.to_string());
        payload.insert(SOURCE_KEY, repo.source.to_string());
        payload.insert(OWNER_KEY, repo.owner.clone());
        payload.insert(NAME_KEY, repo.name.clone());
        payload
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The raw `type` entry, if any.
    #[must_use]
    pub fn job_type(&self) -> Option<&str> {
        self.get(TYPE_KEY)
    }
}

impl Display for JobPayload {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A unit of work as tracked by the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,

    /// Earliest time the job may be delivered.
    pub run_after: DateTime<Utc>,

    pub state: JobState,

    /// Number of deliveries so far.
    pub attempts: u32,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Work handed to [`JobQueue::enqueue`](super::JobQueue::enqueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub payload: JobPayload,
    pub run_after: DateTime<Utc>,
}

impl NewJob {
    #[must_use]
    pub const fn new(payload: JobPayload, run_after: DateTime<Utc>) -> Self {
        Self { payload, run_after }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceKind;

    #[test]
    fn test_repository_payload() {
        let payload = JobPayload::repository(&Repository::new(SourceKind::Github, "moov-io", "ach"));
        assert_eq!(payload.job_type(), Some("repository"));
        assert_eq!(payload.get(SOURCE_KEY), Some("github"));
        assert_eq!(payload.get(OWNER_KEY), Some("moov-io"));
        assert_eq!(payload.get(NAME_KEY), Some("ach"));
        assert_eq!(payload.to_string(), "name=ach owner=moov-io source=github type=repository");
    }

    #[test]
    fn test_equal_repositories_give_equal_payloads() {
        let a = JobPayload::repository(&Repository::new(SourceKind::Github, "acme", "widgets"));
        let b = JobPayload::repository(&Repository::new(SourceKind::Github, "acme", "widgets"));
        let c = JobPayload::repository(&Repository::new(SourceKind::Github, "acme", "gadgets"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_job_kind_parse() {
        assert_eq!("Repository".parse::<JobKind>().unwrap(), JobKind::Repository);
        let _ = "organization".parse::<JobKind>().unwrap_err();
    }

    #[test]
    fn test_payload_serializes_as_map() {
        let mut payload = JobPayload::default();
        payload.insert("type", "repository");
        assert_eq!(serde_json::to_string(&payload).unwrap(), r#"{"type":"repository"}"#);
    }
}
