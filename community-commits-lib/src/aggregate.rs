//! Deduplication and grouping of push activity
//!
//! The network feed of a repository overlaps heavily between polls and across
//! forks. [`Aggregator::aggregate`] folds a batch of [`PushEvent`]s into one
//! entry per repository, no commit URL appearing twice, grouped by UTC
//! calendar day. Days are ordered newest first and repositories alphabetically
//! within a day, so the same input always renders the same way.

use crate::source::{PushEvent, WebCommit};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Push events that happened on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatedPushEvents {
    /// `YYYY-MM-DD` in UTC.
    pub date: String,

    /// One entry per repository, sorted by slug.
    pub events: Vec<PushEvent>,
}

struct Record {
    slug: String,
    commit: WebCommit,
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    excluded_prefixes: Vec<String>,
}

impl Aggregator {
    /// Events whose slug starts with any of `excluded_prefixes` are dropped.
    #[must_use]
    pub fn new(excluded_prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            excluded_prefixes: excluded_prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    #[must_use]
    pub fn is_excluded(&self, repo_slug: &str) -> bool {
        self.excluded_prefixes.iter().any(|p| repo_slug.starts_with(p.as_str()))
    }

    pub fn aggregate(&self, events: impl IntoIterator<Item = PushEvent>) -> Vec<DatedPushEvents> {
        let mut records: Vec<Record> = Vec::new();
        let mut by_url: HashMap<String, usize> = HashMap::new();
        let mut earliest: HashMap<String, DateTime<Utc>> = HashMap::new();

        for event in events.into_iter().filter(|e| !self.is_excluded(&e.repo_slug)) {
            let _ = earliest
                .entry(event.repo_slug.clone())
                .and_modify(|t| *t = (*t).min(event.created_at))
                .or_insert(event.created_at);

            for commit in event.commits {
                let record = Record {
                    slug: event.repo_slug.clone(),
                    commit,
                };

                if let Some(&index) = by_url.get(&record.commit.commit_url) {
                    records[index] = record;
                } else {
                    let _ = by_url.insert(record.commit.commit_url.clone(), records.len());
                    records.push(record);
                }
            }
        }

        let mut per_slug: BTreeMap<String, Vec<WebCommit>> = BTreeMap::new();
        for record in records {
            per_slug.entry(record.slug).or_default().push(record.commit);
        }

        let mut per_date: BTreeMap<String, Vec<PushEvent>> = BTreeMap::new();
        for (slug, commits) in per_slug {
            let Some(&created_at) = earliest.get(&slug) else {
                continue;
            };

            per_date
                .entry(created_at.format("%Y-%m-%d").to_string())
                .or_default()
                .push(PushEvent {
                    repo_slug: slug,
                    commits,
                    created_at,
                });
        }

        // slugs are already ascending from the BTreeMap walk above
        per_date
            .into_iter()
            .rev()
            .map(|(date, events)| DatedPushEvents { date, events })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn push(slug: &str, created_at: DateTime<Utc>, shas: &[&str]) -> PushEvent {
        PushEvent {
            repo_slug: slug.to_string(),
            commits: shas
                .iter()
                .map(|sha| WebCommit {
                    commit_url: format!("https://github.com/{slug}/commit/{sha}"),
                    message: format!("commit {sha}"),
                })
                .collect(),
            created_at,
        }
    }

    fn flatten(groups: &[DatedPushEvents]) -> Vec<PushEvent> {
        groups.iter().flat_map(|g| g.events.iter().cloned()).collect()
    }

    fn sample() -> Vec<PushEvent> {
        vec![
            push("zed/widgets", at(3, 9), &["z1"]),
            push("bob/widgets", at(3, 10), &["b1", "b2"]),
            push("acme/widgets", at(2, 8), &["m1"]),
            push("amy/widgets", at(1, 23), &["a1"]),
            push("bob/widgets", at(4, 1), &["b2", "b3"]),
            push("carl/widgets", at(1, 5), &["c1", "c1"]),
        ]
    }

    #[test]
    fn test_duplicate_commit_collapses() {
        let aggregator = Aggregator::new(["acme/"]);
        let events = vec![push("bob/widgets", at(5, 10), &["c1"]), push("bob/widgets", at(5, 12), &["c1", "c2"])];

        let groups = aggregator.aggregate(events);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, "2024-06-05");
        assert_eq!(groups[0].events.len(), 1);

        let event = &groups[0].events[0];
        let urls: Vec<_> = event.commits.iter().map(|c| c.commit_url.as_str()).collect();
        assert_eq!(
            urls,
            ["https://github.com/bob/widgets/commit/c1", "https://github.com/bob/widgets/commit/c2"]
        );
        assert_eq!(event.created_at, at(5, 10));
    }

    #[test]
    fn test_excluded_prefix_never_appears() {
        let aggregator = Aggregator::new(["acme/"]);
        let groups = aggregator.aggregate(sample());
        assert!(flatten(&groups).iter().all(|e| !e.repo_slug.starts_with("acme/")));
        assert!(flatten(&groups).iter().any(|e| e.repo_slug == "amy/widgets"));
    }

    #[test]
    fn test_dates_descend_and_slugs_ascend() {
        let groups = Aggregator::default().aggregate(sample());
        let dates: Vec<_> = groups.iter().map(|g| g.date.as_str()).collect();
        assert_eq!(dates, ["2024-06-03", "2024-06-02", "2024-06-01"]);

        for group in &groups {
            assert!(group.events.windows(2).all(|w| w[0].repo_slug <= w[1].repo_slug));
        }

        let first: Vec<_> = groups[0].events.iter().map(|e| e.repo_slug.as_str()).collect();
        assert_eq!(first, ["bob/widgets", "zed/widgets"]);
    }

    #[test]
    fn test_slug_keeps_earliest_time() {
        let groups = Aggregator::default().aggregate(sample());
        let bob = flatten(&groups).into_iter().find(|e| e.repo_slug == "bob/widgets").unwrap();
        assert_eq!(bob.created_at, at(3, 10));
        assert_eq!(bob.commits.len(), 3);
    }

    #[test]
    fn test_commit_urls_are_unique() {
        let mut events = sample();
        events.push(PushEvent {
            repo_slug: "eve/widgets".to_string(),
            commits: vec![WebCommit {
                commit_url: "https://github.com/bob/widgets/commit/b1".to_string(),
                message: "mirrored".to_string(),
            }],
            created_at: at(6, 0),
        });

        let groups = Aggregator::default().aggregate(events);
        let all: Vec<_> = flatten(&groups).into_iter().flat_map(|e| e.commits).collect();
        let unique: HashSet<_> = all.iter().map(|c| c.commit_url.clone()).collect();
        assert_eq!(all.len(), unique.len());

        // last write wins
        let eve = flatten(&groups).into_iter().find(|e| e.repo_slug == "eve/widgets").unwrap();
        assert_eq!(eve.commits[0].message, "mirrored");
    }

    #[test]
    fn test_idempotent() {
        let aggregator = Aggregator::new(["acme/"]);
        let once = aggregator.aggregate(sample());
        let twice = aggregator.aggregate(flatten(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_day_boundary_is_utc() {
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 59).unwrap();
        let groups = Aggregator::default().aggregate([push("amy/widgets", late, &["a1"])]);
        assert_eq!(groups[0].date, "2024-06-01");
    }

    #[test]
    fn test_empty_input() {
        assert!(Aggregator::new(["acme/"]).aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn test_blank_prefix_excludes_nothing() {
        let aggregator = Aggregator::new([""]);
        assert!(!aggregator.is_excluded("bob/widgets"));
    }
}
