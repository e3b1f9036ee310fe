use super::api::{ApiClient, ApiResult};
use super::{GithubSettings, NoiseFilter, Pagination};
use crate::source::{Branch, Commit, PushEvent, Repository, SourceClient, SourceError, SourceKind, WebCommit};
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

const LOG_TARGET: &str = "    github";
const GITHUB_WEB_URL: &str = "https://github.com";
const PAGE_SIZE: usize = 100;
const MAX_FORK_PAGES: usize = 10;
const MAX_BRANCH_PAGES: usize = 3;

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct Fork {
    name: String,
    owner: Owner,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    private: bool,
}

#[derive(Debug, Deserialize)]
struct BranchHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchItem {
    name: String,
    commit: BranchHead,
}

#[derive(Debug, Deserialize)]
struct Signature {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitInfo {
    author: Option<Signature>,
    committer: Option<Signature>,
    #[serde(default)]
    message: String,
}

impl CommitInfo {
    fn latest_date(&self) -> Option<DateTime<Utc>> {
        let author = self.author.as_ref().and_then(|s| s.date);
        let committer = self.committer.as_ref().and_then(|s| s.date);
        author.max(committer)
    }
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    sha: String,
    commit: CommitInfo,
    author: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type", default)]
    kind: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    url: String,
    #[serde(default)]
    message: String,
    author: Option<Signature>,
}

/// [`SourceClient`] for GitHub.
#[derive(Debug, Clone)]
pub struct GithubClient {
    api: ApiClient,
    noise: NoiseFilter,
}

impl GithubClient {
    pub fn new(settings: &GithubSettings, noise: NoiseFilter) -> crate::Result<Self> {
        Ok(Self {
            api: ApiClient::new(settings.auth_token.as_deref(), &settings.base_url)?,
            noise,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, SourceError> {
        let url = self.api.endpoint(path, query).map_err(SourceError::Transport)?;

        match self.api.get(url.clone()).await {
            ApiResult::Success(resp, rate_limit) => {
                if let Some(rl) = rate_limit {
                    log::trace!(target: LOG_TARGET, "{} requests left until {}", rl.remaining, rl.reset_at);
                }
                resp.json::<T>()
                    .await
                    .into_app_err_with(|| format!("decoding response from '{url}'"))
                    .map_err(SourceError::Transport)
            }
            ApiResult::RateLimited(rl) => {
                log::warn!(target: LOG_TARGET, "Rate limited on '{url}' until {}", rl.reset_at);
                Err(SourceError::RateLimited { reset_at: rl.reset_at })
            }
            ApiResult::NotFound => {
                log::info!(target: LOG_TARGET, "Nothing found at '{url}'");
                Err(SourceError::NotFound(url.to_string()))
            }
            ApiResult::Failed(e) => Err(SourceError::Transport(e)),
        }
    }

    /// Fetch up to `max_pages` full pages, stopping at the first short page.
    async fn get_pages<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)], max_pages: usize) -> Result<Vec<T>, SourceError> {
        let per_page = PAGE_SIZE.to_string();
        let mut items = Vec::new();

        for page in 1..=max_pages {
            let page = page.to_string();
            let mut q = query.to_vec();
            q.push(("per_page", per_page.as_str()));
            q.push(("page", page.as_str()));

            let batch: Vec<T> = self.get_json(path, &q).await?;
            let full = batch.len() >= PAGE_SIZE;
            items.extend(batch);
            if !full {
                break;
            }
        }

        Ok(items)
    }

    fn push_event_from(&self, event: Event) -> Option<PushEvent> {
        if !event.kind.eq_ignore_ascii_case("PushEvent") {
            return None;
        }

        if self.noise.is_noisy_payload(&event.payload.to_string()) {
            log::trace!(target: LOG_TARGET, "Skipping automated push from {}", event.created_at);
            return None;
        }

        let payload: PushPayload = match serde_json::from_value(event.payload) {
            Ok(p) => p,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Skipping unparseable push payload: {e}");
                return None;
            }
        };

        let (owner, name, _) = parse_commit_api_url(&payload.commits.first()?.url)?;

        let commits: Vec<_> = payload
            .commits
            .into_iter()
            .filter(|c| {
                c.author
                    .as_ref()
                    .is_none_or(|a| !self.noise.is_ignored_author([a.name.as_str(), a.email.as_str()]))
            })
            .filter_map(|c| {
                let (o, n, sha) = parse_commit_api_url(&c.url)?;
                Some(WebCommit {
                    commit_url: web_commit_url(&o, &n, &sha),
                    message: c.message,
                })
            })
            .collect();

        if commits.is_empty() {
            return None;
        }

        Some(PushEvent {
            repo_slug: format!("{owner}/{name}"),
            commits,
            created_at: event.created_at,
        })
    }
}

impl SourceClient for GithubClient {
    async fn list_forks(&self, owner: &str, name: &str) -> Result<Vec<Repository>, SourceError> {
        let forks: Vec<Fork> = self.get_pages(&format!("repos/{owner}/{name}/forks"), &[], MAX_FORK_PAGES).await?;
        let total = forks.len();

        let active: Vec<_> = forks
            .into_iter()
            .filter(|f| !f.archived && !f.disabled && !f.private)
            .map(|f| Repository::new(SourceKind::Github, f.owner.login, f.name))
            .collect();

        log::debug!(target: LOG_TARGET, "Found {} active forks of {owner}/{name} ({total} total)", active.len());
        Ok(active)
    }

    async fn list_branches(&self, repo: &Repository) -> Result<Vec<Branch>, SourceError> {
        let items: Vec<BranchItem> = self
            .get_pages(&format!("repos/{}/{}/branches", repo.owner, repo.name), &[], MAX_BRANCH_PAGES)
            .await?;

        let mut branches = Vec::with_capacity(items.len());
        for item in items {
            let head: CommitItem = self
                .get_json(&format!("repos/{}/{}/commits/{}", repo.owner, repo.name, item.commit.sha), &[])
                .await?;

            let Some(last_commit) = head.commit.latest_date() else {
                log::debug!(target: LOG_TARGET, "Branch '{}' of {repo} has an undated head commit, skipping", item.name);
                continue;
            };

            branches.push(Branch {
                name: item.name,
                last_commit,
                repository: repo.clone(),
            });
        }

        Ok(branches)
    }

    async fn list_commits(&self, repo: &Repository, branch: &Branch) -> Result<Vec<Commit>, SourceError> {
        let items: Vec<CommitItem> = self
            .get_pages(&format!("repos/{}/{}/commits", repo.owner, repo.name), &[("sha", branch.name.as_str())], 1)
            .await?;

        let commits = items
            .into_iter()
            .filter_map(|item| {
                let date = item.commit.latest_date()?;
                let (author, email) = item
                    .commit
                    .author
                    .as_ref()
                    .map(|a| (a.name.clone(), a.email.clone()))
                    .unwrap_or_default();
                let login = item.author.map(|o| o.login).unwrap_or_default();

                if self.noise.is_ignored_author([author.as_str(), email.as_str(), login.as_str()]) {
                    return None;
                }

                Some(Commit {
                    hash: item.sha,
                    author,
                    date,
                    message: item.commit.message,
                    repository: repo.clone(),
                    branch: branch.name.clone(),
                })
            })
            .collect();

        Ok(commits)
    }

    async fn list_network_push_events(&self, repo: &Repository) -> Result<Vec<PushEvent>, SourceError> {
        let path = format!("networks/{}/{}/events", repo.owner, repo.name);
        let max = Pagination::NETWORK_EVENTS;
        let mut current = Pagination::default();
        let mut events = Vec::new();

        loop {
            current = current.advance(max);
            let page = current.page.to_string();
            let per_page = current.per_page.to_string();

            let batch: Vec<serde_json::Value> = match self.get_json(&path, &[("per_page", per_page.as_str()), ("page", page.as_str())]).await {
                Ok(batch) => batch,
                Err(SourceError::NotFound(_)) => break,
                Err(e) => return Err(e),
            };

            let received = batch.len();
            events.extend(batch.into_iter().filter_map(decode_event).filter_map(|e| self.push_event_from(e)));

            if current.is_exhausted(max) || received < current.per_page {
                break;
            }
        }

        log::debug!(target: LOG_TARGET, "Collected {} push events for {repo}", events.len());
        Ok(events)
    }
}

/// Events are decoded one at a time so a malformed entry only loses itself.
fn decode_event(raw: serde_json::Value) -> Option<Event> {
    match serde_json::from_value(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            log::debug!(target: LOG_TARGET, "Skipping unparseable event: {e}");
            None
        }
    }
}

/// Split `.../repos/{owner}/{name}/commits/{sha}` into its parts.
fn parse_commit_api_url(api_url: &str) -> Option<(String, String, String)> {
    let url = Url::parse(api_url).ok()?;
    let segments: Vec<_> = url.path_segments()?.collect();
    let parsed = segments.windows(5).find_map(|w| match w {
        ["repos", owner, name, "commits", sha] if !sha.is_empty() => Some(((*owner).to_string(), (*name).to_string(), (*sha).to_string())),
        _ => None,
    });

    if parsed.is_none() {
        log::debug!(target: LOG_TARGET, "Unrecognized commit URL '{api_url}'");
    }
    parsed
}

fn web_commit_url(owner: &str, name: &str, sha: &str) -> String {
    format!("{GITHUB_WEB_URL}/{owner}/{name}/commit/{sha}")
}
