use super::github::{GithubClient, GithubSettings, NoiseFilter};
use super::{Branch, Commit, PushEvent, Repository, SourceError, SourceKind};
use crate::Result;
use core::fmt::Debug;
use ohno::app_err;

/// Read access to a hosting platform.
pub trait SourceClient: Debug + Send + Sync {
    /// List the active, public forks of `owner/name`.
    fn list_forks(&self, owner: &str, name: &str) -> impl Future<Output = Result<Vec<Repository>, SourceError>> + Send;

    fn list_branches(&self, repo: &Repository) -> impl Future<Output = Result<Vec<Branch>, SourceError>> + Send;

    fn list_commits(&self, repo: &Repository, branch: &Branch) -> impl Future<Output = Result<Vec<Commit>, SourceError>> + Send;

    /// Recent pushes across the whole fork network of `repo`, with noise removed.
    fn list_network_push_events(&self, repo: &Repository) -> impl Future<Output = Result<Vec<PushEvent>, SourceError>> + Send;
}

/// Builds the client for a platform from that platform's configuration.
pub trait ClientFactory: Send + Sync {
    type Client: SourceClient;

    fn create(&self, kind: SourceKind) -> Result<Self::Client>;
}

/// A client for any supported platform.
#[derive(Debug, Clone)]
pub enum PlatformClient {
    Github(GithubClient),
}

impl SourceClient for PlatformClient {
    async fn list_forks(&self, owner: &str, name: &str) -> Result<Vec<Repository>, SourceError> {
        match self {
            Self::Github(c) => c.list_forks(owner, name).await,
        }
    }

    async fn list_branches(&self, repo: &Repository) -> Result<Vec<Branch>, SourceError> {
        match self {
            Self::Github(c) => c.list_branches(repo).await,
        }
    }

    async fn list_commits(&self, repo: &Repository, branch: &Branch) -> Result<Vec<Commit>, SourceError> {
        match self {
            Self::Github(c) => c.list_commits(repo, branch).await,
        }
    }

    async fn list_network_push_events(&self, repo: &Repository) -> Result<Vec<PushEvent>, SourceError> {
        match self {
            Self::Github(c) => c.list_network_push_events(repo).await,
        }
    }
}

/// Builds [`PlatformClient`]s from the configured platform settings.
#[derive(Debug, Clone, Default)]
pub struct PlatformClientFactory {
    github: Option<GithubSettings>,
    noise: NoiseFilter,
}

impl PlatformClientFactory {
    #[must_use]
    pub const fn new(github: Option<GithubSettings>, noise: NoiseFilter) -> Self {
        Self { github, noise }
    }

    /// Whether settings are present for `kind`.
    #[must_use]
    pub const fn supports(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Github => self.github.is_some(),
        }
    }
}

impl ClientFactory for PlatformClientFactory {
    type Client = PlatformClient;

    fn create(&self, kind: SourceKind) -> Result<PlatformClient> {
        match kind {
            SourceKind::Github => {
                let settings = self.github.as_ref().ok_or_else(|| app_err!("no configuration for source '{kind}'"))?;
                Ok(PlatformClient::Github(GithubClient::new(settings, self.noise.clone())?))
            }
        }
    }
}
