//! GitHub binding for [`SourceClient`](super::SourceClient)
//!
//! Talks to the GitHub REST API directly over `reqwest`. Responses are
//! classified into success, rate limiting, not found and other failures, and
//! mapped onto [`SourceError`](super::SourceError).

mod api;
mod client;
mod noise;
mod pagination;

pub use client::GithubClient;
pub use noise::{DEFAULT_IGNORED_MARKERS, NoiseFilter};
pub use pagination::Pagination;

use core::fmt::{Debug, Formatter};

/// Default REST endpoint.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Connection settings for [`GithubClient`].
#[derive(Clone, PartialEq, Eq)]
pub struct GithubSettings {
    pub auth_token: Option<String>,
    pub base_url: String,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            auth_token: None,
            base_url: DEFAULT_GITHUB_API_URL.to_string(),
        }
    }
}

impl Debug for GithubSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GithubSettings")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
