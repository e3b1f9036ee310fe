use crate::Result;
use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use url::Url;

const LOG_TARGET: &str = "    github";
const USER_AGENT: &str = "community-commits";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Quota information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Classified outcome of an API call
#[derive(Debug)]
pub enum ApiResult {
    Success(reqwest::Response, Option<RateLimitInfo>),

    /// Quota exhausted, retry after the reset time
    RateLimited(RateLimitInfo),

    NotFound,

    /// Anything else, not worth retrying immediately
    Failed(ohno::AppError),
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(token: Option<&str>, base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        if let Some(t) = token.filter(|t| !t.is_empty()) {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}")).into_app_err("invalid GitHub token")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .into_app_err("unable to create HTTP client")?;

        let base_url = base_url.trim_end_matches('/');
        let _ = Url::parse(base_url).into_app_err_with(|| format!("invalid GitHub API URL '{base_url}'"))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL for `path` below the API root.
    pub fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url)).into_app_err_with(|| format!("invalid API path '{path}'"))?;
        if !query.is_empty() {
            let _ = url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub async fn get(&self, url: Url) -> ApiResult {
        log::debug!(target: LOG_TARGET, "GET {url}");

        let resp = match self.client.get(url.clone()).send().await {
            Ok(r) => r,
            Err(e) => return ApiResult::Failed(ohno::AppError::from(e)),
        };

        let rate_limit = extract_rate_limit_from_headers(resp.headers());
        let status = resp.status();

        if status.is_success() {
            return ApiResult::Success(resp, rate_limit);
        }

        match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => ApiResult::RateLimited(rate_limit.unwrap_or_else(|| RateLimitInfo {
                remaining: 0,
                reset_at: Utc::now() + TimeDelta::hours(1),
            })),
            StatusCode::NOT_FOUND => ApiResult::NotFound,
            _ => ApiResult::Failed(app_err!("request to '{url}' failed with status {status}")),
        }
    }
}

fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}
