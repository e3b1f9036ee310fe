//! YAML configuration
//!
//! The configuration names the repositories to track, tunes the queue, lists
//! the reports to produce and carries per-platform connection settings. After
//! loading, [`Config::validate`] rejects anything the worker could not run
//! with, so problems surface at startup instead of on the first delivered job.

use crate::Result;
use crate::queue::QueueSettings;
use crate::reports::ReportTargets;
use crate::source::github::{DEFAULT_GITHUB_API_URL, DEFAULT_IGNORED_MARKERS, GithubSettings, NoiseFilter};
use crate::source::{PlatformClientFactory, Repository, SourceKind};
use crate::worker::WorkerSettings;
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use directories::BaseDirs;
use ohno::{EnrichableExt, IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use url::Url;

/// The default configuration YAML content, embedded from `default_config.yml`
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../default_config.yml");

const APP_DIR: &str = "community-commits";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub tracking: TrackingConfig,

    #[serde(default)]
    pub sources: SourcesConfig,

    #[serde(default)]
    pub noise: NoiseConfig,

    /// Directory holding the queue and discovered commits
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TrackingConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,

    /// `owner/name` prefixes left out of the network view
    #[serde(default)]
    pub excluded_namespaces: Vec<String>,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Hosting platform name, matched case-insensitively
    pub source: String,
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    #[serde(default = "default_queue_name")]
    pub name: String,

    #[serde(default = "default_job_interval", with = "humantime_serde")]
    pub job_interval: Duration,

    #[serde(default = "default_rescan_every", with = "humantime_serde")]
    pub rescan_every: Duration,

    #[serde(default = "default_stagger", with = "humantime_serde")]
    pub stagger: Duration,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,

    #[serde(default = "default_retention", with = "humantime_serde")]
    pub retention: Duration,

    #[serde(default = "default_shutdown_grace", with = "humantime_serde")]
    pub shutdown_grace: Duration,
}

fn default_queue_name() -> String {
    APP_DIR.to_string()
}

const fn default_job_interval() -> Duration {
    Duration::from_hours(1)
}

const fn default_rescan_every() -> Duration {
    Duration::from_hours(24)
}

const fn default_stagger() -> Duration {
    Duration::from_mins(1)
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_retry_backoff() -> Duration {
    Duration::from_mins(1)
}

const fn default_retention() -> Duration {
    Duration::from_hours(24 * 7)
}

const fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
            job_interval: default_job_interval(),
            rescan_every: default_rescan_every(),
            stagger: default_stagger(),
            max_attempts: default_max_attempts(),
            retry_backoff: default_retry_backoff(),
            retention: default_retention(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReportsConfig {
    #[serde(default)]
    pub html: Option<PathBuf>,

    #[serde(default)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    #[serde(default)]
    pub github: Option<GithubConfig>,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GithubConfig {
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default = "default_github_base_url")]
    pub base_url: String,
}

fn default_github_base_url() -> String {
    DEFAULT_GITHUB_API_URL.to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            base_url: default_github_base_url(),
        }
    }
}

impl Debug for GithubConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GithubConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseConfig {
    /// Push events whose raw payload contains any of these are dropped
    #[serde(default = "default_ignored_markers")]
    pub ignored_markers: Vec<String>,

    /// Commits by these authors are dropped
    #[serde(default)]
    pub ignored_authors: Vec<String>,
}

fn default_ignored_markers() -> Vec<String> {
    DEFAULT_IGNORED_MARKERS.iter().map(ToString::to_string).collect()
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            ignored_markers: default_ignored_markers(),
            ignored_authors: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        serde_yaml::from_str(DEFAULT_CONFIG_YAML).expect("default_config.yml should be valid YAML that deserializes to Config")
    }
}

impl Config {
    /// Load the configuration file at `path`, overlay `github_token` and validate the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails validation
    pub fn load(path: impl AsRef<Path>, github_token: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{}'", path.display()))?;
        let mut config: Self =
            serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{}'", path.display()))?;

        if let Some(token) = github_token {
            config.apply_github_token(token);
        }

        config
            .validate()
            .map_err(|e| e.enrich_with(|| format!("validating configuration file '{}'", path.display())))?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).into_app_err("parsing YAML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a YAML file
    pub fn save_default(output_path: impl AsRef<Path>) -> Result<()> {
        let output_path = output_path.as_ref();
        fs::write(output_path, DEFAULT_CONFIG_YAML)
            .into_app_err_with(|| format!("writing default configuration to '{}'", output_path.display()))?;
        Ok(())
    }

    /// Use `token` for GitHub, creating GitHub settings if none were configured.
    pub fn apply_github_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            return;
        }

        self.sources.github.get_or_insert_with(GithubConfig::default).auth_token = Some(token);
    }

    /// Check the configuration for values the worker cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending value
    pub fn validate(&self) -> Result<()> {
        if self.tracking.repositories.is_empty() {
            bail!("tracking.repositories must list at least one repository");
        }

        for repo in &self.tracking.repositories {
            let kind = parse_source(&repo.source)?;

            if repo.owner.trim().is_empty() || repo.name.trim().is_empty() {
                bail!("repository '{}/{}' must have a non-empty owner and name", repo.owner, repo.name);
            }

            if !self.has_settings_for(kind) {
                bail!(
                    "repository '{}/{}' uses source '{kind}' but sources.{kind} is not configured",
                    repo.owner,
                    repo.name
                );
            }
        }

        if self.tracking.queue.name.trim().is_empty() {
            bail!("tracking.queue.name must not be empty");
        }

        if self.tracking.queue.max_attempts == 0 {
            bail!("tracking.queue.max_attempts must be at least 1");
        }

        if let Some(github) = &self.sources.github {
            let _ = Url::parse(&github.base_url).into_app_err_with(|| format!("invalid sources.github.base_url '{}'", github.base_url))?;
        }

        Ok(())
    }

    const fn has_settings_for(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Github => self.sources.github.is_some(),
        }
    }

    /// The tracked repositories.
    pub fn repositories(&self) -> Result<Vec<Repository>> {
        self.tracking
            .repositories
            .iter()
            .map(|r| Ok(Repository::new(parse_source(&r.source)?, r.owner.trim(), r.name.trim())))
            .collect()
    }

    #[must_use]
    pub fn client_factory(&self) -> PlatformClientFactory {
        let github = self.sources.github.as_ref().map(|g| GithubSettings {
            auth_token: g.auth_token.clone(),
            base_url: g.base_url.clone(),
        });

        let noise = NoiseFilter::new(self.noise.ignored_markers.iter().cloned(), self.noise.ignored_authors.iter().cloned());
        PlatformClientFactory::new(github, noise)
    }

    #[must_use]
    pub fn queue_settings(&self) -> QueueSettings {
        let queue = &self.tracking.queue;
        QueueSettings {
            name: queue.name.clone(),
            max_attempts: queue.max_attempts,
            retry_backoff: queue.retry_backoff,
            retention: queue.retention,
        }
    }

    pub fn worker_settings(&self) -> Result<WorkerSettings> {
        let queue = &self.tracking.queue;
        Ok(WorkerSettings {
            repositories: self.repositories()?,
            excluded_namespaces: self.tracking.excluded_namespaces.clone(),
            job_interval: queue.job_interval,
            rescan_every: queue.rescan_every,
            stagger: queue.stagger,
            shutdown_grace: queue.shutdown_grace,
            reports: ReportTargets {
                html: self.tracking.reports.html.clone(),
                json: self.tracking.reports.json.clone(),
            },
        })
    }

    /// The configured state directory, or the platform data directory.
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }

        Ok(BaseDirs::new()
            .into_app_err("could not determine data directory")?
            .data_dir()
            .join(APP_DIR))
    }
}

fn parse_source(name: &str) -> Result<SourceKind> {
    name.parse::<SourceKind>().map_err(|e| {
        let known: Vec<_> = SourceKind::iter().map(|k| k.to_string()).collect();
        app_err!("unknown source '{name}' ({e}), expected one of: {}", known.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r"
tracking:
  repositories:
    - source: GitHub
      owner: acme
      name: widgets
sources:
  github: {}
";

    fn minimal() -> Config {
        Config::parse(MINIMAL).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.tracking.reports.html, Some(PathBuf::from("docs/networks/index.html")));
        assert_eq!(config.noise.ignored_markers, default_ignored_markers());
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = minimal();
        assert_eq!(config.tracking.queue, QueueConfig::default());
        assert_eq!(config.sources.github, Some(GithubConfig::default()));
        assert_eq!(config.noise, NoiseConfig::default());
        assert!(config.tracking.reports.html.is_none());
        assert!(config.state_dir.is_none());
    }

    #[test]
    fn test_durations_are_human_readable() {
        let text = r"
tracking:
  repositories: [{source: github, owner: acme, name: widgets}]
  queue:
    job_interval: 30m
    rescan_every: 2d
    stagger: 90s
sources:
  github: {}
";
        let queue = Config::parse(text).unwrap().tracking.queue;
        assert_eq!(queue.job_interval, Duration::from_mins(30));
        assert_eq!(queue.rescan_every, Duration::from_hours(48));
        assert_eq!(queue.stagger, Duration::from_secs(90));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let text = format!("{MINIMAL}unexpected: true\n");
        let _ = Config::parse(&text).unwrap_err();
    }

    #[test]
    fn test_unknown_source_is_rejected() {
        let text = MINIMAL.replace("GitHub", "gitlab");
        let err = Config::parse(&text).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("unknown source 'gitlab'"), "{msg}");
        assert!(msg.contains("expected one of: github"), "{msg}");
    }

    #[test]
    fn test_source_without_settings_is_rejected() {
        let text = MINIMAL.replace("sources:\n  github: {}\n", "");
        let err = Config::parse(&text).unwrap_err();
        assert!(err.to_string().contains("sources.github is not configured"), "{err}");
    }

    #[test]
    fn test_empty_repositories_are_rejected() {
        let err = Config::parse("tracking: {}\n").unwrap_err();
        assert!(err.to_string().contains("at least one repository"), "{err}");
    }

    #[test]
    fn test_blank_owner_is_rejected() {
        let text = MINIMAL.replace("owner: acme", "owner: ' '");
        let _ = Config::parse(&text).unwrap_err();
    }

    #[test]
    fn test_zero_attempts_is_rejected() {
        let mut config = minimal();
        config.tracking.queue.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"), "{err}");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = minimal();
        config.sources.github = Some(GithubConfig {
            auth_token: None,
            base_url: "not a url".to_string(),
        });
        let _ = config.validate().unwrap_err();
    }

    #[test]
    fn test_github_token_overlay() {
        let text = MINIMAL.replace("sources:\n  github: {}\n", "");
        let mut config: Config = serde_yaml::from_str(&text).unwrap();
        let _ = config.validate().unwrap_err();

        config.apply_github_token("ghp_token");
        config.validate().unwrap();
        assert_eq!(config.sources.github.as_ref().unwrap().auth_token.as_deref(), Some("ghp_token"));

        config.apply_github_token("  ");
        assert_eq!(config.sources.github.as_ref().unwrap().auth_token.as_deref(), Some("ghp_token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let github = GithubConfig {
            auth_token: Some("ghp_secret".to_string()),
            ..GithubConfig::default()
        };
        assert!(!format!("{github:?}").contains("ghp_secret"));
    }

    #[test]
    fn test_worker_settings() {
        let mut config = minimal();
        config.tracking.excluded_namespaces = vec!["acme/".to_string()];
        config.tracking.reports.json = Some(PathBuf::from("out/report.json"));

        let settings = config.worker_settings().unwrap();
        assert_eq!(settings.repositories, [Repository::new(SourceKind::Github, "acme", "widgets")]);
        assert_eq!(settings.excluded_namespaces, ["acme/"]);
        assert_eq!(settings.stagger, Duration::from_mins(1));
        assert_eq!(settings.reports.json, Some(PathBuf::from("out/report.json")));
        assert!(settings.reports.html.is_none());
    }

    #[test]
    fn test_queue_settings() {
        let settings = minimal().queue_settings();
        assert_eq!(settings.name, "community-commits");
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.retention, Duration::from_hours(24 * 7));
    }

    #[test]
    fn test_client_factory_follows_sources() {
        assert!(minimal().client_factory().supports(SourceKind::Github));

        let mut config = minimal();
        config.sources.github = None;
        assert!(!config.client_factory().supports(SourceKind::Github));
    }

    #[test]
    fn test_explicit_state_dir() {
        let mut config = minimal();
        config.state_dir = Some(PathBuf::from("/var/lib/community-commits"));
        assert_eq!(config.state_dir().unwrap(), PathBuf::from("/var/lib/community-commits"));
    }

    #[test]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("community-commits.yml");
        Config::save_default(&path).unwrap();
        assert_eq!(Config::load(&path, None).unwrap(), Config::default());
    }

    #[test]
    fn test_load_applies_token_before_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("community-commits.yml");
        fs::write(&path, MINIMAL.replace("sources:\n  github: {}\n", "")).unwrap();

        let _ = Config::load(&path, None).unwrap_err();
        let config = Config::load(&path, Some("ghp_token")).unwrap();
        assert_eq!(config.sources.github.unwrap().auth_token.as_deref(), Some("ghp_token"));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(tmp.path().join("missing.yml"), None).unwrap_err();
        assert!(err.to_string().contains("missing.yml"), "{err}");
    }
}
