//! Setup shared by every command that reads the configuration.

use crate::Result;
use crate::config::Config;
use crate::queue::LocalQueue;
use crate::source::PlatformClientFactory;
use crate::store::JsonCommitStore;
use crate::worker::Worker;
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use ohno::EnrichableExt;

const LOG_TARGET: &str = "  commands";

/// The worker as wired up by the CLI.
pub type AppWorker = Worker<LocalQueue, PlatformClientFactory, JsonCommitStore>;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Arguments shared by every command that reads the configuration
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to the configuration file
    #[arg(long, short = 'c', value_name = "PATH", env = "APP_CONFIG", default_value = "community-commits.yml")]
    pub config: Utf8PathBuf,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "COMMUNITY_COMMITS_GITHUB_API_KEY", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Directory holding the queue and discovered commits, overriding `state_dir`
    #[arg(long, value_name = "PATH")]
    pub state_dir: Option<Utf8PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    pub log_level: LogLevel,
}

impl CommonArgs {
    /// Initialize logging and load the configuration with command-line overrides applied.
    pub fn load_config(&self) -> Result<Config> {
        init_logging(self.log_level);

        let mut config = Config::load(&self.config, self.github_token.as_deref())?;
        if let Some(dir) = &self.state_dir {
            config.state_dir = Some(dir.clone().into_std_path_buf());
        }

        log::debug!(target: LOG_TARGET, "Loaded configuration from '{}'", self.config);
        Ok(config)
    }
}

/// Open the persisted queue and commit store under the state directory and build a worker over them.
pub async fn open_worker(config: &Config) -> Result<AppWorker> {
    let state_dir = config.state_dir()?;
    let queue_dir = state_dir.join("queue");
    let commits_dir = state_dir.join("commits");

    let queue = LocalQueue::open(&queue_dir, config.queue_settings())
        .await
        .map_err(|e| e.enrich_with(|| format!("opening queue in '{}'", queue_dir.display())))?;

    log::debug!(target: LOG_TARGET, "Using state directory '{}'", state_dir.display());

    Ok(Worker::new(
        config.worker_settings()?,
        queue,
        config.client_factory(),
        JsonCommitStore::new(commits_dir),
    ))
}

/// Initialize logger based on log level
///
/// Only the first call takes effect.
pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .try_init();
}
