//! Command-line interface and orchestration for community-commits
//!
//! This module implements the CLI commands and wires configuration, the
//! persisted queue, the platform clients and the commit store into a
//! [`Worker`](crate::worker::Worker).
//!
//! # Implementation Model
//!
//! ## Commands
//!
//! - **run**: Seed the queue with the tracked repositories, then crawl forks and
//!   refresh reports on the configured schedule until interrupted
//! - **sync**: Seed the queue with the tracked repositories and exit
//! - **report**: Fetch the latest network activity once and write reports
//! - **init**: Generate a default configuration file
//! - **validate**: Check a configuration file and show the resulting schedule
//!
//! ## Execution Flow
//!
//! The `run` function parses command-line arguments using clap and routes
//! to the appropriate command handler. Each handler loads the configuration,
//! applies the environment overlay for platform credentials, and builds only
//! what it needs. All output goes through [`Host`] so commands can be tested
//! without touching the real terminal.

mod common;
mod host;
mod init;
mod report;
mod run;
mod start;
mod sync;
mod validate;

pub use common::{CommonArgs, LogLevel};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use report::{ReportArgs, write_reports};
pub use run::run;
pub use start::{StartArgs, start_worker};
pub use sync::{SyncArgs, sync_repositories};
pub use validate::{ValidateArgs, validate_config};

#[cfg(test)]
pub use host::TestHost;
