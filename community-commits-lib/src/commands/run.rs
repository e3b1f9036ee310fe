//! Command dispatch logic for community-commits

use super::{InitArgs, ReportArgs, StartArgs, SyncArgs, ValidateArgs};
use super::{init_config, start_worker, sync_repositories, validate_config, write_reports};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "community-commits", author, version, long_about = None)]
#[command(about = "Track community commits pushed to forks of your repositories")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl forks and refresh reports on a schedule until interrupted
    Run(StartArgs),
    /// Enqueue the tracked repositories for crawling and exit
    Sync(SyncArgs),
    /// Fetch the latest network activity once and write reports
    Report(ReportArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match Cli::parse_from(args).command {
        Command::Run(args) => start_worker(host, &args).await,
        Command::Sync(args) => sync_repositories(host, &args).await,
        Command::Report(args) => write_reports(host, &args).await,
        Command::Init(args) => init_config(host, &args),
        Command::Validate(args) => validate_config(host, &args),
    }
}
