use super::common::{CommonArgs, open_worker};
use super::Host;
use crate::Result;
use clap::Parser;
use ohno::IntoAppError;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "  commands";

#[derive(Parser, Debug)]
pub struct StartArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Skip the report refresh normally done right after startup
    #[arg(long)]
    pub no_initial_report: bool,
}

/// Seed the queue, then crawl and refresh reports on schedule until Ctrl-C.
pub async fn start_worker<H: Host>(host: &mut H, args: &StartArgs) -> Result<()> {
    let config = args.common.load_config()?;
    let worker = Arc::new(open_worker(&config).await?);

    worker.sync().await?;

    if !args.no_initial_report
        && let Err(e) = worker.refresh_reports().await
    {
        log::warn!(target: LOG_TARGET, "Initial report refresh failed: {e:#}");
    }

    worker.start()?;
    let _ = writeln!(
        host.output(),
        "Tracking {} repositories on schedule '{}', press Ctrl-C to stop",
        worker.settings().repositories.len(),
        worker.schedule()
    );

    let interrupted = tokio::signal::ctrl_c().await.into_app_err("waiting for Ctrl-C");
    worker.stop().await;
    interrupted
}
