use super::common::{CommonArgs, open_worker};
use super::Host;
use crate::Result;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Enqueue every tracked repository without processing anything.
pub async fn sync_repositories<H: Host>(host: &mut H, args: &SyncArgs) -> Result<()> {
    let config = args.common.load_config()?;
    let worker = open_worker(&config).await?;

    worker.sync().await?;
    let _ = writeln!(host.output(), "Enqueued {} tracked repositories", worker.settings().repositories.len());
    Ok(())
}
