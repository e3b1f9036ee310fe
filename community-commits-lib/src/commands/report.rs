use super::common::{CommonArgs, open_worker};
use super::Host;
use crate::Result;
use crate::reports::ReportTargets;
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Parser;
use ohno::bail;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Output network activity to an HTML file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub html: Option<Utf8PathBuf>,

    /// Output network activity to a JSON file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub json: Option<Utf8PathBuf>,
}

impl ReportArgs {
    /// Files named on the command line replace the configured ones.
    fn targets(&self, configured: &ReportTargets) -> ReportTargets {
        if self.html.is_none() && self.json.is_none() {
            return configured.clone();
        }

        ReportTargets {
            html: self.html.clone().map(Utf8PathBuf::into_std_path_buf),
            json: self.json.clone().map(Utf8PathBuf::into_std_path_buf),
        }
    }
}

/// Fetch the latest network activity of the tracked repositories once and write reports.
pub async fn write_reports<H: Host>(host: &mut H, args: &ReportArgs) -> Result<()> {
    let config = args.common.load_config()?;
    let worker = open_worker(&config).await?;

    let targets = args.targets(&worker.settings().reports);
    if targets.is_empty() {
        bail!("no report output configured, pass --html or --json or set tracking.reports");
    }

    let groups = worker.latest_network_events().await?;
    targets.write(&groups, Utc::now())?;

    let pushes: usize = groups.iter().map(|g| g.events.len()).sum();
    let _ = writeln!(host.output(), "Wrote {pushes} pushes across {} days", groups.len());
    Ok(())
}
