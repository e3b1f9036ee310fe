use super::Host;
use super::common::CommonArgs;
use crate::Result;
use crate::config::Config;
use crate::schedule::format_schedule;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

fn describe(config: &Config) -> Result<Vec<String>> {
    let settings = config.worker_settings()?;
    let mut lines = vec![format!("Tracking {} repositories", settings.repositories.len())];
    lines.extend(settings.repositories.iter().map(|r| format!("  {r}")));
    lines.push(format!("Schedule: {}", format_schedule(settings.effective_job_interval())));
    lines.push(format!("State directory: {}", config.state_dir()?.display()));
    Ok(lines)
}

pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match args.common.load_config().and_then(|config| describe(&config)) {
        Ok(lines) => {
            let mut out = host.output();
            let _ = writeln!(out, "Configuration file is valid");
            let _ = writeln!(out, "Config file: {}", args.common.config);
            for line in lines {
                let _ = writeln!(out, "{line}");
            }
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
