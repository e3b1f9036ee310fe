use super::{generate_html, generate_json};
use crate::Result;
use crate::aggregate::DatedPushEvents;
use chrono::{DateTime, Utc};
use ohno::IntoAppError;
use std::fs;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   reports";

/// Files the aggregated view is written to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTargets {
    pub html: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl ReportTargets {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.html.is_none() && self.json.is_none()
    }

    /// Render every configured format and write it out.
    pub fn write(&self, groups: &[DatedPushEvents], timestamp: DateTime<Utc>) -> Result<()> {
        if let Some(path) = &self.html {
            let mut html = String::new();
            generate_html(groups, timestamp, &mut html)?;
            write_file(path, &html)?;
        }

        if let Some(path) = &self.json {
            let mut json = String::new();
            generate_json(groups, &mut json)?;
            write_file(path, &json)?;
        }

        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    fs::write(path, contents).into_app_err_with(|| format!("unable to write report '{}'", path.display()))?;
    log::info!(target: LOG_TARGET, "Wrote report '{}'", path.display());
    Ok(())
}
