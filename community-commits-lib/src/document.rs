//! JSON documents persisted under the state directory.

use crate::Result;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

const LOG_TARGET: &str = "  document";

/// Load a document, failing if it is missing or malformed.
pub fn load<T>(path: impl AsRef<Path>, context: impl AsRef<str>) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let file = File::open(path).into_app_err_with(|| format!("unable to open {} at '{}'", context.as_ref(), path.display()))?;
    parse(file, path, context.as_ref())
}

/// Load a document, returning `None` when the file does not exist yet.
///
/// A file that exists but cannot be read or parsed is still an error.
pub fn load_if_exists<T>(path: impl AsRef<Path>, context: impl AsRef<str>) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let path = path.as_ref();
    let ctx = context.as_ref();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!(target: LOG_TARGET, "No {ctx} at '{}'", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e).into_app_err_with(|| format!("unable to open {ctx} at '{}'", path.display())),
    };

    parse(file, path, ctx).map(Some)
}

fn parse<T>(file: File, path: &Path, ctx: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    let data = serde_json::from_reader(BufReader::new(file))
        .into_app_err_with(|| format!("unable to parse {ctx} at '{}'", path.display()))?;
    log::debug!(target: LOG_TARGET, "Loaded {ctx} from '{}'", path.display());
    Ok(data)
}

/// Save a document, creating parent directories as needed.
///
/// The document is written to a sibling temporary file and renamed into place so
/// readers never observe a partially written file.
pub fn save<T>(data: &T, path: impl AsRef<Path>) -> Result<()>
where
    T: Serialize,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let file = File::create(&tmp_path).into_app_err_with(|| format!("unable to create file '{}'", tmp_path.display()))?;
    let mut writer = BufWriter::new(file);

    #[cfg(debug_assertions)]
    let result = serde_json::to_writer_pretty(&mut writer, data);
    #[cfg(not(debug_assertions))]
    let result = serde_json::to_writer(&mut writer, data);

    result.into_app_err_with(|| format!("unable to write file '{}'", tmp_path.display()))?;
    writer
        .flush()
        .into_app_err_with(|| format!("unable to flush file '{}'", tmp_path.display()))?;
    drop(writer);

    fs::rename(&tmp_path, path).into_app_err_with(|| format!("unable to replace file '{}'", path.display()))?;
    Ok(())
}
