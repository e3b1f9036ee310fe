use crate::Result;
use fs4::fs_std::FileExt;
use ohno::IntoAppError;
use std::fs::{File, OpenOptions};
use std::path::Path;

const LOG_TARGET: &str = "     queue";

/// Holds the exclusive advisory lock on the queue state until dropped
#[derive(Debug)]
pub struct StateLockGuard(File);

impl Drop for StateLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.unlock() {
            log::warn!(target: LOG_TARGET, "Could not unlock queue state: {e:#}");
        }
    }
}

/// Wait for exclusive access to the queue state guarded by `lock_path`.
pub async fn acquire_state_lock(lock_path: &Path) -> Result<StateLockGuard> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .into_app_err_with(|| format!("opening queue lock file at '{}'", lock_path.display()))?;

    let lock_path = lock_path.to_path_buf();
    let file = tokio::task::spawn_blocking(move || {
        file.lock_exclusive()
            .into_app_err_with(|| format!("acquiring exclusive lock at '{}'", lock_path.display()))?;
        log::trace!(target: LOG_TARGET, "Acquired queue lock at '{}'", lock_path.display());
        Ok::<_, ohno::AppError>(file)
    })
    .await
    .into_app_err("lock task panicked")??;

    Ok(StateLockGuard(file))
}
