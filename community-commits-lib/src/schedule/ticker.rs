use super::Trigger;
use chrono::Utc;
use tokio::sync::watch;

const LOG_TARGET: &str = "  schedule";

/// Call `on_fire` every time `trigger` fires until `stop` flips to `true`.
///
/// A firing is skipped, not queued, when `on_fire` is still busy with the previous one.
pub async fn run_until_stopped<F, Fut>(trigger: Trigger, mut stop: watch::Receiver<bool>, mut on_fire: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    while !*stop.borrow_and_update() {
        let now = Utc::now();
        let Some(next) = trigger.next_after(now) else {
            log::error!(target: LOG_TARGET, "Schedule never fires again");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            () = tokio::time::sleep(wait) => on_fire().await,
            changed = stop.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }
    }
}
