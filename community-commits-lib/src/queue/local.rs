use super::lock::acquire_state_lock;
use super::{Job, JobHandler, JobId, JobQueue, JobState, NewJob, QueueError};
use crate::Result;
use crate::document;
use crate::path_utils::sanitize_path_component;
use crate::schedule::{Schedule, Trigger, run_until_stopped};
use chrono::{DateTime, TimeDelta, Utc};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "     queue";
const MAX_RETRY_DELAY: Duration = Duration::from_hours(24);

/// Tuning for a [`LocalQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    /// Base name of the state files.
    pub name: String,

    /// Deliveries before a failing job is given up on.
    pub max_attempts: u32,

    /// Delay before the first retry, doubled for every further attempt.
    pub retry_backoff: Duration,

    /// How long completed and failed jobs are kept around.
    pub retention: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            name: "community-commits".to_string(),
            max_attempts: 3,
            retry_backoff: Duration::from_mins(1),
            retention: Duration::from_hours(7 * 24),
        }
    }
}

enum Admission {
    Added(JobId),
    Duplicate(JobId),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueState {
    next_id: u64,
    jobs: Vec<Job>,
}

impl QueueState {
    fn pending_equal(&self, job: &Job) -> Option<JobId> {
        self.jobs
            .iter()
            .find(|j| j.id != job.id && j.state == JobState::Pending && j.payload == job.payload)
            .map(|j| j.id)
    }

    fn add(&mut self, new: NewJob, now: DateTime<Utc>) -> Admission {
        if let Some(existing) = self
            .jobs
            .iter()
            .find(|j| j.state == JobState::Pending && j.payload == new.payload)
        {
            return Admission::Duplicate(existing.id);
        }

        self.next_id += 1;
        let id = JobId::new(self.next_id);
        self.jobs.push(Job {
            id,
            payload: new.payload,
            run_after: new.run_after,
            state: JobState::Pending,
            attempts: 0,
            updated_at: now,
            last_error: None,
        });

        Admission::Added(id)
    }

    fn claim_due(&mut self, now: DateTime<Utc>) -> Option<Job> {
        let job = self
            .jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Pending && j.run_after <= now)
            .min_by_key(|j| (j.run_after, j.id))?;

        job.state = JobState::Running;
        job.attempts += 1;
        job.updated_at = now;
        Some(job.clone())
    }

    fn finish(&mut self, id: JobId, outcome: core::result::Result<(), String>, settings: &QueueSettings, now: DateTime<Utc>) -> Option<JobState> {
        let index = self.jobs.iter().position(|j| j.id == id)?;
        let superseded = self.pending_equal(&self.jobs[index]);
        let job = &mut self.jobs[index];
        job.updated_at = now;

        match outcome {
            Ok(()) => {
                job.state = JobState::Completed;
                job.last_error = None;
            }
            Err(msg) => {
                job.last_error = Some(msg);
                if job.attempts >= settings.max_attempts {
                    job.state = JobState::Failed;
                } else if let Some(other) = superseded {
                    log::debug!(target: LOG_TARGET, "Not retrying job {id}, job {other} covers the same work");
                    job.state = JobState::Failed;
                } else {
                    job.state = JobState::Pending;
                    job.run_after = now + retry_delay(settings.retry_backoff, job.attempts);
                }
            }
        }

        Some(job.state)
    }

    fn recover_running(&mut self, now: DateTime<Utc>) -> usize {
        let mut recovered = 0;
        for job in self.jobs.iter_mut().filter(|j| j.state == JobState::Running) {
            job.state = JobState::Pending;
            job.updated_at = now;
            recovered += 1;
        }
        recovered
    }

    fn prune(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        let before = self.jobs.len();
        self.jobs
            .retain(|j| !j.state.is_terminal() || now.signed_duration_since(j.updated_at) <= retention);
        before - self.jobs.len()
    }
}

fn retry_delay(base: Duration, attempts: u32) -> TimeDelta {
    let factor = 2u32.saturating_pow(attempts.saturating_sub(1));
    let delay = base.saturating_mul(factor).min(MAX_RETRY_DELAY);
    TimeDelta::from_std(delay).unwrap_or_else(|_| TimeDelta::hours(24))
}

#[derive(Debug)]
struct Inner {
    name: String,
    state_path: PathBuf,
    lock_path: PathBuf,
    settings: QueueSettings,
    serial: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    stop: watch::Sender<bool>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    /// Run `f` against the current persisted state and persist the result.
    ///
    /// The file lock makes this safe against other processes sharing the state directory.
    async fn transact<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut QueueState) -> R + Send,
        R: Send,
    {
        let _serial = self.serial.lock().await;
        let _lock = acquire_state_lock(&self.lock_path).await?;

        let mut state: QueueState = document::load_if_exists(&self.state_path, "queue state")?.unwrap_or_default();
        let out = f(&mut state);
        document::save(&state, &self.state_path)?;
        Ok(out)
    }

    fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }
}

/// A [`JobQueue`] persisted as a JSON document in a local directory.
///
/// Every mutation re-reads the document under an exclusive file lock, so several
/// processes may enqueue into the same queue while one of them consumes it.
#[derive(Debug, Clone)]
pub struct LocalQueue {
    inner: Arc<Inner>,
}

impl LocalQueue {
    /// Open the queue named by `settings` in `dir`, creating it if needed.
    ///
    /// Fails when the directory, the lock or an existing state document is unusable.
    pub async fn open(dir: impl AsRef<Path>, settings: QueueSettings) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).into_app_err_with(|| format!("unable to create queue directory '{}'", dir.display()))?;

        let stem = sanitize_path_component(&settings.name);
        let (stop, _) = watch::channel(false);
        let queue = Self {
            inner: Arc::new(Inner {
                name: settings.name.clone(),
                state_path: dir.join(format!("{stem}.json")),
                lock_path: dir.join(format!("{stem}.lock")),
                settings,
                serial: tokio::sync::Mutex::new(()),
                closed: AtomicBool::new(false),
                stop,
                runner: Mutex::new(None),
            }),
        };

        let pending = queue
            .inner
            .transact(|s| s.jobs.iter().filter(|j| j.state == JobState::Pending).count())
            .await?;
        log::debug!(target: LOG_TARGET, "Opened queue '{}' with {pending} pending jobs", queue.inner.name);

        Ok(queue)
    }

    /// Snapshot of every job the queue still knows about.
    pub async fn jobs(&self) -> Result<Vec<Job>> {
        self.inner.transact(|s| s.jobs.clone()).await
    }

    /// Return jobs left running by an interrupted consumer to the pending set.
    pub async fn recover(&self, now: DateTime<Utc>) -> Result<usize> {
        self.inner.transact(|s| s.recover_running(now)).await
    }

    /// Deliver every job due at `now` to `handler`, one at a time.
    ///
    /// Returns the number of deliveries. Stops early once shutdown is requested.
    pub async fn run_due<H: JobHandler>(&self, handler: &H, now: DateTime<Utc>) -> Result<usize> {
        let settings = &self.inner.settings;
        let mut delivered = 0;

        while !self.inner.stop_requested() {
            let Some(job) = self.inner.transact(|s| s.claim_due(now)).await? else {
                break;
            };
            delivered += 1;

            let job_type = job.payload.job_type().unwrap_or("<none>").to_string();
            log::debug!(target: LOG_TARGET, "Delivering job {} ({}), attempt {}", job.id, job.payload, job.attempts);

            let outcome = handler.handle(&job).await.map_err(|e| format!("{e:#}"));
            if let Err(msg) = &outcome {
                log::warn!(target: LOG_TARGET, "Job {} of type '{job_type}' failed on attempt {}: {msg}", job.id, job.attempts);
            }

            let (state, pruned) = self
                .inner
                .transact(|s| (s.finish(job.id, outcome, settings, now), s.prune(settings.retention, now)))
                .await?;

            if state == Some(JobState::Failed) {
                log::error!(target: LOG_TARGET, "Job {} of type '{job_type}' gave up after {} attempts", job.id, job.attempts);
            }
            if pruned > 0 {
                log::debug!(target: LOG_TARGET, "Pruned {pruned} finished jobs");
            }
        }

        Ok(delivered)
    }
}

impl JobQueue for LocalQueue {
    async fn enqueue(&self, job: NewJob) -> core::result::Result<JobId, QueueError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }

        let now = Utc::now();
        let description = job.payload.to_string();
        let run_after = job.run_after;

        match self.inner.transact(move |s| s.add(job, now)).await.map_err(QueueError::Storage)? {
            Admission::Added(id) => {
                log::info!(target: LOG_TARGET, "Enqueued job {id} ({description}) to run after {run_after}");
                Ok(id)
            }
            Admission::Duplicate(existing) => {
                log::debug!(target: LOG_TARGET, "Job {existing} already covers ({description})");
                Err(QueueError::Duplicate(existing))
            }
        }
    }

    fn start_recurring<H: JobHandler>(&self, schedule: &Schedule, handler: Arc<H>) -> Result<()> {
        let trigger = Trigger::parse(schedule)?;

        let mut runner = self.inner.runner.lock().unwrap_or_else(PoisonError::into_inner);
        if self.inner.closed.load(Ordering::SeqCst) {
            bail!("queue '{}' has been shut down", self.inner.name);
        }
        if runner.is_some() {
            bail!("queue '{}' already has a handler", self.inner.name);
        }

        let queue = self.clone();
        let stop = self.inner.stop.subscribe();

        *runner = Some(tokio::spawn(async move {
            match queue.recover(Utc::now()).await {
                Ok(0) => {}
                Ok(n) => log::info!(target: LOG_TARGET, "Re-queued {n} interrupted jobs"),
                Err(e) => log::error!(target: LOG_TARGET, "Could not recover interrupted jobs: {e:#}"),
            }

            let queue = &queue;
            let handler = handler.as_ref();
            run_until_stopped(trigger, stop, move || async move {
                if let Err(e) = queue.run_due(handler, Utc::now()).await {
                    log::error!(target: LOG_TARGET, "Could not process queue '{}': {e:#}", queue.inner.name);
                }
            })
            .await;
        }));

        log::info!(target: LOG_TARGET, "Processing queue '{}' on schedule '{schedule}'", self.inner.name);
        Ok(())
    }

    async fn shutdown(&self, grace: Duration) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _ = self.inner.stop.send_replace(true);

        let runner = self.inner.runner.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(handle) = runner else {
            return;
        };

        match tokio::time::timeout(grace, handle).await {
            Ok(Ok(())) => log::info!(target: LOG_TARGET, "Stopped queue '{}'", self.inner.name),
            Ok(Err(e)) => log::error!(target: LOG_TARGET, "Queue '{}' runner failed: {e}", self.inner.name),
            Err(_) => log::warn!(target: LOG_TARGET, "Queue '{}' still busy after {grace:?}, not waiting any longer", self.inner.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::JobPayload;
    use crate::source::{Repository, SourceKind};
    use chrono::TimeZone;
    use ohno::app_err;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn payload(name: &str) -> JobPayload {
        JobPayload::repository(&Repository::new(SourceKind::Github, "acme", name))
    }

    async fn open(dir: &Path) -> LocalQueue {
        LocalQueue::open(dir, QueueSettings::default()).await.unwrap()
    }

    #[derive(Debug, Default)]
    struct Recorder {
        seen: Mutex<Vec<Job>>,
        fail: bool,
    }

    impl Recorder {
        fn names(&self) -> Vec<String> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .map(|j| j.payload.get("name").unwrap().to_string())
                .collect()
        }
    }

    impl JobHandler for Recorder {
        async fn handle(&self, job: &Job) -> Result<()> {
            self.seen.lock().unwrap().push(job.clone());
            if self.fail {
                return Err(app_err!("boom"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_duplicate_pending_job_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;

        let first = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap();
        let err = queue
            .enqueue(NewJob::new(payload("widgets"), t0() + TimeDelta::hours(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, QueueError::Duplicate(id) if id == first));

        let other = queue.enqueue(NewJob::new(payload("gadgets"), t0())).await.unwrap();
        assert_ne!(other, first);
        assert_eq!(queue.jobs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_admit_one() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.enqueue(NewJob::new(payload("widgets"), t0())).await })
            })
            .collect();

        let mut added = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => added += 1,
                Err(QueueError::Duplicate(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(added, 1);
    }

    #[tokio::test]
    async fn test_due_jobs_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;

        let _ = queue.enqueue(NewJob::new(payload("late"), t0() + TimeDelta::minutes(2))).await.unwrap();
        let _ = queue.enqueue(NewJob::new(payload("b"), t0())).await.unwrap();
        let _ = queue.enqueue(NewJob::new(payload("a"), t0() - TimeDelta::minutes(1))).await.unwrap();
        let _ = queue.enqueue(NewJob::new(payload("c"), t0())).await.unwrap();

        let recorder = Recorder::default();
        let delivered = queue.run_due(&recorder, t0()).await.unwrap();
        assert_eq!(delivered, 3);
        assert_eq!(recorder.names(), ["a", "b", "c"]);

        let jobs = queue.jobs().await.unwrap();
        let late = jobs.iter().find(|j| j.payload.get("name") == Some("late")).unwrap();
        assert_eq!(late.state, JobState::Pending);
        assert_eq!(jobs.iter().filter(|j| j.state == JobState::Completed).count(), 3);
    }

    #[tokio::test]
    async fn test_failures_back_off_then_fail() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        let id = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap();

        let recorder = Recorder {
            fail: true,
            ..Recorder::default()
        };

        assert_eq!(queue.run_due(&recorder, t0()).await.unwrap(), 1);
        let job = queue.jobs().await.unwrap().into_iter().find(|j| j.id == id).unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.run_after, t0() + TimeDelta::minutes(1));
        assert!(job.last_error.unwrap().contains("boom"));

        // not yet due
        assert_eq!(queue.run_due(&recorder, t0() + TimeDelta::seconds(30)).await.unwrap(), 0);

        let second = t0() + TimeDelta::minutes(1);
        assert_eq!(queue.run_due(&recorder, second).await.unwrap(), 1);
        let job = queue.jobs().await.unwrap().into_iter().find(|j| j.id == id).unwrap();
        assert_eq!(job.run_after, second + TimeDelta::minutes(2));

        assert_eq!(queue.run_due(&recorder, second + TimeDelta::minutes(2)).await.unwrap(), 1);
        let job = queue.jobs().await.unwrap().into_iter().find(|j| j.id == id).unwrap();
        assert_eq!(job.state, JobState::Failed);
        assert_eq!(job.attempts, 3);
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let first = {
            let queue = open(dir.path()).await;
            queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap()
        };

        let queue = open(dir.path()).await;
        let err = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap_err();
        assert!(matches!(err, QueueError::Duplicate(id) if id == first));

        let next = queue.enqueue(NewJob::new(payload("gadgets"), t0())).await.unwrap();
        assert!(next > first);
    }

    #[tokio::test]
    async fn test_running_jobs_are_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        let id = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap();

        let claimed = queue.inner.transact(|s| s.claim_due(t0())).await.unwrap().unwrap();
        assert_eq!(claimed.id, id);

        let reopened = open(dir.path()).await;
        assert_eq!(reopened.recover(t0()).await.unwrap(), 1);

        let recorder = Recorder::default();
        assert_eq!(reopened.run_due(&recorder, t0()).await.unwrap(), 1);
        assert_eq!(recorder.seen.lock().unwrap()[0].attempts, 2);
    }

    #[derive(Debug)]
    struct Requeuer {
        queue: LocalQueue,
    }

    impl JobHandler for Requeuer {
        async fn handle(&self, job: &Job) -> Result<()> {
            let _ = self
                .queue
                .enqueue(NewJob::new(job.payload.clone(), t0() + TimeDelta::days(1)))
                .await
                .map_err(|e| app_err!("{e}"))?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_running_job_may_requeue_itself() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        let _ = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap();

        let handler = Requeuer { queue: queue.clone() };
        assert_eq!(queue.run_due(&handler, t0()).await.unwrap(), 1);

        let jobs = queue.jobs().await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().any(|j| j.state == JobState::Pending && j.run_after == t0() + TimeDelta::days(1)));
    }

    #[tokio::test]
    async fn test_finished_jobs_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        let _ = queue.enqueue(NewJob::new(payload("old"), t0())).await.unwrap();
        let recorder = Recorder::default();
        let _ = queue.run_due(&recorder, t0()).await.unwrap();

        let later = t0() + TimeDelta::days(8);
        let _ = queue.enqueue(NewJob::new(payload("new"), later)).await.unwrap();
        let _ = queue.run_due(&recorder, later).await.unwrap();

        let names: Vec<_> = queue
            .jobs()
            .await
            .unwrap()
            .iter()
            .map(|j| j.payload.get("name").unwrap().to_string())
            .collect();
        assert_eq!(names, ["new"]);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        queue.shutdown(Duration::from_secs(1)).await;

        let err = queue.enqueue(NewJob::new(payload("widgets"), t0())).await.unwrap_err();
        assert!(matches!(err, QueueError::Closed));
        let _ = queue
            .start_recurring(&Schedule::new("* * * * * *"), Arc::new(Recorder::default()))
            .unwrap_err();
    }

    #[tokio::test]
    async fn test_corrupt_state_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("community-commits.json"), "{ nope").unwrap();
        let err = LocalQueue::open(dir.path(), QueueSettings::default()).await.unwrap_err();
        assert!(err.to_string().contains("queue state"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_recurring_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let queue = open(dir.path()).await;
        let _ = queue.enqueue(NewJob::new(payload("widgets"), Utc::now())).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        queue
            .start_recurring(&Schedule::new("* * * * * *"), Arc::clone(&recorder))
            .unwrap();
        let _ = queue
            .start_recurring(&Schedule::new("* * * * * *"), Arc::clone(&recorder))
            .unwrap_err();

        for _ in 0..50 {
            if !recorder.seen.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        queue.shutdown(Duration::from_secs(5)).await;
        assert_eq!(recorder.names(), ["widgets"]);
    }
}
