//! Crawl orchestration
//!
//! [`Worker`] ties the queue, the source clients and the commit store together.
//! It seeds the queue with the tracked repositories, handles each delivered
//! repository job by walking the repository's forks, and periodically renders
//! the aggregated network activity of the tracked repositories.
//!
//! Each repository moves through the same cycle: it is enqueued, delivered,
//! crawled, and on success enqueued again one re-scan interval later. Forks
//! discovered along the way enter the same cycle, staggered so that a burst of
//! forks does not hit the hosting platform all at once. Duplicate suppression
//! is left entirely to the queue.

mod error;

pub use error::JobError;

use crate::Result;
use crate::aggregate::{Aggregator, DatedPushEvents};
use crate::queue::{Job, JobHandler, JobKind, JobPayload, JobQueue, NAME_KEY, NewJob, OWNER_KEY, QueueError, SOURCE_KEY};
use crate::reports::ReportTargets;
use crate::schedule::{Schedule, Trigger, format_schedule, run_until_stopped};
use crate::source::{ClientFactory, Repository, SourceClient, SourceClientRegistry, SourceKind};
use crate::store::CommitStore;
use chrono::{DateTime, TimeDelta, Utc};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, app_err};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const LOG_TARGET: &str = "    worker";

const DEFAULT_JOB_INTERVAL: Duration = Duration::from_hours(1);

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Repositories whose fork networks are crawled.
    pub repositories: Vec<Repository>,

    /// `owner/name` prefixes left out of the aggregated view.
    pub excluded_namespaces: Vec<String>,

    /// How often the queue is polled and the reports refreshed.
    pub job_interval: Duration,

    /// Delay before a successfully crawled repository is crawled again.
    pub rescan_every: Duration,

    /// Gap between the first runs of consecutive forks.
    pub stagger: Duration,

    /// How long [`Worker::stop`] waits for in-flight work.
    pub shutdown_grace: Duration,

    pub reports: ReportTargets,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            excluded_namespaces: Vec::new(),
            job_interval: DEFAULT_JOB_INTERVAL,
            rescan_every: Duration::from_hours(24),
            stagger: Duration::from_mins(1),
            shutdown_grace: Duration::from_secs(30),
            reports: ReportTargets::default(),
        }
    }
}

impl WorkerSettings {
    /// The polling interval, with anything of a second or less replaced by one hour.
    #[must_use]
    pub fn effective_job_interval(&self) -> Duration {
        if self.job_interval <= Duration::from_secs(1) {
            DEFAULT_JOB_INTERVAL
        } else {
            self.job_interval
        }
    }
}

/// Orchestrates crawling of the tracked repositories and their forks.
#[derive(Debug)]
pub struct Worker<Q, F, S>
where
    Q: JobQueue,
    F: ClientFactory,
    S: CommitStore,
{
    settings: WorkerSettings,
    queue: Q,
    registry: SourceClientRegistry<F>,
    store: S,
    aggregator: Aggregator,
    refresher: Mutex<Option<JoinHandle<()>>>,
    stop: watch::Sender<bool>,
}

impl<Q, F, S> Worker<Q, F, S>
where
    Q: JobQueue + 'static,
    F: ClientFactory + 'static,
    S: CommitStore + 'static,
{
    #[must_use]
    pub fn new(settings: WorkerSettings, queue: Q, factory: F, store: S) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            aggregator: Aggregator::new(settings.excluded_namespaces.iter().cloned()),
            settings,
            queue,
            registry: SourceClientRegistry::new(factory),
            store,
            refresher: Mutex::new(None),
            stop,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    #[must_use]
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    /// The recurring schedule derived from the polling interval.
    #[must_use]
    pub fn schedule(&self) -> Schedule {
        format_schedule(self.settings.effective_job_interval())
    }

    /// Enqueue every tracked repository to run now.
    pub async fn sync(&self) -> Result<()> {
        self.sync_at(Utc::now()).await
    }

    /// Enqueue every tracked repository to run at `now`.
    ///
    /// Repositories that already have pending work are left alone.
    pub async fn sync_at(&self, now: DateTime<Utc>) -> Result<()> {
        for repo in &self.settings.repositories {
            self.enqueue_repository(repo, now).await?;
        }

        log::info!(target: LOG_TARGET, "Synced {} tracked repositories", self.settings.repositories.len());
        Ok(())
    }

    async fn enqueue_repository(&self, repo: &Repository, run_after: DateTime<Utc>) -> Result<()> {
        match self.queue.enqueue(NewJob::new(JobPayload::repository(repo), run_after)).await {
            Ok(id) => {
                log::info!(target: LOG_TARGET, "Enqueued {repo} as job {id}");
                Ok(())
            }
            Err(QueueError::Duplicate(existing)) => {
                log::debug!(target: LOG_TARGET, "{repo} is already pending as job {existing}");
                Ok(())
            }
            Err(e) => Err(e).into_app_err_with(|| format!("enqueue of {repo} failed")),
        }
    }

    /// Crawl the repository described by `job`.
    ///
    /// Every fork gets its newer commits saved and is enqueued at
    /// `now + index * stagger`. A failing fork does not stop its siblings, but the
    /// first failure is returned once all forks were visited so the queue retries
    /// the job. The crawled repository itself is only re-enqueued on success.
    pub async fn handle_job_at(&self, job: &Job, now: DateTime<Utc>) -> Result<()> {
        let (source, owner, name) = parse_repository_job(job)?;

        let Some(client) = self.registry.get(source) else {
            return Err(JobError::NoClientForSource(source.to_string()).into());
        };
        let kind = source
            .parse::<SourceKind>()
            .into_app_err_with(|| format!("unknown source '{source}'"))?;
        let repo = Repository::new(kind, owner, name);

        let forks = client
            .list_forks(&repo.owner, &repo.name)
            .await
            .into_app_err_with(|| format!("listing forks of {repo}"))?;
        log::info!(target: LOG_TARGET, "Found {} forks of {repo}", forks.len());

        let mut first_error = None;
        for (index, fork) in forks.iter().enumerate() {
            let run_after = stagger_offset(now, self.settings.stagger, index);

            if let Err(e) = self.update_fork(client.as_ref(), fork, run_after).await {
                log::warn!(target: LOG_TARGET, "Could not update fork {fork}: {e:#}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        self.enqueue_repository(&repo, offset(now, self.settings.rescan_every)).await
    }

    async fn update_fork(&self, client: &F::Client, fork: &Repository, run_after: DateTime<Utc>) -> Result<()> {
        self.save_newer_commits(client, fork)
            .await
            .map_err(|e| e.enrich_with(|| format!("saving newer commits from {fork}")))?;

        self.enqueue_repository(fork, run_after).await
    }

    async fn save_newer_commits(&self, client: &F::Client, repo: &Repository) -> Result<()> {
        let branches = client.list_branches(repo).await.into_app_err("listing branches")?;

        for branch in &branches {
            let commits = client
                .list_commits(repo, branch)
                .await
                .into_app_err_with(|| format!("listing {} commits from {repo}", branch.name))?;

            self.store
                .save_commits(repo, branch, &commits)
                .await
                .map_err(|e| e.enrich("saving commits"))?;
        }

        log::debug!(target: LOG_TARGET, "Saved {} branches of {repo}", branches.len());
        Ok(())
    }

    /// Fetch the recent push activity of every tracked repository and aggregate it.
    ///
    /// Repositories without a usable client are skipped. A repository whose feed
    /// cannot be fetched is logged and skipped, unless every repository fails.
    pub async fn latest_network_events(&self) -> Result<Vec<DatedPushEvents>> {
        let mut events = Vec::new();
        let mut first_error = None;
        let mut succeeded = 0;

        for repo in &self.settings.repositories {
            let Some(client) = self.registry.get(&repo.source.to_string()) else {
                log::warn!(target: LOG_TARGET, "Skipping network of {repo}, no client available");
                continue;
            };

            match client.list_network_push_events(repo).await {
                Ok(found) => {
                    log::debug!(target: LOG_TARGET, "Found {} push events in the network of {repo}", found.len());
                    events.extend(found);
                    succeeded += 1;
                }
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Could not list network events of {repo}: {e}");
                    if first_error.is_none() {
                        first_error = Some(app_err!("listing network events of {repo}: {e}"));
                    }
                }
            }
        }

        if succeeded == 0
            && let Some(e) = first_error
        {
            return Err(e);
        }

        Ok(self.aggregator.aggregate(events))
    }

    /// Aggregate the latest network activity and write the configured reports.
    pub async fn refresh_reports(&self) -> Result<()> {
        if self.settings.reports.is_empty() {
            log::debug!(target: LOG_TARGET, "No reports configured");
            return Ok(());
        }

        let groups = self.latest_network_events().await?;
        self.settings.reports.write(&groups, Utc::now())?;
        log::info!(target: LOG_TARGET, "Refreshed reports covering {} days", groups.len());
        Ok(())
    }

    /// Register the job handler with the queue and start refreshing reports on the same schedule.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let schedule = self.schedule();
        let trigger = Trigger::parse(&schedule)?;

        let mut refresher = self.refresher.lock().unwrap_or_else(PoisonError::into_inner);
        if refresher.is_some() {
            return Err(app_err!("worker is already running"));
        }

        self.queue.start_recurring(&schedule, Arc::clone(self))?;

        let worker = Arc::clone(self);
        let stop = self.stop.subscribe();
        *refresher = Some(tokio::spawn(async move {
            let worker = worker.as_ref();
            run_until_stopped(trigger, stop, move || async move {
                if let Err(e) = worker.refresh_reports().await {
                    log::error!(target: LOG_TARGET, "Could not refresh reports: {e:#}");
                }
            })
            .await;
        }));

        log::info!(
            target: LOG_TARGET,
            "Started crawling {} repositories on schedule '{schedule}'",
            self.settings.repositories.len()
        );
        Ok(())
    }

    /// Stop both recurring paths, waiting at most the shutdown grace period overall.
    pub async fn stop(&self) {
        let grace = self.settings.shutdown_grace;
        let _ = self.stop.send_replace(true);

        let refresher = self.refresher.lock().unwrap_or_else(PoisonError::into_inner).take();
        let refresh_done = async {
            if let Some(handle) = refresher
                && tokio::time::timeout(grace, handle).await.is_err()
            {
                log::warn!(target: LOG_TARGET, "Report refresh still busy after {grace:?}, not waiting any longer");
            }
        };

        let ((), ()) = tokio::join!(self.queue.shutdown(grace), refresh_done);
        log::info!(target: LOG_TARGET, "Stopped");
    }
}

impl<Q, F, S> JobHandler for Worker<Q, F, S>
where
    Q: JobQueue + 'static,
    F: ClientFactory + 'static,
    S: CommitStore + 'static,
{
    async fn handle(&self, job: &Job) -> Result<()> {
        self.handle_job_at(job, Utc::now()).await
    }
}

/// Extract `(source, owner, name)` from a repository job.
fn parse_repository_job(job: &Job) -> core::result::Result<(&str, &str, &str), JobError> {
    let payload = &job.payload;

    let job_type = payload.job_type().ok_or(JobError::MissingJobType(job.id))?;
    if !job_type.parse::<JobKind>().is_ok_and(|kind| kind == JobKind::Repository) {
        return Err(JobError::UnexpectedPayload {
            job: job.id,
            reason: format!("unsupported job type '{job_type}'"),
        });
    }

    let source = payload
        .get(SOURCE_KEY)
        .filter(|s| !s.is_empty())
        .ok_or(JobError::MissingSourceType(job.id))?;

    let field = |key: &str| {
        payload.get(key).filter(|v| !v.is_empty()).ok_or_else(|| JobError::UnexpectedPayload {
            job: job.id,
            reason: format!("missing {key}"),
        })
    };

    Ok((source, field(OWNER_KEY)?, field(NAME_KEY)?))
}

fn offset(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn stagger_offset(now: DateTime<Utc>, stagger: Duration, index: usize) -> DateTime<Utc> {
    let factor = u32::try_from(index).unwrap_or(u32::MAX);
    offset(now, stagger.saturating_mul(factor))
}
