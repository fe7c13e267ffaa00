use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};

use twtsync_core::settings::{self, Schedule};
use twtsync_sync::pipeline::{self, SyncRequest};
use twtsync_sync::{SyncError, SyncReport};

use crate::error::{io_err, DaemonError};
use crate::status::{self, unix_seconds_now, DaemonStatus, RunSummary};

/// Queued runs beyond this are dropped until the processor catches up.
const QUEUE_DEPTH: usize = 4;

/// What a scheduled run does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// List sync with create and retire over the default window.
    List,
    /// Availability sync over the default window.
    Availability,
}

impl JobKind {
    pub fn request(self) -> SyncRequest {
        match self {
            JobKind::List => SyncRequest::List {
                window: None,
                create_and_retire: true,
            },
            JobKind::Availability => SyncRequest::Availability { window: None },
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::List => f.write_str("list"),
            JobKind::Availability => f.write_str("availability"),
        }
    }
}

/// Executes one sync trigger. Called on a blocking thread.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, request: SyncRequest) -> Result<SyncReport, SyncError>;
}

/// Runs triggers against the live API and the store under `home`.
pub struct LiveRunner {
    home: PathBuf,
}

impl LiveRunner {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        LiveRunner { home: home.into() }
    }
}

impl JobRunner for LiveRunner {
    fn run(&self, request: SyncRequest) -> Result<SyncReport, SyncError> {
        pipeline::run(&self.home, request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonConfig {
    pub list_every: Duration,
    pub availability_every: Duration,
}

impl DaemonConfig {
    pub fn from_schedule(schedule: &Schedule) -> Result<Self, DaemonError> {
        if schedule.list_interval_minutes == 0 || schedule.availability_interval_minutes == 0 {
            return Err(DaemonError::Schedule(
                "intervals must be at least one minute".to_string(),
            ));
        }
        Ok(DaemonConfig {
            list_every: minutes(schedule.list_interval_minutes),
            availability_every: minutes(schedule.availability_interval_minutes),
        })
    }
}

fn minutes(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(60))
}

struct Job {
    kind: JobKind,
    queued_at: Instant,
}

/// Start the daemon and block the current thread until it exits.
pub fn start_blocking(home: &Path, json_logs: bool) -> Result<(), DaemonError> {
    init_tracing(json_logs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon against the live API until ctrl-c.
///
/// Settings are validated before the first tick; a setup error stops the
/// daemon before any sync work.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    let settings = settings::load_at(&home)?;
    pipeline::connect_with(&home, &settings)?;
    let config = DaemonConfig::from_schedule(&settings.schedule)?;
    tracing::info!(
        mode = ?settings.api_mode,
        list_every_secs = config.list_every.as_secs(),
        availability_every_secs = config.availability_every.as_secs(),
        "daemon starting",
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => match signal {
                    Ok(()) => {
                        tracing::info!("received ctrl-c, shutting down daemon");
                        let _ = shutdown.send(());
                        Ok(())
                    }
                    Err(err) => Err(DaemonError::Task {
                        task: "signal_handler",
                        message: err.to_string(),
                    }),
                },
            }
        })
    };

    let runner: Arc<dyn JobRunner> = Arc::new(LiveRunner::new(home.clone()));
    let result = run_with(home, config, runner, shutdown_tx.clone()).await;
    let _ = shutdown_tx.send(());
    handle_join("signal_handler", signal_handle.await)?;
    result
}

/// Scheduler and processor with an injected runner. Returns after a message
/// on `shutdown_tx`.
pub async fn run_with(
    home: PathBuf,
    config: DaemonConfig,
    runner: Arc<dyn JobRunner>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (job_tx, job_rx) = mpsc::channel::<Job>(QUEUE_DEPTH);

    let scheduler_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = scheduler_task(config, job_tx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let processor_handle = {
        let shutdown = shutdown_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = processor_task(home, runner, job_rx, shutdown_rx).await;
            let _ = shutdown.send(());
            result
        })
    };

    let (scheduler_result, processor_result) = tokio::join!(scheduler_handle, processor_handle);
    handle_join("scheduler", scheduler_result)?;
    handle_join("processor", processor_result)?;
    Ok(())
}

async fn scheduler_task(
    config: DaemonConfig,
    job_tx: mpsc::Sender<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut list = tokio::time::interval(config.list_every);
    let mut availability = tokio::time::interval(config.availability_every);
    list.set_missed_tick_behavior(MissedTickBehavior::Skip);
    availability.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let kind = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = list.tick() => JobKind::List,
            _ = availability.tick() => JobKind::Availability,
        };
        let job = Job {
            kind,
            queued_at: Instant::now(),
        };
        match job_tx.try_send(job) {
            Ok(()) => tracing::debug!(job = %kind, "sync run queued"),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(job = %kind, "sync queue full, skipping this tick")
            }
            Err(TrySendError::Closed(_)) => break,
        }
    }
    Ok(())
}

async fn processor_task(
    home: PathBuf,
    runner: Arc<dyn JobRunner>,
    mut job_rx: mpsc::Receiver<Job>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut status = DaemonStatus::starting_now();
    persist_status(&home, &status).await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let waited = job.queued_at.elapsed();
                let kind = job.kind;
                let runner = runner.clone();
                let summary = tokio::task::spawn_blocking(move || {
                    let started = std::time::Instant::now();
                    let request = kind.request();
                    let outcome = runner.run(request.clone());
                    summarize(kind, &request, outcome, started.elapsed())
                })
                .await
                .map_err(|err| DaemonError::Task {
                    task: "sync run",
                    message: err.to_string(),
                })?;

                if summary.completed && summary.failed == 0 {
                    tracing::info!(
                        job = %summary.job,
                        succeeded = summary.succeeded,
                        excluded = summary.excluded,
                        duration_ms = summary.duration_ms,
                        waited_ms = waited.as_millis() as u64,
                        "{}",
                        summary.message,
                    );
                } else {
                    tracing::error!(
                        job = %summary.job,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        duration_ms = summary.duration_ms,
                        "{}",
                        summary.message,
                    );
                }
                status.record(summary);
                persist_status(&home, &status).await;
            }
        }
    }

    Ok(())
}

fn summarize(
    job: JobKind,
    request: &SyncRequest,
    outcome: Result<SyncReport, SyncError>,
    duration: Duration,
) -> RunSummary {
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
    let finished_at_unix = unix_seconds_now();
    match outcome {
        Ok(report) => RunSummary {
            job,
            finished_at_unix,
            duration_ms,
            succeeded: report.succeeded(),
            failed: report.failed(),
            excluded: report.excluded.len(),
            message: request.status_message(&report),
            completed: true,
        },
        Err(err) => RunSummary {
            job,
            finished_at_unix,
            duration_ms,
            succeeded: 0,
            failed: 0,
            excluded: 0,
            message: format!("{job} sync aborted: {err}"),
            completed: false,
        },
    }
}

async fn persist_status(home: &Path, status: &DaemonStatus) {
    let home = home.to_path_buf();
    let status = status.clone();
    let saved = tokio::task::spawn_blocking(move || status::save_at(&home, &status)).await;
    match saved {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(error = %err, "failed to write daemon status"),
        Err(err) => tracing::warn!(error = %err, "daemon status task failed"),
    }
}

fn handle_join(
    task: &'static str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Task {
            task,
            message: err.to_string(),
        }),
    }
}

/// Install the `tracing` subscriber. `RUST_LOG` overrides the `info` default;
/// `log` records from the library crates are bridged.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use tempfile::TempDir;
    use twtsync_sync::Operation;

    #[derive(Default)]
    struct RecordingRunner {
        seen: Mutex<Vec<SyncRequest>>,
        fail_lists: bool,
    }

    impl RecordingRunner {
        fn count(&self, kind: JobKind) -> usize {
            let wanted = kind.request();
            self.seen
                .lock()
                .expect("lock")
                .iter()
                .filter(|r| **r == wanted)
                .count()
        }
    }

    impl JobRunner for RecordingRunner {
        fn run(&self, request: SyncRequest) -> Result<SyncReport, SyncError> {
            self.seen.lock().expect("lock").push(request.clone());
            match request {
                SyncRequest::List { .. } if self.fail_lists => {
                    Err(SyncError::RequestSetup("api_key is malformed".into()))
                }
                SyncRequest::List { .. } => Ok(SyncReport::new(Operation::SyncList)),
                _ => Ok(SyncReport::new(Operation::SyncAvailability)),
            }
        }
    }

    fn config() -> DaemonConfig {
        DaemonConfig {
            list_every: Duration::from_secs(60 * 60),
            availability_every: Duration::from_secs(5 * 60),
        }
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn intervals_drive_list_and_availability_runs() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(RecordingRunner::default());
        let (shutdown_tx, _) = broadcast::channel::<()>(4);

        let daemon = tokio::spawn(run_with(
            home.path().to_path_buf(),
            config(),
            runner.clone(),
            shutdown_tx.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(11 * 60)).await;
        shutdown_tx.send(()).expect("shutdown");
        daemon.await.expect("join").expect("daemon");

        assert_eq!(runner.count(JobKind::List), 1, "list runs at start only");
        assert_eq!(runner.count(JobKind::Availability), 3, "at 0, 5 and 10 minutes");
        assert_eq!(
            runner.seen.lock().expect("lock")[0],
            JobKind::List.request(),
            "list sync goes first"
        );

        let status = status::load_at(home.path()).expect("load").expect("written");
        assert_eq!(status.runs, 4);
        assert!(status.last_list.expect("list run").completed);
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn aborted_run_does_not_stop_the_daemon() {
        let home = TempDir::new().expect("home");
        let runner = Arc::new(RecordingRunner {
            fail_lists: true,
            ..RecordingRunner::default()
        });
        let (shutdown_tx, _) = broadcast::channel::<()>(4);

        let daemon = tokio::spawn(run_with(
            home.path().to_path_buf(),
            config(),
            runner.clone(),
            shutdown_tx.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(6 * 60)).await;
        shutdown_tx.send(()).expect("shutdown");
        daemon.await.expect("join").expect("daemon keeps running");

        assert_eq!(runner.count(JobKind::Availability), 2);
        let status = status::load_at(home.path()).expect("load").expect("written");
        let list = status.last_list.expect("list run recorded");
        assert!(!list.completed);
        assert!(list.message.contains("api_key is malformed"));
        assert!(status.last_availability.expect("availability").completed);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let schedule = Schedule {
            availability_interval_minutes: 0,
            ..Schedule::default()
        };
        assert!(matches!(
            DaemonConfig::from_schedule(&schedule),
            Err(DaemonError::Schedule(_))
        ));
        let config = DaemonConfig::from_schedule(&Schedule::default()).expect("defaults");
        assert!(config.availability_every < config.list_every);
    }

    #[test]
    fn scheduled_list_runs_create_and_retire() {
        assert_eq!(
            JobKind::List.request(),
            SyncRequest::List {
                window: None,
                create_and_retire: true
            }
        );
    }

    #[test]
    fn daemon_refuses_to_start_without_settings() {
        let home = TempDir::new().expect("home");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let err = runtime
            .block_on(run(home.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(err, DaemonError::Settings(_)));
    }
}
