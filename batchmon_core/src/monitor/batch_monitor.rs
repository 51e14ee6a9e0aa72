use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, OptionFuture};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::config::MonitorConfig;
use super::error::MonitorError;
use super::session::{MonitorSession, MonitorState};
use crate::progress::estimator::{ProgressEstimator, SampleOrigin};
use crate::progress::notifier::MonitorNotifier;
use crate::progress::observer::MonitorObserver;
use crate::progress::snapshot::DerivedMetrics;
use crate::source::progress_source::BatchProgressSource;
use crate::types::types::{BatchId, BatchRun, BatchStatus, ProgressSample, SourceError};

/// A fetch tagged with the generation it was issued under.
type InFlight = BoxFuture<'static, (u64, Result<ProgressSample, SourceError>)>;

struct Inner {
    session: MonitorSession,
    /// Bumped for every scheduled fetch; only the newest tick may apply.
    /// Manual fetches borrow the current value, so they never invalidate a
    /// tick already in flight but are dropped once a newer tick is issued.
    generation: u64,
}

/// What a finished fetch did to the session, decided under the lock and
/// reported to observers after it is released.
enum Outcome {
    Applied {
        session: MonitorSession,
        metrics: DerivedMetrics,
        terminal: Option<BatchStatus>,
    },
    Failed {
        session: MonitorSession,
        error: MonitorError,
    },
    Discarded,
}

struct Shared {
    session_id: String,
    batch_id: BatchId,
    config: MonitorConfig,
    source: Arc<dyn BatchProgressSource>,
    notifier: MonitorNotifier,
    inner: Mutex<Inner>,
    cancel: CancellationToken,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Nothing panics while holding the lock, but a poisoned session is
        // still consistent, so keep serving it.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tag a fetch with its generation and build it, or `None` when the
    /// session no longer accepts fetches of this origin. Only scheduled
    /// fetches claim a new generation.
    fn issue_fetch(&self, origin: SampleOrigin) -> Option<InFlight> {
        let generation = {
            let mut inner = self.lock();
            let accepts = match origin {
                SampleOrigin::Scheduled => inner.session.state == MonitorState::Polling,
                SampleOrigin::Manual => inner.session.state != MonitorState::Stopped,
            };
            if !accepts {
                return None;
            }
            if origin == SampleOrigin::Scheduled {
                inner.generation += 1;
            }
            inner.generation
        };

        let source = Arc::clone(&self.source);
        let batch_id = self.batch_id.clone();
        let timeout = self.config.fetch_timeout();
        Some(
            async move {
                let result = match tokio::time::timeout(timeout, source.fetch_progress(&batch_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::Timeout(timeout)),
                };
                (generation, result)
            }
            .boxed(),
        )
    }

    /// Apply a finished fetch and notify observers.
    ///
    /// Results from superseded generations, or arriving after the session
    /// stopped, are dropped and reported as `Ok(None)`.
    async fn complete_fetch(
        &self,
        generation: u64,
        result: Result<ProgressSample, SourceError>,
        origin: SampleOrigin,
    ) -> Result<Option<DerivedMetrics>, MonitorError> {
        let outcome = {
            let mut inner = self.lock();
            let live = match origin {
                SampleOrigin::Scheduled => inner.session.state == MonitorState::Polling,
                SampleOrigin::Manual => inner.session.state != MonitorState::Stopped,
            };
            if !live || generation != inner.generation {
                Outcome::Discarded
            } else {
                match result {
                    Ok(sample) => {
                        let (next, metrics) =
                            ProgressEstimator::apply(&inner.session, &sample, origin);
                        inner.session = next;
                        let terminal = sample.status.is_terminal().then_some(sample.status);
                        if terminal.is_some() {
                            inner.session.state = MonitorState::Stopped;
                            self.cancel.cancel();
                        }
                        Outcome::Applied {
                            session: inner.session.clone(),
                            metrics,
                            terminal,
                        }
                    }
                    Err(err) => {
                        let error = MonitorError::Fetch(err);
                        inner.session =
                            ProgressEstimator::record_failure(&inner.session, &error.to_string());
                        Outcome::Failed {
                            session: inner.session.clone(),
                            error,
                        }
                    }
                }
            }
        };

        match outcome {
            Outcome::Applied {
                session,
                metrics,
                terminal,
            } => {
                log::debug!(
                    "[batch_monitor] session={} batch={}: {}% elapsed={}s remaining={:?}",
                    self.session_id,
                    self.batch_id,
                    metrics.percentage,
                    metrics.elapsed_seconds,
                    metrics.estimated_remaining_seconds
                );
                self.notifier.metrics(&session, &metrics).await;
                if let Some(status) = terminal {
                    log::info!(
                        "[batch_monitor] session={} batch={}: reached {}, polling stopped",
                        self.session_id,
                        self.batch_id,
                        status
                    );
                    self.notifier.terminal(&session, status).await;
                }
                Ok(Some(metrics))
            }
            Outcome::Failed { session, error } => {
                log::warn!(
                    "[batch_monitor] session={} batch={}: {} (failures in a row: {})",
                    self.session_id,
                    self.batch_id,
                    error,
                    session.consecutive_failures
                );
                self.notifier.error(&session, &error).await;
                Err(error)
            }
            Outcome::Discarded => {
                log::debug!(
                    "[batch_monitor] session={} batch={}: dropped stale result of generation {}",
                    self.session_id,
                    self.batch_id,
                    generation
                );
                Ok(None)
            }
        }
    }
}

/// Polls one batch run and keeps its `MonitorSession` up to date.
///
/// # Lifecycle
///
/// | Call / event             | State change                    |
/// |--------------------------|---------------------------------|
/// | `start()`                | IDLE → POLLING                  |
/// | `stop()` or drop         | POLLING → STOPPED               |
/// | COMPLETED/FAILED sample  | POLLING → STOPPED               |
/// | `start()` when STOPPED   | rejected, `InvalidTransition`   |
///
/// The polling task only holds a weak reference to the session; dropping
/// the monitor stops it.
pub struct BatchMonitor {
    shared: Arc<Shared>,
}

pub struct BatchMonitorBuilder {
    source: Arc<dyn BatchProgressSource>,
    batch_id: BatchId,
    config: MonitorConfig,
    notifier: MonitorNotifier,
}

impl BatchMonitorBuilder {
    fn new(source: Arc<dyn BatchProgressSource>, batch_id: BatchId) -> Self {
        Self {
            source,
            batch_id,
            config: MonitorConfig::default(),
            notifier: MonitorNotifier::new(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.with_poll_interval(interval);
        self
    }

    pub fn with_nominal_duration(mut self, duration: Duration) -> Self {
        self.config = self.config.with_nominal_duration(duration);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_fetch_timeout(timeout);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn MonitorObserver>) -> Self {
        self.notifier.add_observer(observer);
        self
    }

    pub fn build(self) -> BatchMonitor {
        let session = MonitorSession::new(
            self.batch_id.clone(),
            self.config.poll_interval(),
            self.config.nominal_duration(),
        );
        BatchMonitor {
            shared: Arc::new(Shared {
                session_id: Uuid::new_v4().to_string(),
                batch_id: self.batch_id,
                config: self.config,
                source: self.source,
                notifier: self.notifier,
                inner: Mutex::new(Inner {
                    session,
                    generation: 0,
                }),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Build the monitor and start polling right away.
    pub fn start(self) -> Result<BatchMonitor, MonitorError> {
        let monitor = self.build();
        monitor.start()?;
        Ok(monitor)
    }
}

impl BatchMonitor {
    pub fn builder(source: Arc<dyn BatchProgressSource>, batch_id: BatchId) -> BatchMonitorBuilder {
        BatchMonitorBuilder::new(source, batch_id)
    }

    /// Builder for a registry record, or `None` unless the run is RUNNING;
    /// pending and finished runs have nothing to poll.
    pub fn for_run(
        source: Arc<dyn BatchProgressSource>,
        run: &BatchRun,
    ) -> Option<BatchMonitorBuilder> {
        (run.status == BatchStatus::Running).then(|| BatchMonitorBuilder::new(source, run.id.clone()))
    }

    /// Unique id of this monitoring session, for log correlation.
    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn batch_id(&self) -> &BatchId {
        &self.shared.batch_id
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.shared.config
    }

    /// Snapshot of the session as of now.
    pub fn session(&self) -> MonitorSession {
        self.shared.lock().session.clone()
    }

    pub fn state(&self) -> MonitorState {
        self.shared.lock().session.state
    }

    /// Begin polling every `poll_interval`, first fetch one interval from
    /// now. A no-op while already polling; a stopped monitor cannot be
    /// restarted.
    pub fn start(&self) -> Result<(), MonitorError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| MonitorError::NoRuntime)?;

        {
            let mut inner = self.shared.lock();
            match inner.session.state {
                MonitorState::Polling => return Ok(()),
                MonitorState::Stopped => {
                    return Err(MonitorError::InvalidTransition {
                        action: "start",
                        state: MonitorState::Stopped,
                    })
                }
                MonitorState::Idle => inner.session.state = MonitorState::Polling,
            }
        }

        let period = self.shared.config.poll_interval();
        log::info!(
            "[batch_monitor] session={} batch={}: polling every {:?} ({} observers)",
            self.shared.session_id,
            self.shared.batch_id,
            period,
            self.shared.notifier.observer_count()
        );
        let _ = runtime.spawn(poll_loop(
            Arc::downgrade(&self.shared),
            self.shared.cancel.clone(),
            period,
        ));
        Ok(())
    }

    /// Stop polling. Once this returns no fetch is issued and no result is
    /// applied. Idempotent; a never-started monitor stays IDLE.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        if inner.session.state == MonitorState::Polling {
            inner.session.state = MonitorState::Stopped;
            self.shared.cancel.cancel();
            log::info!(
                "[batch_monitor] session={} batch={}: stopped",
                self.shared.session_id,
                self.shared.batch_id
            );
        }
    }

    /// Fetch once, outside the schedule, and apply the result like a tick
    /// would, except that elapsed time does not advance.
    ///
    /// Returns `Ok(None)` when a scheduled tick was issued meanwhile or the
    /// monitor stopped. The recurring schedule is untouched, and a tick
    /// already in flight still applies when it lands.
    pub async fn refresh_now(&self) -> Result<Option<DerivedMetrics>, MonitorError> {
        let fetch = self
            .shared
            .issue_fetch(SampleOrigin::Manual)
            .ok_or(MonitorError::InvalidTransition {
                action: "refresh",
                state: MonitorState::Stopped,
            })?;
        let (generation, result) = fetch.await;
        self.shared
            .complete_fetch(generation, result, SampleOrigin::Manual)
            .await
    }

    /// Resolves once polling has stopped, by `stop()` or a terminal sample.
    /// Never resolves for a monitor that is not started.
    pub async fn stopped(&self) {
        self.shared.cancel.cancelled().await;
    }
}

impl Drop for BatchMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The recurring schedule. One fetch is in flight at most: a tick that finds
/// the previous fetch still running drops it and issues a fresh one.
async fn poll_loop(weak: Weak<Shared>, cancel: CancellationToken, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: Option<InFlight> = None;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let Some(shared) = weak.upgrade() else { break };
                if in_flight.is_some() {
                    log::debug!(
                        "[batch_monitor] session={} batch={}: previous fetch still running, superseding it",
                        shared.session_id,
                        shared.batch_id
                    );
                }
                match shared.issue_fetch(SampleOrigin::Scheduled) {
                    Some(fetch) => in_flight = Some(fetch),
                    None => break,
                }
            }

            Some((generation, result)) = OptionFuture::from(in_flight.as_mut()), if in_flight.is_some() => {
                in_flight = None;
                let Some(shared) = weak.upgrade() else { break };
                // Failures were already recorded and reported; the schedule
                // carries on regardless.
                let _ = shared
                    .complete_fetch(generation, result, SampleOrigin::Scheduled)
                    .await;
            }
        }
    }
}
