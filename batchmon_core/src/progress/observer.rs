use async_trait::async_trait;
use tokio::sync::mpsc;

use super::snapshot::DerivedMetrics;
use crate::monitor::error::MonitorError;
use crate::monitor::session::MonitorSession;
use crate::types::types::BatchStatus;

/// Trait for anything that wants to observe a batch monitor.
///
/// The `MonitorNotifier` calls these after each fetch has been applied to the
/// session, so `session` already reflects the outcome being reported.
///
/// Lifecycle:
/// - `on_metrics` is called for every applied sample, terminal ones included.
/// - `on_error` is called for every failed fetch; polling carries on.
/// - `on_terminal` is called once, right after the `on_metrics` of the
///   sample that reached COMPLETED or FAILED. The monitor is already stopped.
#[async_trait]
pub trait MonitorObserver: Send + Sync + 'static {
    async fn on_metrics(&self, session: &MonitorSession, metrics: &DerivedMetrics);

    async fn on_error(&self, session: &MonitorSession, error: &MonitorError);

    async fn on_terminal(&self, session: &MonitorSession, status: BatchStatus);
}

/// Event form of the observer callbacks, for hosts that prefer a stream.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Metrics {
        session: MonitorSession,
        metrics: DerivedMetrics,
    },
    Error {
        session: MonitorSession,
        message: String,
    },
    Terminal {
        session: MonitorSession,
        status: BatchStatus,
    },
}

enum EventSender {
    Unbounded(mpsc::UnboundedSender<MonitorEvent>),
    Bounded(mpsc::Sender<MonitorEvent>),
}

/// Forwards every callback into an mpsc channel as a `MonitorEvent`.
pub struct ChannelObserver {
    tx: EventSender,
}

impl ChannelObserver {
    /// Observer backed by an unbounded channel. Nothing is ever dropped, so
    /// the queue grows for as long as the receiver is not drained; prefer
    /// `bounded` for long-lived monitors.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MonitorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: EventSender::Unbounded(tx),
            },
            rx,
        )
    }

    /// Observer backed by a channel holding at most `capacity` events.
    /// Events that arrive while it is full are dropped, never awaited, so a
    /// slow reader cannot stall polling.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<MonitorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: EventSender::Bounded(tx),
            },
            rx,
        )
    }

    fn send(&self, event: MonitorEvent) {
        // Failing sends mean the receiver is gone or full; nobody is waiting.
        match &self.tx {
            EventSender::Unbounded(tx) => {
                let _ = tx.send(event);
            }
            EventSender::Bounded(tx) => {
                if let Err(mpsc::error::TrySendError::Full(event)) = tx.try_send(event) {
                    log::debug!("[observer] event channel full, dropping {:?}", event);
                }
            }
        }
    }
}

#[async_trait]
impl MonitorObserver for ChannelObserver {
    async fn on_metrics(&self, session: &MonitorSession, metrics: &DerivedMetrics) {
        self.send(MonitorEvent::Metrics {
            session: session.clone(),
            metrics: *metrics,
        });
    }

    async fn on_error(&self, session: &MonitorSession, error: &MonitorError) {
        self.send(MonitorEvent::Error {
            session: session.clone(),
            message: error.to_string(),
        });
    }

    async fn on_terminal(&self, session: &MonitorSession, status: BatchStatus) {
        self.send(MonitorEvent::Terminal {
            session: session.clone(),
            status,
        });
    }
}
