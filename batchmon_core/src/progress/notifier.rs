use std::sync::Arc;

use super::observer::MonitorObserver;
use super::snapshot::DerivedMetrics;
use crate::monitor::error::MonitorError;
use crate::monitor::session::MonitorSession;
use crate::types::types::BatchStatus;

/// Fans monitor outcomes out to every registered observer, in registration
/// order. Holds no session state of its own.
#[derive(Clone, Default)]
pub struct MonitorNotifier {
    observers: Vec<Arc<dyn MonitorObserver>>,
}

impl MonitorNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Must be called before the monitor is built.
    pub fn add_observer(&mut self, observer: Arc<dyn MonitorObserver>) {
        self.observers.push(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub async fn metrics(&self, session: &MonitorSession, metrics: &DerivedMetrics) {
        for observer in &self.observers {
            observer.on_metrics(session, metrics).await;
        }
    }

    pub async fn error(&self, session: &MonitorSession, error: &MonitorError) {
        for observer in &self.observers {
            observer.on_error(session, error).await;
        }
    }

    pub async fn terminal(&self, session: &MonitorSession, status: BatchStatus) {
        for observer in &self.observers {
            observer.on_terminal(session, status).await;
        }
    }
}
