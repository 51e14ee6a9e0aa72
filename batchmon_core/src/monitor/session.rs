use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::progress::snapshot::DerivedMetrics;
use crate::types::types::{BatchId, ProgressSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitorState {
    Idle,
    Polling,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MonitorState::Idle => "IDLE",
            MonitorState::Polling => "POLLING",
            MonitorState::Stopped => "STOPPED",
        };
        f.pad(s)
    }
}

/// Monitoring state for one batch run.
///
/// Owned by a single `BatchMonitor`; hosts only ever see clones of it.
/// `elapsed_ms` advances in whole poll intervals, one per applied scheduled
/// sample, and never from wall-clock deltas.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSession {
    pub batch_id: BatchId,
    pub poll_interval_ms: u64,
    pub nominal_duration_ms: u64,
    pub state: MonitorState,
    pub last_sample: Option<ProgressSample>,
    pub last_metrics: Option<DerivedMetrics>,
    pub elapsed_ms: u64,
    pub last_error: Option<String>,
    /// Failed fetches since the last applied sample.
    pub consecutive_failures: u32,
}

impl MonitorSession {
    pub fn new(batch_id: BatchId, poll_interval: Duration, nominal_duration: Duration) -> Self {
        Self {
            batch_id,
            poll_interval_ms: duration_ms(poll_interval),
            nominal_duration_ms: duration_ms(nominal_duration),
            state: MonitorState::Idle,
            last_sample: None,
            last_metrics: None,
            elapsed_ms: 0,
            last_error: None,
            consecutive_failures: 0,
        }
    }

    /// True once the batch has been polled for longer than its nominal
    /// duration without reaching a terminal status.
    pub fn is_overdue(&self) -> bool {
        self.elapsed_ms > self.nominal_duration_ms
            && !self
                .last_sample
                .as_ref()
                .is_some_and(|s| s.status.is_terminal())
    }
}

/// Milliseconds of `d`, saturating, never zero.
fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX).max(1)
}
