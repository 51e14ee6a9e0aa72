use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};

use batchmon_core::monitor::error::MonitorError;
use batchmon_core::monitor::session::MonitorSession;
use batchmon_core::progress::observer::MonitorObserver;
use batchmon_core::progress::snapshot::{format_clock, DerivedMetrics};
use batchmon_core::types::types::{BatchRun, BatchStatus};

/// Renders a monitored batch as a single indicatif bar, position = percent.
pub struct TerminalMonitorObserver {
    bar: ProgressBar,
}

impl TerminalMonitorObserver {
    pub fn new(run: &BatchRun) -> Self {
        let style = ProgressStyle::with_template(
            "{prefix} [{wide_bar:.cyan/blue}] {pos:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░");

        let bar = ProgressBar::new(100);
        bar.set_style(style);
        bar.set_prefix(format!("[{}]", run.batch_number));
        bar.set_message("waiting for first sample");
        Self { bar }
    }
}

/// `elapsed 00:12  remaining 00:36`, with an overdue marker once the batch
/// runs past its nominal duration.
fn describe(session: &MonitorSession, metrics: &DerivedMetrics) -> String {
    let remaining = metrics
        .estimated_remaining_seconds
        .map(format_clock)
        .unwrap_or_else(|| "--:--".to_string());
    let mut msg = format!(
        "elapsed {}  remaining {}",
        format_clock(metrics.elapsed_seconds),
        remaining
    );
    if session.is_overdue() {
        msg.push_str("  (overdue)");
    }
    msg
}

#[async_trait]
impl MonitorObserver for TerminalMonitorObserver {
    async fn on_metrics(&self, session: &MonitorSession, metrics: &DerivedMetrics) {
        self.bar.set_position(u64::from(metrics.percentage));
        self.bar.set_message(describe(session, metrics));
    }

    async fn on_error(&self, session: &MonitorSession, error: &MonitorError) {
        // Keep the bar alive; the next tick may well succeed.
        self.bar.println(format!(
            "warning: {} ({} failed in a row)",
            error, session.consecutive_failures
        ));
    }

    async fn on_terminal(&self, session: &MonitorSession, status: BatchStatus) {
        let elapsed = format_clock(session.elapsed_ms / 1000);
        match status {
            BatchStatus::Failed => self
                .bar
                .abandon_with_message(format!("FAILED after {}", elapsed)),
            _ => self
                .bar
                .finish_with_message(format!("{} in {}", status, elapsed)),
        }
    }
}
