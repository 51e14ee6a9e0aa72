use crate::monitor::session::MonitorSession;
use crate::progress::snapshot::DerivedMetrics;
use crate::types::types::ProgressSample;

/// Where a sample came from. Only scheduled samples advance elapsed time,
/// which tracks poll cycles rather than wall-clock deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOrigin {
    Scheduled,
    Manual,
}

/// Pure reducer turning successive samples into derived metrics.
///
/// Stateless itself: all state lives in the `MonitorSession` it is handed,
/// and a new session is returned rather than mutated in place.
pub struct ProgressEstimator;

impl ProgressEstimator {
    /// Apply one sample to `session`.
    ///
    /// Repeated samples without progress still advance `elapsed_ms`, so the
    /// remaining estimate grows while a batch stalls.
    pub fn apply(
        session: &MonitorSession,
        sample: &ProgressSample,
        origin: SampleOrigin,
    ) -> (MonitorSession, DerivedMetrics) {
        let mut next = session.clone();

        if origin == SampleOrigin::Scheduled {
            next.elapsed_ms = next.elapsed_ms.saturating_add(next.poll_interval_ms);
        }

        let percentage = percentage(sample.current_quantity, sample.target_quantity);
        let metrics = DerivedMetrics {
            percentage,
            elapsed_seconds: next.elapsed_ms / 1000,
            estimated_remaining_seconds: remaining_seconds(next.elapsed_ms, percentage),
        };

        next.last_sample = Some(sample.clone());
        next.last_metrics = Some(metrics);
        next.last_error = None;
        next.consecutive_failures = 0;

        (next, metrics)
    }

    /// Record a failed fetch. Metrics and elapsed time are left untouched.
    pub fn record_failure(session: &MonitorSession, error: &str) -> MonitorSession {
        let mut next = session.clone();
        next.last_error = Some(error.to_string());
        next.consecutive_failures = next.consecutive_failures.saturating_add(1);
        next
    }
}

/// `round(100 * current / target)` clamped to `0..=100`; zero when there is
/// no positive target or the ratio is undefined.
pub fn percentage(current_quantity: f64, target_quantity: f64) -> u8 {
    if target_quantity.is_nan() || target_quantity <= 0.0 {
        return 0;
    }
    let ratio = (100.0 * current_quantity / target_quantity).round();
    if ratio.is_nan() {
        return 0;
    }
    ratio.clamp(0.0, 100.0) as u8
}

/// Linear extrapolation: at `percentage` done after `elapsed_ms`, the batch
/// needs `elapsed_ms * (100 - p) / p` more. Rounded up to whole seconds.
fn remaining_seconds(elapsed_ms: u64, percentage: u8) -> Option<u64> {
    if percentage == 0 {
        return None;
    }
    let p = u128::from(percentage);
    let remaining_ms = u128::from(elapsed_ms) * (100 - p);
    let seconds = remaining_ms.div_ceil(p * 1000);
    Some(u64::try_from(seconds).unwrap_or(u64::MAX))
}
