use std::time::Duration;

use batchmon_core::monitor::session::{MonitorSession, MonitorState};
use batchmon_core::progress::estimator::{percentage, ProgressEstimator, SampleOrigin};
use batchmon_core::progress::snapshot::format_clock;
use batchmon_core::types::types::{BatchId, BatchStatus, ProgressSample};

/// Helper: a fresh session polling every `interval_ms`, 60 s nominal.
fn session(interval_ms: u64) -> MonitorSession {
    MonitorSession::new(
        BatchId::from(1),
        Duration::from_millis(interval_ms),
        Duration::from_secs(60),
    )
}

fn sample(status: BatchStatus, target: f64, current: f64) -> ProgressSample {
    ProgressSample::new(BatchId::from(1), status, target, current)
}

// ---------------------------------------------------------------
// percentage
// ---------------------------------------------------------------

#[test]
fn test_percentage_rounds_to_nearest() {
    assert_eq!(percentage(1.0, 3.0), 33);
    assert_eq!(percentage(2.0, 3.0), 67);
    assert_eq!(percentage(0.5, 100.0), 1);
    assert_eq!(percentage(0.4, 100.0), 0);
}

#[test]
fn test_percentage_clamped_on_overshoot() {
    for current in [100.0, 100.4, 101.0, 150.0, 1e12] {
        assert_eq!(percentage(current, 100.0), 100, "current={}", current);
    }
}

#[test]
fn test_percentage_always_within_bounds() {
    let targets = [0.001, 0.5, 1.0, 7.0, 100.0, 2500.0];
    let currents = [0.0, 0.0001, 0.3, 1.0, 6.9, 99.5, 100.0, 3000.0, 1e9];
    for target in targets {
        for current in currents {
            let p = percentage(current, target);
            assert!(p <= 100, "target={} current={} gave {}", target, current, p);
        }
    }
}

#[test]
fn test_percentage_zero_target_is_zero() {
    for current in [0.0, 1.0, 50.0, 1e6] {
        assert_eq!(percentage(current, 0.0), 0);
    }
}

#[test]
fn test_percentage_nan_inputs_are_zero() {
    assert_eq!(percentage(f64::NAN, 100.0), 0);
    assert_eq!(percentage(10.0, f64::NAN), 0);
}

// ---------------------------------------------------------------
// ProgressEstimator::apply
// ---------------------------------------------------------------

#[test]
fn test_scheduled_sample_advances_elapsed_by_interval() {
    let s = session(2000);
    let (next, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 25.0), SampleOrigin::Scheduled);

    assert_eq!(next.elapsed_ms, 2000);
    assert_eq!(metrics.percentage, 25);
    assert_eq!(metrics.elapsed_seconds, 2);
    // 2 s for 25 % → 8 s total → 6 s left.
    assert_eq!(metrics.estimated_remaining_seconds, Some(6));
    // input session untouched
    assert_eq!(s.elapsed_ms, 0);
    assert!(s.last_sample.is_none());
}

#[test]
fn test_manual_sample_does_not_advance_elapsed() {
    let s = session(2000);
    let (s, _) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 10.0), SampleOrigin::Scheduled);
    let (s, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 20.0), SampleOrigin::Manual);

    assert_eq!(s.elapsed_ms, 2000);
    assert_eq!(metrics.percentage, 20);
    assert_eq!(metrics.elapsed_seconds, 2);
    assert_eq!(metrics.estimated_remaining_seconds, Some(8));
}

#[test]
fn test_remaining_absent_until_progress() {
    let s = session(2000);
    let (s, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 0.0), SampleOrigin::Scheduled);
    assert_eq!(metrics.percentage, 0);
    assert_eq!(metrics.estimated_remaining_seconds, None);

    let (_, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 5.0), SampleOrigin::Scheduled);
    assert_eq!(metrics.percentage, 5);
    // 4 s for 5 % → 80 s total → 76 s left.
    assert_eq!(metrics.estimated_remaining_seconds, Some(76));
}

#[test]
fn test_remaining_rounds_up_to_whole_seconds() {
    let s = session(1500);
    let (_, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 3.0, 1.0), SampleOrigin::Scheduled);
    // 33 %: 1500 * 67 / 33 = 3045.45 ms → 4 s
    assert_eq!(metrics.percentage, 33);
    assert_eq!(metrics.elapsed_seconds, 1);
    assert_eq!(metrics.estimated_remaining_seconds, Some(4));
}

#[test]
fn test_complete_sample_has_zero_remaining() {
    let s = session(2000);
    let (_, metrics) =
        ProgressEstimator::apply(&s, &sample(BatchStatus::Completed, 100.0, 120.0), SampleOrigin::Scheduled);
    assert_eq!(metrics.percentage, 100);
    assert_eq!(metrics.estimated_remaining_seconds, Some(0));
}

#[test]
fn test_zero_target_never_estimates() {
    let mut s = session(2000);
    for current in [0.0, 10.0, 500.0] {
        let (next, metrics) =
            ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 0.0, current), SampleOrigin::Scheduled);
        assert_eq!(metrics.percentage, 0);
        assert_eq!(metrics.estimated_remaining_seconds, None);
        s = next;
    }
    assert_eq!(s.elapsed_ms, 6000);
}

#[test]
fn test_constant_progress_grows_the_estimate() {
    let mut s = session(2000);
    let mut elapsed = Vec::new();
    let mut remaining = Vec::new();

    for _ in 0..5 {
        let (next, metrics) =
            ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 40.0), SampleOrigin::Scheduled);
        assert_eq!(metrics.percentage, 40);
        elapsed.push(metrics.elapsed_seconds);
        remaining.push(metrics.estimated_remaining_seconds.unwrap());
        s = next;
    }

    assert_eq!(elapsed, vec![2, 4, 6, 8, 10]);
    assert_eq!(remaining, vec![3, 6, 9, 12, 15]);
    assert!(remaining.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_apply_clears_error_and_records_sample() {
    let s = ProgressEstimator::record_failure(&session(2000), "connection refused");
    let s = ProgressEstimator::record_failure(&s, "connection refused");
    assert_eq!(s.consecutive_failures, 2);
    assert_eq!(s.last_error.as_deref(), Some("connection refused"));

    let reading = sample(BatchStatus::Running, 100.0, 30.0);
    let (s, metrics) = ProgressEstimator::apply(&s, &reading, SampleOrigin::Scheduled);
    assert_eq!(s.last_error, None);
    assert_eq!(s.consecutive_failures, 0);
    assert_eq!(s.last_sample, Some(reading));
    assert_eq!(s.last_metrics, Some(metrics));
}

#[test]
fn test_record_failure_leaves_metrics_alone() {
    let (s, metrics) = ProgressEstimator::apply(
        &session(2000),
        &sample(BatchStatus::Running, 100.0, 25.0),
        SampleOrigin::Scheduled,
    );
    let failed = ProgressEstimator::record_failure(&s, "timeout");
    assert_eq!(failed.elapsed_ms, 2000);
    assert_eq!(failed.last_metrics, Some(metrics));
    assert_eq!(failed.state, MonitorState::Idle);
}

// ---------------------------------------------------------------
// MonitorSession / format_clock
// ---------------------------------------------------------------

#[test]
fn test_session_overdue_after_nominal_duration() {
    let mut s = MonitorSession::new(
        BatchId::from(1),
        Duration::from_secs(2),
        Duration::from_secs(4),
    );
    for _ in 0..2 {
        s = ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 10.0), SampleOrigin::Scheduled).0;
    }
    assert!(!s.is_overdue(), "exactly at nominal duration is not overdue");

    s = ProgressEstimator::apply(&s, &sample(BatchStatus::Running, 100.0, 10.0), SampleOrigin::Scheduled).0;
    assert!(s.is_overdue());

    s = ProgressEstimator::apply(&s, &sample(BatchStatus::Completed, 100.0, 100.0), SampleOrigin::Scheduled).0;
    assert!(!s.is_overdue(), "finished batches are never overdue");
}

#[test]
fn test_format_clock() {
    assert_eq!(format_clock(0), "00:00");
    assert_eq!(format_clock(59), "00:59");
    assert_eq!(format_clock(61), "01:01");
    assert_eq!(format_clock(3600), "60:00");
}
