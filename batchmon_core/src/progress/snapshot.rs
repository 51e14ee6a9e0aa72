use serde::Serialize;

/// Metrics derived from one applied progress sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DerivedMetrics {
    /// Whole percent complete, clamped to `0..=100`.
    pub percentage: u8,
    pub elapsed_seconds: u64,
    /// `None` until the batch shows any progress.
    pub estimated_remaining_seconds: Option<u64>,
}

/// Format seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
