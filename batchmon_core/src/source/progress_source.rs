use async_trait::async_trait;

use crate::types::types::{BatchId, ProgressSample, SourceError};

#[async_trait]
pub trait BatchProgressSource: Send + Sync {
    /// Read the current progress of one batch run.
    /// Polled by `BatchMonitor` at the cadence it controls; callers never
    /// need to retry, the next tick does that.
    async fn fetch_progress(&self, batch_id: &BatchId) -> Result<ProgressSample, SourceError>;
}
