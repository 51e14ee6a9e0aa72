use async_trait::async_trait;

use crate::types::types::{BatchCommandAck, BatchId, BatchRun, SourceError};

/// Batch run records and their start/stop commands.
///
/// The monitor never polls this; hosts use it to find the batch to watch
/// and to trigger the status changes the monitor reacts to.
#[async_trait]
pub trait BatchRegistry: Send + Sync {
    async fn list_batch_runs(&self) -> Result<Vec<BatchRun>, SourceError>;
    async fn get_batch_run(&self, batch_id: &BatchId) -> Result<BatchRun, SourceError>;
    async fn start_batch(&self, batch_id: &BatchId) -> Result<BatchCommandAck, SourceError>;
    async fn stop_batch(&self, batch_id: &BatchId) -> Result<BatchCommandAck, SourceError>;
}
