use super::session::MonitorState;
use crate::types::types::SourceError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The call is not allowed in the monitor's current state, e.g.
    /// restarting a stopped monitor.
    #[error("cannot {action} a monitor that is {state}")]
    InvalidTransition {
        action: &'static str,
        state: MonitorState,
    },
    /// A single fetch failed. Polling is not affected.
    #[error("failed to fetch batch progress: {0}")]
    Fetch(#[from] SourceError),
    #[error("monitor must be started from within a tokio runtime")]
    NoRuntime,
}
