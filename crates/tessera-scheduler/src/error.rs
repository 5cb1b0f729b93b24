//! Error types for run coordination.

use thiserror::Error;

/// Errors that prevent a run from starting.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A worker thread could not be spawned
    #[error("failed to spawn worker {worker_id}: {source}")]
    Spawn {
        /// Worker that failed to start
        worker_id: usize,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// Every worker failed to start
    #[error("no worker threads could be started")]
    NoWorkers,
}

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
