use std::path::PathBuf;

/// Errors that can occur while launching a worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The executable could not be started.
    #[error("failed to spawn worker {path}: {source}")]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The spawned child did not expose a requested pipe.
    #[error("worker {0} pipe unavailable")]
    MissingPipe(&'static str),
}

pub type Result<T> = std::result::Result<T, WorkerError>;
