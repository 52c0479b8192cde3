use std::time::Duration;

use stackpipe_frame::FrameError;
use stackpipe_stack::StackError;
use stackpipe_worker::WorkerError;

use crate::session::SessionState;

/// Coarse classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The worker could not be launched.
    SpawnFailure,
    /// The stream closed mid-frame, a length prefix was implausible, or the
    /// worker was killed before finishing.
    ProtocolIo,
    /// A header or plane disagreed with the declared stack layout.
    MalformedHeader,
    /// The session was used out of order.
    InvalidState,
}

/// Errors that can occur during a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The worker executable could not be started.
    #[error("failed to start worker: {0}")]
    Spawn(#[from] WorkerError),

    /// The termination task could not be started.
    #[error("failed to start termination task: {0}")]
    Reaper(#[source] std::io::Error),

    /// The worker never produced its greeting frame.
    #[error("no greeting from worker: {0}")]
    Greeting(#[source] FrameError),

    /// The request stack could not be written.
    #[error("failed to send request stack: {0}")]
    Send(#[source] StackError),

    /// A result stack could not be read; `received` results came before it.
    #[error("failed to receive result after {received} stack(s): {source}")]
    Receive {
        received: usize,
        #[source]
        source: StackError,
    },

    /// The peer ended the exchange before sending a request.
    #[error("peer sent no request stack")]
    MissingRequest,

    /// The session deadline elapsed and the worker was killed.
    #[error("worker did not finish within {0:?}")]
    TimedOut(Duration),

    /// A process-wide shutdown killed the worker.
    #[error("session interrupted by shutdown")]
    Interrupted,

    /// `run` was called on a session that already ran.
    #[error("session is {0:?}, expected Idle")]
    NotIdle(SessionState),
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Spawn(_) | SessionError::Reaper(_) => ErrorKind::SpawnFailure,
            SessionError::Send(source) | SessionError::Receive { source, .. } => {
                if source.is_io() {
                    ErrorKind::ProtocolIo
                } else {
                    ErrorKind::MalformedHeader
                }
            }
            SessionError::Greeting(_)
            | SessionError::MissingRequest
            | SessionError::TimedOut(_)
            | SessionError::Interrupted => ErrorKind::ProtocolIo,
            SessionError::NotIdle(_) => ErrorKind::InvalidState,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
