use std::fmt;
use std::io;

use stackpipe_session::{ErrorKind, SessionError};
use stackpipe_stack::StackError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PROTOCOL_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const SPAWN_FAILED: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        io::ErrorKind::TimedOut => TIMEOUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => PROTOCOL_ERROR,
        _ => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn stack_error(context: &str, err: StackError) -> CliError {
    let code = if err.is_io() {
        PROTOCOL_ERROR
    } else {
        DATA_INVALID
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    let code = match &err {
        SessionError::TimedOut(_) => TIMEOUT,
        SessionError::Interrupted => INTERRUPTED,
        other => match other.kind() {
            ErrorKind::SpawnFailure => SPAWN_FAILED,
            ErrorKind::ProtocolIo => PROTOCOL_ERROR,
            ErrorKind::MalformedHeader => DATA_INVALID,
            ErrorKind::InvalidState => INTERNAL,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use stackpipe_frame::FrameError;
    use stackpipe_stack::HeaderError;
    use stackpipe_worker::WorkerError;

    use super::*;

    #[test]
    fn session_errors_map_to_exit_codes() {
        let spawn = SessionError::Spawn(WorkerError::Spawn {
            path: "/missing".into(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        assert_eq!(session_error("run", spawn).code, SPAWN_FAILED);

        let truncated = SessionError::Receive {
            received: 1,
            source: StackError::Frame(FrameError::Truncated {
                expected: 8,
                received: 3,
            }),
        };
        assert_eq!(session_error("run", truncated).code, PROTOCOL_ERROR);

        let malformed = SessionError::Receive {
            received: 0,
            source: StackError::Header(HeaderError::UnsupportedBitDepth(12)),
        };
        assert_eq!(session_error("run", malformed).code, DATA_INVALID);

        assert_eq!(
            session_error("run", SessionError::TimedOut(Duration::from_secs(1))).code,
            TIMEOUT
        );
        assert_eq!(
            session_error("run", SessionError::Interrupted).code,
            INTERRUPTED
        );
    }

    #[test]
    fn message_carries_context() {
        let err = session_error("transfer failed", SessionError::MissingRequest);
        assert_eq!(err.to_string(), "transfer failed: peer sent no request stack");
    }
}
