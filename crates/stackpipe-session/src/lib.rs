//! Request/response hyperstack transfers with an external worker.
//!
//! One session spawns a worker, reads its greeting frame, sends a single
//! request stack, then receives result stacks until the worker sends the
//! empty-header sentinel. The worker is always terminated when the session
//! ends, whether it succeeded or not.
//!
//! ```text
//! [greeting] [request: header, plane x N] [result: header, plane x M]... [sentinel]
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod lifecycle;
pub mod reaper;
pub mod session;

pub use config::SessionConfig;
pub use endpoint::WorkerEndpoint;
pub use error::{ErrorKind, Result, SessionError};
pub use lifecycle::{Lifecycle, Registration};
pub use reaper::{Reaper, ReaperExit, ShutdownTrigger};
pub use session::{transfer, SessionState, TransferOutcome, TransferReport, TransferSession};
