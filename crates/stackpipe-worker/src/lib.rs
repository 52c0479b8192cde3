//! Spawn and terminate stackpipe worker processes.
//!
//! A worker is an external executable that speaks the stackpipe framing on
//! its standard streams: the host writes to the worker's stdin and reads from
//! its stdout. This crate owns launching the process, handing out those two
//! pipes, and killing the process exactly once no matter how many parties
//! ask for it.

pub mod error;
pub mod process;

pub use error::{Result, WorkerError};
pub use process::{StderrMode, WorkerCommand, WorkerHandle, WorkerProcess};
