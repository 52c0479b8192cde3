//! Transfer image hyperstacks to external worker processes over stdio.
//!
//! A host spawns a worker, sends it one image stack on the worker's stdin,
//! and reads result stacks back from its stdout until an end-of-results
//! sentinel. Every frame on the wire is a little-endian `u32` length followed
//! by that many payload bytes.
//!
//! # Crate Structure
//!
//! - [`frame`]: length-prefixed framing over any byte stream
//! - [`stack`]: hyperstack headers, planes, and their wire marshalling
//! - [`worker`]: spawning and terminating the worker process
//! - [`session`]: the request/response exchange, on both sides of the pipe

/// Re-export frame types.
pub mod frame {
    pub use stackpipe_frame::*;
}

/// Re-export stack types.
pub mod stack {
    pub use stackpipe_stack::*;
}

/// Re-export worker process types.
pub mod worker {
    pub use stackpipe_worker::*;
}

/// Re-export session types.
pub mod session {
    pub use stackpipe_session::*;
}
