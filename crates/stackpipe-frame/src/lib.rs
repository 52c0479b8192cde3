//! Length-prefixed binary framing over blocking byte streams.
//!
//! Every frame on the wire is:
//! - A 4-byte little-endian unsigned payload length
//! - Exactly that many payload bytes
//!
//! A zero-length frame is a valid, empty payload and is distinct from the
//! stream closing. Readers never hand out a frame before its full length
//! prefix and payload have arrived.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_length, encode_frame, encode_length, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
