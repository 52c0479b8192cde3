use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: a single 4-byte little-endian length.
pub const HEADER_SIZE: usize = 4;

/// Default maximum payload size: 256 MiB.
///
/// Large enough for a 16-bit 8192x8192 plane with headroom, small enough to
/// reject a corrupt prefix before allocating for it.
pub const DEFAULT_MAX_PAYLOAD: usize = 256 * 1024 * 1024;

/// One length-delimited payload read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Whether the payload is zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a payload length as a wire prefix, enforcing `max_payload`.
pub fn encode_length(len: usize, max_payload: usize) -> Result<[u8; HEADER_SIZE]> {
    let max = max_payload.min(u32::MAX as usize);
    if len > max {
        return Err(FrameError::PayloadTooLarge { size: len, max });
    }
    Ok((len as u32).to_le_bytes())
}

/// Decode a wire prefix into a payload length.
pub fn decode_length(prefix: [u8; HEADER_SIZE]) -> usize {
    u32::from_le_bytes(prefix) as usize
}

/// Encode a complete frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length (4B)  │ Payload          │
/// │ u32 LE       │ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let prefix = encode_length(payload.len(), u32::MAX as usize)?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&prefix);
    dst.put_slice(payload);
    Ok(())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 256 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
