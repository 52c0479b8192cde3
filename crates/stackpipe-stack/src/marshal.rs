use std::io::{Read, Write};

use bytes::{BufMut, BytesMut};
use stackpipe_frame::{FrameReader, FrameWriter};

use crate::error::{Result, StackError};
use crate::header::Header;
use crate::image::{ImageStack, Planes};
use crate::schema::{BitDepth, StackHeader};

// Caps the up-front Vec reservation for a declared plane count.
const MAX_PLANE_PREALLOC: usize = 1024;

/// Write `stack` as a header frame followed by one frame per plane.
pub fn send_stack<W: Write>(writer: &mut FrameWriter<W>, stack: &ImageStack) -> Result<()> {
    let header = stack.header().to_header().encode();
    writer.send(header.as_bytes())?;

    match stack.planes() {
        Planes::Gray8(planes) => {
            for plane in planes {
                writer.send(plane)?;
            }
        }
        Planes::Gray16(planes) => {
            let mut buf = BytesMut::new();
            for plane in planes {
                pack_u16_le(plane, &mut buf);
                writer.send(&buf)?;
            }
        }
    }

    tracing::debug!(
        title = stack.title(),
        bit_depth = stack.bit_depth().bits(),
        planes = stack.plane_count(),
        "stack sent"
    );
    Ok(())
}

/// Write the empty header frame that ends a response stream.
pub fn send_sentinel<W: Write>(writer: &mut FrameWriter<W>) -> Result<()> {
    writer.send(Header::new().encode().as_bytes())?;
    Ok(())
}

/// Read one stack, or `None` when the next header is the sentinel.
///
/// Nothing past the header frame is read when the sentinel arrives.
pub fn receive_stack<R: Read>(reader: &mut FrameReader<R>) -> Result<Option<ImageStack>> {
    let frame = reader.read_frame()?;
    if frame.is_empty() {
        tracing::debug!("end-of-results sentinel received");
        return Ok(None);
    }
    let header = Header::from_payload(&frame.payload)?;

    let header = StackHeader::from_header(&header)?;
    let plane_count = header.dims.plane_count()?;
    let expected = header.dims.plane_bytes(header.bit_depth)?;

    let planes = match header.bit_depth {
        BitDepth::Eight => {
            let mut planes = Vec::with_capacity(plane_count.min(MAX_PLANE_PREALLOC));
            for index in 0..plane_count {
                let bytes = read_plane(reader, index, expected)?;
                planes.push(bytes);
            }
            Planes::Gray8(planes)
        }
        BitDepth::Sixteen => {
            let mut planes = Vec::with_capacity(plane_count.min(MAX_PLANE_PREALLOC));
            for index in 0..plane_count {
                let bytes = read_plane(reader, index, expected)?;
                let samples = unpack_u16_le(&bytes).ok_or(StackError::PlaneSize {
                    index,
                    expected,
                    actual: bytes.len(),
                })?;
                planes.push(samples);
            }
            Planes::Gray16(planes)
        }
    };

    tracing::debug!(
        title = %header.title,
        bit_depth = header.bit_depth.bits(),
        planes = plane_count,
        "stack received"
    );
    ImageStack::from_parts(header, planes).map(Some)
}

fn read_plane<R: Read>(
    reader: &mut FrameReader<R>,
    index: usize,
    expected: usize,
) -> Result<Vec<u8>> {
    let frame = reader.read_frame()?;
    if frame.payload.len() != expected {
        return Err(StackError::PlaneSize {
            index,
            expected,
            actual: frame.payload.len(),
        });
    }
    Ok(frame.payload.to_vec())
}

/// Pack samples into little-endian byte pairs, replacing `dst`'s contents.
pub fn pack_u16_le(samples: &[u16], dst: &mut BytesMut) {
    dst.clear();
    dst.reserve(samples.len() * 2);
    for &sample in samples {
        dst.put_u16_le(sample);
    }
}

/// Unpack little-endian byte pairs; `None` for an odd byte count.
pub fn unpack_u16_le(bytes: &[u8]) -> Option<Vec<u16>> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect(),
    )
}
