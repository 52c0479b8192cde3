use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_length, Frame, FrameConfig, HEADER_SIZE};
use crate::error::{FrameError, Result};

const READ_CHUNK_SIZE: usize = 64 * 1024;
const MAX_INITIAL_RESERVE: usize = 1024 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally, so callers always get complete frames.
/// The payload buffer grows with the bytes that actually arrive, so a corrupt
/// length prefix below the configured maximum cannot force a huge allocation
/// up front.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached on a
    /// frame boundary and `Err(FrameError::Truncated { .. })` when EOF cuts a
    /// frame short.
    pub fn read_frame(&mut self) -> Result<Frame> {
        let mut prefix = [0u8; HEADER_SIZE];
        let filled = self.fill(&mut prefix)?;
        if filled == 0 {
            return Err(FrameError::ConnectionClosed);
        }
        if filled < HEADER_SIZE {
            return Err(FrameError::Truncated {
                expected: HEADER_SIZE,
                received: filled,
            });
        }

        let len = decode_length(prefix);
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }

        let mut payload = BytesMut::with_capacity(len.min(MAX_INITIAL_RESERVE));
        while payload.len() < len {
            let start = payload.len();
            let want = (len - start).min(READ_CHUNK_SIZE);
            payload.resize(start + want, 0);

            match self.inner.read(&mut payload[start..]) {
                Ok(0) => {
                    return Err(FrameError::Truncated {
                        expected: len,
                        received: start,
                    });
                }
                Ok(n) => payload.truncate(start + n),
                Err(err) if err.kind() == ErrorKind::Interrupted => payload.truncate(start),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        tracing::trace!(size = len, "frame read");
        Ok(Frame {
            payload: payload.freeze(),
        })
    }

    /// Fill `buf` from the stream, stopping early only at EOF.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(filled)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};
    use proptest::prelude::*;

    use super::*;
    use crate::codec::encode_frame;

    fn wire(payloads: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for payload in payloads {
            encode_frame(payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"hello"])));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"one", b"", b"three"])));

        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"one");
        assert!(reader.read_frame().unwrap().is_empty());
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"three");
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn roundtrip_boundary_sizes() {
        for len in [0usize, 1, 65536] {
            let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
            let mut writer = crate::writer::FrameWriter::new(Cursor::new(Vec::new()));
            writer.send(&payload).unwrap();

            let bytes = writer.into_inner().into_inner();
            assert_eq!(bytes.len(), HEADER_SIZE + len);

            let mut reader = FrameReader::new(Cursor::new(bytes));
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.payload.as_ref(), payload.as_slice());
        }
    }

    proptest! {
        #[test]
        fn any_payload_sequence_roundtrips(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..2048), 0..6)
        ) {
            let mut writer = crate::writer::FrameWriter::new(Vec::new());
            for payload in &payloads {
                writer.send(payload).unwrap();
            }

            let mut reader = FrameReader::new(ByteByByteReader {
                bytes: writer.into_inner(),
                pos: 0,
            });
            for payload in &payloads {
                let frame = reader.read_frame().unwrap();
                prop_assert_eq!(frame.payload.as_ref(), payload.as_slice());
            }
            prop_assert!(matches!(reader.read_frame(), Err(FrameError::ConnectionClosed)));
        }
    }

    #[test]
    fn partial_read_handling() {
        let payload = vec![0x5A; 300];
        let byte_reader = ByteByByteReader {
            bytes: wire(&[&payload]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), payload.as_slice());
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_inside_prefix() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x05, 0x00]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 4,
                received: 2
            }
        ));
    }

    #[test]
    fn corrupt_length_exceeding_stream_is_truncation() {
        let mut partial = BytesMut::new();
        partial.put_u32_le(1_000_000);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Truncated {
                expected: 1_000_000,
                received: 9
            }
        ));
        assert!(err.is_closed());
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        wire.put_u32_le(1024);

        let cfg = FrameConfig {
            max_payload_size: 16,
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge {
                size: 1024,
                max: 16
            }
        ));
    }

    #[test]
    fn max_length_prefix_rejected_without_reading_payload() {
        let mut reader = FrameReader::new(Cursor::new(vec![0xFF, 0xFF, 0xFF, 0xFF]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire(&[b"ok"]),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"ok");
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut framed = FrameReader::new(FailingReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::PermissionDenied));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let sender = std::thread::spawn(move || {
            for i in 0..32u32 {
                writer.send(format!("msg-{i}").as_bytes()).unwrap();
            }
        });

        for i in 0..32u32 {
            let frame = reader.read_frame().unwrap();
            assert_eq!(frame.payload.as_ref(), format!("msg-{i}").as_bytes());
        }
        sender.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        reader.set_max_payload_size(8);
        assert_eq!(reader.config().max_payload_size, 8);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::PermissionDenied))
        }
    }
}
