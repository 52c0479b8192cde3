use std::io::{Read, StdinLock, StdoutLock, Write};

use stackpipe_frame::{FrameConfig, FrameReader, FrameWriter};
use stackpipe_stack::{receive_stack, send_sentinel, send_stack, ImageStack};

use crate::error::{Result, SessionError};

/// The worker's half of the exchange.
///
/// A worker greets the host, reads exactly one request stack, writes zero or
/// more result stacks, and finishes with the sentinel.
pub struct WorkerEndpoint<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    sent: usize,
}

impl WorkerEndpoint<StdinLock<'static>, StdoutLock<'static>> {
    /// Speak the protocol on this process's stdin and stdout.
    ///
    /// Nothing else may write to stdout while the endpoint is alive.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stdout().lock())
    }
}

impl<R: Read, W: Write> WorkerEndpoint<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, FrameConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: FrameConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config),
            sent: 0,
        }
    }

    /// Send the greeting frame. Its content is informational only.
    pub fn greet(&mut self, text: &str) -> Result<()> {
        self.writer
            .send(text.as_bytes())
            .map_err(SessionError::Greeting)
    }

    /// Read the host's request stack.
    pub fn receive_request(&mut self) -> Result<ImageStack> {
        match receive_stack(&mut self.reader) {
            Ok(Some(stack)) => {
                tracing::debug!(
                    title = stack.title(),
                    planes = stack.plane_count(),
                    "request stack received"
                );
                Ok(stack)
            }
            Ok(None) => Err(SessionError::MissingRequest),
            Err(source) => Err(SessionError::Receive {
                received: 0,
                source,
            }),
        }
    }

    /// Send one result stack.
    pub fn send_result(&mut self, stack: &ImageStack) -> Result<()> {
        send_stack(&mut self.writer, stack).map_err(SessionError::Send)?;
        self.sent += 1;
        Ok(())
    }

    /// Send the end-of-results sentinel and release the streams.
    pub fn finish(mut self) -> Result<(R, W)> {
        send_sentinel(&mut self.writer).map_err(SessionError::Send)?;
        tracing::debug!(results = self.sent, "worker finished");
        Ok((self.reader.into_inner(), self.writer.into_inner()))
    }

    /// Result stacks sent so far.
    pub fn results_sent(&self) -> usize {
        self.sent
    }
}
