use std::io::{BufReader, BufWriter, Read, Write};
use std::time::Duration;

use stackpipe_frame::{FrameReader, FrameWriter};
use stackpipe_stack::{receive_stack, send_stack, ImageStack};
use stackpipe_worker::{WorkerCommand, WorkerProcess};

use crate::config::SessionConfig;
use crate::error::{ErrorKind, Result, SessionError};
use crate::reaper::{Reaper, ReaperExit};

/// Where a session is in its single request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    /// Worker spawned; greeting pending or consumed.
    Started,
    /// Request stack fully written.
    Sent,
    /// Reading result stacks.
    Receiving,
    /// Sentinel received.
    Done,
    Failed,
}

/// Summary of a successful session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Result stacks yielded before the sentinel.
    pub results: usize,
    pub final_state: SessionState,
}

/// Results gathered by [`TransferSession::collect`].
///
/// Results received before a failure are kept alongside the error.
#[derive(Debug)]
pub struct TransferOutcome {
    pub results: Vec<ImageStack>,
    pub error: Option<SessionError>,
}

impl TransferOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Vec<ImageStack>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

/// One request sent to one worker, followed by its stream of results.
#[derive(Debug)]
pub struct TransferSession {
    command: WorkerCommand,
    config: SessionConfig,
    state: SessionState,
}

impl TransferSession {
    pub fn new(command: WorkerCommand) -> Self {
        Self::with_config(command, SessionConfig::default())
    }

    pub fn with_config(command: WorkerCommand, config: SessionConfig) -> Self {
        Self {
            command,
            config,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session, handing each result stack to `on_result` as it arrives.
    ///
    /// The worker is terminated before this returns, on success and on every
    /// failure after it was spawned.
    pub fn run<F>(&mut self, request: &ImageStack, mut on_result: F) -> Result<TransferReport>
    where
        F: FnMut(ImageStack),
    {
        if self.state != SessionState::Idle {
            return Err(SessionError::NotIdle(self.state));
        }

        let worker = match WorkerProcess::start(&self.command) {
            Ok(worker) => worker,
            Err(err) => {
                self.transition(SessionState::Failed);
                return Err(err.into());
            }
        };
        let (handle, stdin, stdout) = worker.into_parts();
        self.transition(SessionState::Started);

        let reaper = match Reaper::spawn(handle.clone(), self.config.deadline) {
            Ok(reaper) => reaper,
            Err(err) => {
                handle.terminate();
                self.transition(SessionState::Failed);
                return Err(SessionError::Reaper(err));
            }
        };
        let registration = self
            .config
            .lifecycle
            .as_ref()
            .map(|lifecycle| lifecycle.register(reaper.trigger()));

        let mut reader =
            FrameReader::with_config(BufReader::new(stdout), self.config.frame.clone());
        let writer = FrameWriter::with_config(BufWriter::new(stdin), self.config.frame.clone());
        let result = self.exchange(&mut reader, writer, request, &mut on_result);

        handle.terminate();
        drop(reader);
        reaper.cancel();
        let exit = reaper.join();
        drop(registration);

        match result {
            Ok(results) => {
                self.transition(SessionState::Done);
                Ok(TransferReport {
                    results,
                    final_state: self.state,
                })
            }
            Err(err) => {
                self.transition(SessionState::Failed);
                tracing::warn!(error = %err, ?exit, "transfer session failed");
                Err(classify(err, exit, self.config.deadline))
            }
        }
    }

    /// Run the session and gather every result, keeping partial results on
    /// failure.
    pub fn collect(&mut self, request: &ImageStack) -> TransferOutcome {
        let mut results = Vec::new();
        let error = self.run(request, |stack| results.push(stack)).err();
        TransferOutcome { results, error }
    }

    /// Drive the wire exchange: greeting, request, results until sentinel.
    fn exchange<R: Read, W: Write>(
        &mut self,
        reader: &mut FrameReader<R>,
        mut writer: FrameWriter<W>,
        request: &ImageStack,
        on_result: &mut dyn FnMut(ImageStack),
    ) -> Result<usize> {
        let greeting = reader.read_frame().map_err(SessionError::Greeting)?;
        tracing::debug!(
            size = greeting.payload.len(),
            text = %String::from_utf8_lossy(&greeting.payload),
            "worker greeting received"
        );

        send_stack(&mut writer, request).map_err(SessionError::Send)?;
        self.transition(SessionState::Sent);

        let _held_input = if self.config.close_input_after_send {
            drop(writer);
            None
        } else {
            Some(writer)
        };

        self.transition(SessionState::Receiving);
        let mut received = 0usize;
        loop {
            match receive_stack(reader) {
                Ok(Some(stack)) => {
                    tracing::info!(
                        index = received,
                        title = stack.title(),
                        planes = stack.plane_count(),
                        "result stack received"
                    );
                    received += 1;
                    on_result(stack);
                }
                Ok(None) => return Ok(received),
                Err(source) => return Err(SessionError::Receive { received, source }),
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

/// A worker killed by the reaper shows up as a broken stream; report why it
/// was killed instead. Errors from data that arrived intact stand as they are.
fn classify(err: SessionError, exit: ReaperExit, deadline: Option<Duration>) -> SessionError {
    if err.kind() != ErrorKind::ProtocolIo {
        return err;
    }
    match exit {
        ReaperExit::DeadlineElapsed => SessionError::TimedOut(deadline.unwrap_or_default()),
        ReaperExit::Triggered => SessionError::Interrupted,
        ReaperExit::Cancelled => err,
    }
}

/// Run one session with default configuration.
pub fn transfer(command: WorkerCommand, request: &ImageStack) -> TransferOutcome {
    TransferSession::new(command).collect(request)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use stackpipe_frame::FrameError;
    use stackpipe_stack::{send_sentinel, Dimensions, HeaderError, Planes, StackError};

    use super::*;

    fn request() -> ImageStack {
        ImageStack::new(
            "foo",
            Dimensions::plane(2, 2),
            Planes::Gray16(vec![vec![1, 2, 3, 4]]),
        )
        .unwrap()
    }

    fn offline_session() -> TransferSession {
        let config = SessionConfig {
            lifecycle: None,
            ..SessionConfig::default()
        };
        TransferSession::with_config(WorkerCommand::new("unused"), config)
    }

    fn worker_output(results: &[ImageStack], sentinel: bool) -> Vec<u8> {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(b"connected").unwrap();
        for stack in results {
            send_stack(&mut writer, stack).unwrap();
        }
        if sentinel {
            send_sentinel(&mut writer).unwrap();
        }
        writer.into_inner().into_inner()
    }

    fn drive(
        session: &mut TransferSession,
        worker_bytes: Vec<u8>,
    ) -> (Result<usize>, Vec<ImageStack>, Vec<u8>) {
        let mut reader = FrameReader::new(Cursor::new(worker_bytes));
        let mut sent = Vec::new();
        let mut results = Vec::new();
        let outcome = session.exchange(
            &mut reader,
            FrameWriter::new(&mut sent),
            &request(),
            &mut |stack| results.push(stack),
        );
        (outcome, results, sent)
    }

    #[test]
    fn exchange_yields_results_until_sentinel() {
        let second = ImageStack::new(
            "bar",
            Dimensions::plane(1, 3),
            Planes::Gray8(vec![vec![9, 8, 7]]),
        )
        .unwrap();
        let mut session = offline_session();

        let (outcome, results, sent) =
            drive(&mut session, worker_output(&[request(), second.clone()], true));

        assert_eq!(outcome.unwrap(), 2);
        assert_eq!(results, vec![request(), second]);
        assert_eq!(session.state(), SessionState::Receiving);

        let mut echoed = FrameReader::new(Cursor::new(sent));
        let header = echoed.read_frame().unwrap();
        assert_eq!(
            header.payload.as_ref(),
            b"Title=foo&BitDepth=16&Width=2&Height=2&Channels=1&Slices=1&Frames=1"
        );
        let plane = echoed.read_frame().unwrap();
        assert_eq!(plane.payload.as_ref(), &[1, 0, 2, 0, 3, 0, 4, 0]);
    }

    #[test]
    fn exchange_with_no_results() {
        let mut session = offline_session();
        let (outcome, results, _) = drive(&mut session, worker_output(&[], true));
        assert_eq!(outcome.unwrap(), 0);
        assert!(results.is_empty());
    }

    #[test]
    fn missing_greeting_fails_before_sending() {
        let mut session = offline_session();
        let (outcome, _, sent) = drive(&mut session, Vec::new());

        let err = outcome.unwrap_err();
        assert!(matches!(err, SessionError::Greeting(FrameError::ConnectionClosed)));
        assert_eq!(err.kind(), ErrorKind::ProtocolIo);
        assert!(sent.is_empty());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn results_before_malformed_header_are_kept() {
        let mut bytes = worker_output(&[request()], false);
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(b"Title=bad&BitDepth=16").unwrap();
        bytes.extend(writer.into_inner().into_inner());

        let mut session = offline_session();
        let (outcome, results, _) = drive(&mut session, bytes);

        let err = outcome.unwrap_err();
        assert!(matches!(err, SessionError::Receive { received: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        assert_eq!(results, vec![request()]);
    }

    #[test]
    fn stream_closed_before_sentinel_is_protocol_error() {
        let mut session = offline_session();
        let (outcome, results, _) = drive(&mut session, worker_output(&[request()], false));

        let err = outcome.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Receive {
                received: 1,
                source: StackError::Frame(FrameError::ConnectionClosed)
            }
        ));
        assert_eq!(err.kind(), ErrorKind::ProtocolIo);
        assert_eq!(results.len(), 1);
    }

    fn malformed() -> SessionError {
        SessionError::Receive {
            received: 2,
            source: StackError::Header(HeaderError::MissingField("BitDepth")),
        }
    }

    #[test]
    fn reaper_exit_explains_broken_stream() {
        let deadline = Some(Duration::from_millis(50));
        let closed = || SessionError::Greeting(FrameError::ConnectionClosed);

        assert!(matches!(
            classify(closed(), ReaperExit::DeadlineElapsed, deadline),
            SessionError::TimedOut(d) if d == Duration::from_millis(50)
        ));
        assert!(matches!(
            classify(closed(), ReaperExit::Triggered, deadline),
            SessionError::Interrupted
        ));
        assert!(matches!(
            classify(closed(), ReaperExit::Cancelled, deadline),
            SessionError::Greeting(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn malformed_data_is_not_reclassified_by_reaper_exit() {
        for exit in [ReaperExit::DeadlineElapsed, ReaperExit::Triggered] {
            let err = classify(malformed(), exit, Some(Duration::from_millis(50)));
            assert!(matches!(err, SessionError::Receive { received: 2, .. }), "{exit:?}");
            assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        }
    }

    #[test]
    fn outcome_into_result() {
        let ok = TransferOutcome {
            results: vec![request()],
            error: None,
        };
        assert!(ok.is_ok());
        assert_eq!(ok.into_result().unwrap(), vec![request()]);

        let failed = TransferOutcome {
            results: vec![request()],
            error: Some(malformed()),
        };
        assert!(!failed.is_ok());
        assert_eq!(failed.into_result().unwrap_err().kind(), ErrorKind::MalformedHeader);
    }

    #[cfg(unix)]
    mod process {
        use std::sync::Arc;

        use super::*;
        use crate::lifecycle::Lifecycle;

        fn octal(payload: &[u8]) -> String {
            let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
            frame.extend_from_slice(payload);
            frame.iter().map(|b| format!("\\{b:03o}")).collect()
        }

        fn sh_worker(script: &str) -> WorkerCommand {
            WorkerCommand::new("/bin/sh").args(["-c", script])
        }

        fn local_config() -> SessionConfig {
            SessionConfig {
                lifecycle: Some(Arc::new(Lifecycle::new())),
                ..SessionConfig::default()
            }
        }

        #[test]
        fn echo_worker_completes_session() {
            let script = format!(
                "printf '{}'; cat; printf '{}'",
                octal(b"connected"),
                octal(b"")
            );
            let mut session = TransferSession::with_config(sh_worker(&script), local_config());

            let outcome = session.collect(&request());
            assert!(outcome.is_ok(), "{:?}", outcome.error);
            assert_eq!(outcome.results, vec![request()]);
            assert_eq!(session.state(), SessionState::Done);
        }

        #[test]
        fn transfer_with_default_config() {
            let script = format!(
                "printf '{}'; cat; printf '{}'",
                octal(b"connected"),
                octal(b"")
            );
            let results = transfer(sh_worker(&script), &request()).into_result().unwrap();
            assert_eq!(results, vec![request()]);
        }

        #[test]
        fn worker_exiting_before_sentinel_keeps_results() {
            let script = format!("printf '{}'; exec cat", octal(b"hi"));
            let mut session = TransferSession::with_config(sh_worker(&script), local_config());

            let outcome = session.collect(&request());
            assert_eq!(outcome.results, vec![request()]);
            let err = outcome.error.unwrap();
            assert_eq!(err.kind(), ErrorKind::ProtocolIo);
            assert_eq!(session.state(), SessionState::Failed);
        }

        #[test]
        fn malformed_result_header() {
            let script = format!(
                "printf '{}'; cat >/dev/null; printf '{}'",
                octal(b"hi"),
                octal(b"BitDepth=12&Width=1&Height=1&Channels=1&Slices=1&Frames=1")
            );
            let mut session = TransferSession::with_config(sh_worker(&script), local_config());

            let err = session.run(&request(), |_| {}).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedHeader);
        }

        #[test]
        fn missing_greeting_is_protocol_error() {
            let mut session = TransferSession::with_config(sh_worker("exit 0"), local_config());
            let err = session.run(&request(), |_| {}).unwrap_err();
            assert!(matches!(err, SessionError::Greeting(_)));
            assert_eq!(session.state(), SessionState::Failed);
        }

        #[test]
        fn spawn_failure_is_reported() {
            let command = WorkerCommand::new("/nonexistent/stackpipe-worker");
            let mut session = TransferSession::with_config(command, local_config());

            let err = session.run(&request(), |_| {}).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SpawnFailure);
            assert_eq!(session.state(), SessionState::Failed);
        }

        #[test]
        fn session_runs_only_once() {
            let mut session = TransferSession::with_config(sh_worker("exit 0"), local_config());
            let _ = session.run(&request(), |_| {});

            let err = session.run(&request(), |_| {}).unwrap_err();
            assert!(matches!(err, SessionError::NotIdle(SessionState::Failed)));
            assert_eq!(err.kind(), ErrorKind::InvalidState);
        }

        #[test]
        fn deadline_kills_hung_worker() {
            let script = format!("printf '{}'; exec sleep 30", octal(b"hi"));
            let config = SessionConfig {
                deadline: Some(Duration::from_millis(200)),
                ..local_config()
            };
            let mut session = TransferSession::with_config(sh_worker(&script), config);

            let err = session.run(&request(), |_| {}).unwrap_err();
            assert!(matches!(err, SessionError::TimedOut(d) if d == Duration::from_millis(200)));
            assert_eq!(err.kind(), ErrorKind::ProtocolIo);
        }

        #[test]
        fn lifecycle_shutdown_interrupts_session() {
            let lifecycle = Arc::new(Lifecycle::new());
            let script = format!("printf '{}'; exec sleep 30", octal(b"hi"));
            let config = SessionConfig {
                lifecycle: Some(Arc::clone(&lifecycle)),
                ..SessionConfig::default()
            };

            let runner = std::thread::spawn(move || {
                let mut session = TransferSession::with_config(sh_worker(&script), config);
                session.run(&request(), |_| {})
            });

            std::thread::sleep(Duration::from_millis(100));
            lifecycle.shutdown_all();

            let err = runner.join().unwrap().unwrap_err();
            assert!(matches!(err, SessionError::Interrupted));
            assert_eq!(lifecycle.active(), 0);
        }
    }
}
