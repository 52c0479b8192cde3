use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use stackpipe_worker::WorkerHandle;

enum Signal {
    Cancel,
    Trigger,
}

/// Why the reaper thread stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperExit {
    /// Cancelled by its owner; the worker was left alone.
    Cancelled,
    /// A shutdown trigger fired and the worker was terminated.
    Triggered,
    /// The deadline elapsed and the worker was terminated.
    DeadlineElapsed,
}

/// Cloneable trigger that asks a [`Reaper`] to terminate its worker.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Sender<Signal>,
}

impl ShutdownTrigger {
    /// Fire the trigger. A no-op once the reaper has exited.
    pub fn fire(&self) {
        let _ = self.tx.send(Signal::Trigger);
    }
}

/// Background task that terminates a worker on shutdown or deadline.
///
/// The owning session calls [`cancel`](Reaper::cancel) and
/// [`join`](Reaper::join) on normal completion. Dropping an unjoined reaper
/// cancels and joins it.
pub struct Reaper {
    tx: Sender<Signal>,
    thread: Option<JoinHandle<ReaperExit>>,
}

impl Reaper {
    /// Start watching `handle`.
    pub fn spawn(handle: WorkerHandle, deadline: Option<Duration>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name(format!("stackpipe-reaper-{}", handle.pid()))
            .spawn(move || watch(rx, handle, deadline))?;
        Ok(Self {
            tx,
            thread: Some(thread),
        })
    }

    /// A trigger suitable for registering with a [`Lifecycle`](crate::Lifecycle).
    pub fn trigger(&self) -> ShutdownTrigger {
        ShutdownTrigger {
            tx: self.tx.clone(),
        }
    }

    /// Stop watching without touching the worker.
    pub fn cancel(&self) {
        let _ = self.tx.send(Signal::Cancel);
    }

    /// Wait for the reaper thread to stop.
    pub fn join(mut self) -> ReaperExit {
        self.join_thread()
    }

    fn join_thread(&mut self) -> ReaperExit {
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(exit)) => exit,
            Some(Err(_)) => {
                tracing::warn!("reaper thread panicked");
                ReaperExit::Cancelled
            }
            None => ReaperExit::Cancelled,
        }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel();
            self.join_thread();
        }
    }
}

fn watch(rx: Receiver<Signal>, handle: WorkerHandle, deadline: Option<Duration>) -> ReaperExit {
    let signal = match deadline {
        Some(after) => match rx.recv_timeout(after) {
            Ok(signal) => Some(signal),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Signal::Cancel),
        },
        None => Some(rx.recv().unwrap_or(Signal::Cancel)),
    };

    match signal {
        Some(Signal::Cancel) => ReaperExit::Cancelled,
        Some(Signal::Trigger) => {
            tracing::info!(pid = handle.pid(), "shutdown requested, terminating worker");
            handle.terminate();
            ReaperExit::Triggered
        }
        None => {
            tracing::warn!(pid = handle.pid(), ?deadline, "deadline elapsed, terminating worker");
            handle.terminate();
            ReaperExit::DeadlineElapsed
        }
    }
}
