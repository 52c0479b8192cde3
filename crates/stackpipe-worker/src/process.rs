use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::error::{Result, WorkerError};

/// Where the worker's stderr goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrMode {
    /// Share the host's stderr, so worker diagnostics show up in host logs.
    #[default]
    Inherit,
    /// Discard worker diagnostics.
    Null,
}

/// How to launch a worker. Locating the executable is the caller's job.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stderr: StderrMode,
    current_dir: Option<PathBuf>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stderr: StderrMode::default(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(match self.stderr {
                StderrMode::Inherit => Stdio::inherit(),
                StderrMode::Null => Stdio::null(),
            });
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

/// A running worker with its stdin (outbound) and stdout (inbound) pipes.
pub struct WorkerProcess {
    handle: WorkerHandle,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl WorkerProcess {
    /// Spawn the worker described by `command`.
    pub fn start(command: &WorkerCommand) -> Result<Self> {
        let mut child = command
            .to_command()
            .spawn()
            .map_err(|source| WorkerError::Spawn {
                path: command.program.clone(),
                source,
            })?;

        let pipes = child.stdin.take().zip(child.stdout.take());
        let handle = WorkerHandle::new(child);
        let Some((stdin, stdout)) = pipes else {
            handle.terminate();
            return Err(WorkerError::MissingPipe("stdio"));
        };

        tracing::info!(
            pid = handle.pid(),
            program = %command.program.display(),
            "worker started"
        );
        Ok(Self {
            handle,
            stdin,
            stdout,
        })
    }

    /// Spawn `path` with no arguments.
    pub fn spawn(path: impl Into<PathBuf>) -> Result<Self> {
        Self::start(&WorkerCommand::new(path))
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    /// A handle that can terminate the worker from any thread.
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub fn stdin_mut(&mut self) -> &mut ChildStdin {
        &mut self.stdin
    }

    pub fn stdout_mut(&mut self) -> &mut ChildStdout {
        &mut self.stdout
    }

    /// Split into the termination handle and the two pipes.
    pub fn into_parts(self) -> (WorkerHandle, ChildStdin, ChildStdout) {
        (self.handle, self.stdin, self.stdout)
    }

    /// Forcibly stop the worker. See [`WorkerHandle::terminate`].
    pub fn terminate(&self) -> bool {
        self.handle.terminate()
    }
}

/// Cloneable, thread-safe termination handle for a worker.
///
/// The child lives behind a `Mutex<Option<_>>`; whichever caller takes it
/// out performs the kill, every other caller sees `None` and does nothing.
/// The process is killed when the last handle is dropped if nobody
/// terminated it first.
#[derive(Clone)]
pub struct WorkerHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    pid: u32,
    child: Mutex<Option<Child>>,
}

impl WorkerHandle {
    fn new(child: Child) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                pid: child.id(),
                child: Mutex::new(Some(child)),
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.inner.pid
    }

    /// Whether some caller already terminated the worker.
    pub fn is_terminated(&self) -> bool {
        match self.inner.child.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }

    /// Forcibly stop the worker and reap it.
    ///
    /// Returns `true` only for the call that performed the kill. Repeated or
    /// concurrent calls return `false` without touching the process. Kill and
    /// wait failures are logged and otherwise ignored.
    pub fn terminate(&self) -> bool {
        let child = match self.inner.child.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match child {
            Some(mut child) => {
                kill_and_reap(&mut child, self.inner.pid);
                true
            }
            None => {
                tracing::trace!(pid = self.inner.pid, "worker already terminated");
                false
            }
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("pid", &self.inner.pid)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let child = match self.child.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(mut child) = child {
            tracing::debug!(pid = self.pid, "last worker handle dropped, killing");
            kill_and_reap(&mut child, self.pid);
        }
    }
}

fn kill_and_reap(child: &mut Child, pid: u32) {
    if let Err(err) = child.kill() {
        tracing::debug!(pid, error = %err, "failed to kill worker");
    }
    match child.wait() {
        Ok(status) => tracing::info!(pid, %status, "worker terminated"),
        Err(err) => tracing::debug!(pid, error = %err, "failed to reap worker"),
    }
}
