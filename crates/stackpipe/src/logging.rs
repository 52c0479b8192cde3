use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing::span::EnteredSpan;

use crate::cmd::Command;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Which end of the pipe this process is.
///
/// A worker inherits the host's stderr, so both write to the same stream and
/// every line carries the role to tell them apart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Worker,
}

impl Role {
    pub fn of(command: &Command) -> Self {
        match command {
            Command::Worker(_) => Role::Worker,
            Command::Run(_) | Command::Version(_) => Role::Host,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Host => "host",
            Role::Worker => "worker",
        }
    }
}

/// Install the stderr subscriber and enter the per-process role span.
///
/// Stdout carries frames in worker mode and result summaries in host mode,
/// so logs never go there. Keep the returned guard alive for the whole run.
pub fn init_logging(format: LogFormat, level: LogLevel, role: Role) -> EnteredSpan {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level.as_filter())
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }

    tracing::error_span!("stackpipe", role = %role.as_str(), pid = std::process::id()).entered()
}
