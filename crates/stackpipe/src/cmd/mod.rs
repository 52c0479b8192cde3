use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod run;
pub mod version;
pub mod worker;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one stack to a worker and collect its results.
    Run(RunArgs),
    /// Act as a worker: echo the request stack back on stdout.
    Worker(WorkerArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Worker(args) => worker::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Worker executable to spawn.
    #[arg(long, env = "STACKPIPE_WORKER")]
    pub worker: PathBuf,
    /// Raw plane data: planes concatenated, row-major, 16-bit samples
    /// little-endian. Omit to send a zero-filled stack.
    #[arg(long, value_name = "FILE")]
    pub input: Option<PathBuf>,
    /// Stack title.
    #[arg(long, default_value = "")]
    pub title: String,
    /// Bits per sample (8 or 16).
    #[arg(long, default_value = "16")]
    pub bit_depth: u32,
    #[arg(long)]
    pub width: u32,
    #[arg(long)]
    pub height: u32,
    #[arg(long, default_value = "1")]
    pub channels: u32,
    #[arg(long, default_value = "1")]
    pub slices: u32,
    #[arg(long, default_value = "1")]
    pub frames: u32,
    /// Write result-N.raw and result-N.json for every result into DIR.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
    /// Kill the worker if the exchange takes longer (e.g. 5s, 500ms).
    #[arg(long, env = "STACKPIPE_DEADLINE")]
    pub deadline: Option<String>,
    /// Arguments passed to the worker.
    #[arg(last = true, value_name = "WORKER_ARGS")]
    pub worker_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Number of result stacks to send back.
    #[arg(long, default_value = "1")]
    pub copies: usize,
    /// Invert sample values in the results.
    #[arg(long)]
    pub invert: bool,
    /// Greeting frame text.
    #[arg(long, default_value = "stackpipe worker ready")]
    pub greeting: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
