use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::BytesMut;
use stackpipe_session::{Lifecycle, SessionConfig, TransferSession};
use stackpipe_stack::{
    pack_u16_le, unpack_u16_le, BitDepth, Dimensions, HeaderError, ImageStack, Planes,
};
use stackpipe_worker::WorkerCommand;

use crate::cmd::RunArgs;
use crate::exit::{
    io_error, session_error, stack_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS,
    USAGE,
};
use crate::output::{print_results, OutputFormat, ResultSummary};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = args.deadline.as_deref().map(parse_duration).transpose()?;
    let request = load_request(&args)?;
    install_ctrlc_handler()?;

    let command = WorkerCommand::new(args.worker.clone()).args(args.worker_args.iter());
    let config = SessionConfig {
        deadline,
        ..SessionConfig::default()
    };
    tracing::info!(
        worker = %args.worker.display(),
        title = request.title(),
        planes = request.plane_count(),
        "starting transfer"
    );

    let mut session = TransferSession::with_config(command, config);
    let outcome = session.collect(&request);

    let mut summaries = Vec::with_capacity(outcome.results.len());
    for (index, stack) in outcome.results.iter().enumerate() {
        let file = match &args.output_dir {
            Some(dir) => Some(write_result(dir, index, stack)?),
            None => None,
        };
        summaries.push(ResultSummary::new(index, stack, file));
    }
    print_results(&summaries, format);

    match outcome.error {
        None => Ok(SUCCESS),
        Some(err) => Err(session_error("transfer failed", err)),
    }
}

fn install_ctrlc_handler() -> CliResult<()> {
    ctrlc::set_handler(|| {
        Lifecycle::global().shutdown_all();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn load_request(args: &RunArgs) -> CliResult<ImageStack> {
    let dims = Dimensions {
        width: args.width,
        height: args.height,
        channels: args.channels,
        slices: args.slices,
        frames: args.frames,
    };
    let depth = BitDepth::try_from(args.bit_depth)
        .map_err(|err| CliError::new(USAGE, format!("invalid --bit-depth: {err}")))?;
    let layout =
        |err: HeaderError| CliError::new(USAGE, format!("invalid stack geometry: {err}"));
    dims.validate().map_err(layout)?;
    let plane_bytes = dims.plane_bytes(depth).map_err(layout)?;
    let expected = dims
        .plane_count()
        .map_err(layout)?
        .checked_mul(plane_bytes)
        .ok_or_else(|| CliError::new(USAGE, "stack geometry is too large"))?;

    let data = match &args.input {
        Some(path) => {
            fs::read(path).map_err(|err| io_error(&format!("reading {}", path.display()), err))?
        }
        None => vec![0; expected],
    };
    if data.len() != expected {
        return Err(CliError::new(
            DATA_INVALID,
            format!(
                "input holds {} bytes, geometry needs {expected}",
                data.len()
            ),
        ));
    }

    stack_from_raw(&args.title, dims, depth, &data, plane_bytes)
}

/// Split concatenated raw planes into a stack. `data` must already be a
/// whole number of planes.
fn stack_from_raw(
    title: &str,
    dims: Dimensions,
    depth: BitDepth,
    data: &[u8],
    plane_bytes: usize,
) -> CliResult<ImageStack> {
    let chunks = data.chunks_exact(plane_bytes);
    let planes = match depth {
        BitDepth::Eight => Planes::Gray8(chunks.map(<[u8]>::to_vec).collect()),
        BitDepth::Sixteen => Planes::Gray16(chunks.filter_map(unpack_u16_le).collect()),
    };
    ImageStack::new(title, dims, planes).map_err(|err| stack_error("invalid request stack", err))
}

/// Planes concatenated in wire layout.
fn raw_bytes(stack: &ImageStack) -> Vec<u8> {
    match stack.planes() {
        Planes::Gray8(planes) => planes.concat(),
        Planes::Gray16(planes) => {
            let mut out = Vec::new();
            let mut buf = BytesMut::new();
            for plane in planes {
                pack_u16_le(plane, &mut buf);
                out.extend_from_slice(&buf);
            }
            out
        }
    }
}

fn write_result(dir: &Path, index: usize, stack: &ImageStack) -> CliResult<PathBuf> {
    fs::create_dir_all(dir)
        .map_err(|err| io_error(&format!("creating {}", dir.display()), err))?;

    let raw_path = dir.join(format!("result-{index}.raw"));
    fs::write(&raw_path, raw_bytes(stack))
        .map_err(|err| io_error(&format!("writing {}", raw_path.display()), err))?;

    let meta_path = dir.join(format!("result-{index}.json"));
    let meta = serde_json::to_vec_pretty(stack.header())
        .map_err(|err| CliError::new(INTERNAL, format!("encoding result header: {err}")))?;
    fs::write(&meta_path, meta)
        .map_err(|err| io_error(&format!("writing {}", meta_path.display()), err))?;

    tracing::debug!(path = %raw_path.display(), "result written");
    Ok(raw_path)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
