use std::io::{Read, Write};

use stackpipe_session::WorkerEndpoint;
use stackpipe_stack::{ImageStack, Planes};

use crate::cmd::WorkerArgs;
use crate::exit::{session_error, stack_error, CliResult, SUCCESS};

pub fn run(args: WorkerArgs) -> CliResult<i32> {
    let _stdout = serve(WorkerEndpoint::stdio(), &args)?;
    Ok(SUCCESS)
}

fn serve<R: Read, W: Write>(
    mut endpoint: WorkerEndpoint<R, W>,
    args: &WorkerArgs,
) -> CliResult<W> {
    endpoint
        .greet(&args.greeting)
        .map_err(|err| session_error("greeting failed", err))?;
    let request = endpoint
        .receive_request()
        .map_err(|err| session_error("reading request failed", err))?;

    let result = if args.invert {
        invert(&request)?
    } else {
        request
    };

    for copy in 0..args.copies {
        tracing::debug!(copy, title = result.title(), "sending result");
        endpoint
            .send_result(&result)
            .map_err(|err| session_error("sending result failed", err))?;
    }

    let (_, writer) = endpoint
        .finish()
        .map_err(|err| session_error("finishing failed", err))?;
    Ok(writer)
}

/// Invert every sample against the full range of the stack's bit depth.
fn invert(stack: &ImageStack) -> CliResult<ImageStack> {
    let planes = match stack.planes() {
        Planes::Gray8(planes) => Planes::Gray8(
            planes
                .iter()
                .map(|plane| plane.iter().map(|v| u8::MAX - v).collect())
                .collect(),
        ),
        Planes::Gray16(planes) => Planes::Gray16(
            planes
                .iter()
                .map(|plane| plane.iter().map(|v| u16::MAX - v).collect())
                .collect(),
        ),
    };
    ImageStack::from_parts(stack.header().clone(), planes)
        .map_err(|err| stack_error("inverting request", err))
}
