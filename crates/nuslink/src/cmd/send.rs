use std::path::Path;

use nuslink_frame::Command;

use crate::cmd::SendArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_sent, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let command = resolve_command(&args)?;
    let wire = command.encode();

    write_command(&args.socket, &wire)?;
    tracing::info!(command = %command, bytes = wire.len(), "command sent");

    print_sent(
        &args.socket.display().to_string(),
        &command.to_string(),
        wire.len(),
        format,
    );
    Ok(SUCCESS)
}

#[cfg(unix)]
fn write_command(socket: &Path, wire: &[u8]) -> CliResult<()> {
    use nuslink_transport::{BridgeStream, CommandSink, StreamSink};

    use crate::exit::transport_error;

    let stream =
        BridgeStream::connect(socket).map_err(|err| transport_error("connect failed", err))?;
    StreamSink::new(stream)
        .send(wire)
        .map_err(|err| transport_error("send failed", err))
}

#[cfg(not(unix))]
fn write_command(_socket: &Path, _wire: &[u8]) -> CliResult<()> {
    Err(CliError::new(USAGE, "bridge sockets require a Unix platform"))
}

fn resolve_command(args: &SendArgs) -> CliResult<Command> {
    if let Some(preset) = args.preset {
        return Ok(Command::Text(preset.command().to_string()));
    }
    match &args.text {
        Some(text) if !text.trim().is_empty() => Ok(Command::Text(text.clone())),
        Some(_) => Err(CliError::new(USAGE, "command text must not be empty")),
        None => Err(CliError::new(USAGE, "provide command text or --preset")),
    }
}
