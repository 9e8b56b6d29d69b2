use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use nuslink_session::OverrunPolicy;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod receive;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the peripheral console and receive announced files.
    Receive(ReceiveArgs),
    /// Send a single command to the peripheral.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Receive(args) => receive::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    /// Bridge socket to attach to.
    #[arg(long, value_name = "PATH", env = "NUSLINK_SOCKET")]
    pub socket: Option<PathBuf>,
    /// Replay a captured notification stream instead of a live link.
    /// Takes precedence over --socket.
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
    /// Replay chunk size in bytes.
    #[arg(long, default_value = "128", value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: u64,
    /// Pause before each replayed chunk (e.g. 5ms, 1s).
    #[arg(long, value_name = "DURATION")]
    pub chunk_delay: Option<String>,
    /// Directory received files are written to.
    #[arg(long, value_name = "DIR", default_value = ".", env = "NUSLINK_OUT_DIR")]
    pub out_dir: PathBuf,
    /// Console lines kept in memory.
    #[arg(long, default_value = "50")]
    pub max_lines: usize,
    /// Time a packet may take before it is NACKed (e.g. 200ms, 2s).
    #[arg(long, default_value = "200ms")]
    pub timeout: String,
    /// Longest unterminated text accepted before it is dropped.
    #[arg(long, default_value = "4096")]
    pub max_line_len: usize,
    /// What to do when a packet grows past 1024 bytes without completing.
    #[arg(long, value_enum, default_value = "await-timeout")]
    pub overrun_policy: OverrunPolicyArg,
    /// Exit once the first transfer has finished.
    #[arg(long)]
    pub exit_after_transfer: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OverrunPolicyArg {
    AwaitTimeout,
    Discard,
}

impl From<OverrunPolicyArg> for OverrunPolicy {
    fn from(arg: OverrunPolicyArg) -> Self {
        match arg {
            OverrunPolicyArg::AwaitTimeout => OverrunPolicy::AwaitTimeout,
            OverrunPolicyArg::Discard => OverrunPolicy::Discard,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Bridge socket to write to.
    #[arg(long, value_name = "PATH", env = "NUSLINK_SOCKET")]
    pub socket: PathBuf,
    /// Command text; a newline is appended when missing.
    #[arg(conflicts_with = "preset")]
    pub text: Option<String>,
    /// Send a well-known command instead of free text.
    #[arg(long, value_enum)]
    pub preset: Option<Preset>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// `*IDN?`
    Idn,
    /// `*RST`
    Rst,
    /// Ask the peripheral to send its raw data file.
    ReadRaw,
}

impl Preset {
    pub fn command(self) -> &'static str {
        match self {
            Preset::Idn => "*IDN?",
            Preset::Rst => "*RST",
            Preset::ReadRaw => "FIL:READ? raw_data,test_file,bin",
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `2s` or bare seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn presets_map_to_commands() {
        assert_eq!(Preset::Idn.command(), "*IDN?");
        assert_eq!(Preset::ReadRaw.command(), "FIL:READ? raw_data,test_file,bin");
    }

    #[test]
    fn overrun_arg_converts() {
        assert_eq!(
            OverrunPolicy::from(OverrunPolicyArg::Discard),
            OverrunPolicy::Discard
        );
    }
}
