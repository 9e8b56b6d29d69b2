use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Crates whose events follow `--log-level`. Anything else stays at warn.
const LINK_CRATES: [&str; 4] = [
    "nuslink",
    "nuslink_session",
    "nuslink_frame",
    "nuslink_transport",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
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
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Event targets are printed at debug and trace.
    fn shows_targets(self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Filter string for `level`, with `overrides` (`NUSLINK_LOG` syntax) last.
pub fn filter_directives(level: LogLevel, overrides: Option<&str>) -> String {
    let fallback = if level == LogLevel::Error { "error" } else { "warn" };
    let mut directives = vec![fallback.to_string()];
    directives.extend(
        LINK_CRATES
            .iter()
            .map(|target| format!("{target}={}", level.as_directive())),
    );
    if let Some(extra) = overrides.map(str::trim).filter(|extra| !extra.is_empty()) {
        directives.push(extra.to_string());
    }
    directives.join(",")
}

/// Install the stderr subscriber. Stdout stays reserved for console output.
///
/// An unparsable override is reported and ignored.
pub fn init_logging(format: LogFormat, level: LogLevel, overrides: Option<&str>) {
    let filter = EnvFilter::try_new(filter_directives(level, overrides)).unwrap_or_else(|err| {
        eprintln!("warning: ignoring log filter {overrides:?}: {err}");
        EnvFilter::new(filter_directives(level, None))
    });

    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(level.shows_targets());

    match format {
        LogFormat::Text => {
            let _ = builder.try_init();
        }
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
    }
}
