use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nuslink_session::{TransferOutcome, TransferReport};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Console {
        line: &'a str,
        timestamp: String,
    },
    Transfer {
        #[serde(flatten)]
        report: &'a TransferReport,
    },
    Sent {
        socket: &'a str,
        command: &'a str,
        bytes: usize,
    },
}

fn print_json(record: &Record<'_>) {
    println!(
        "{}",
        serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Print one console line as soon as the dispatcher appends it.
pub fn print_console_line(line: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Console {
            line: line.trim_end_matches(['\r', '\n']),
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Raw => print_raw(line.as_bytes()),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{}", line.trim_end_matches(['\r', '\n']));
        }
    }
}

/// Print the summary of every terminated transfer.
pub fn print_reports(reports: &[TransferReport], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for report in reports {
                print_json(&Record::Transfer { report });
            }
        }
        OutputFormat::Table => {
            if reports.is_empty() {
                return;
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "FILE", "STATUS", "RECEIVED", "DECLARED", "PACKETS", "TIMEOUTS", "OVERRUNS",
                    "DETAIL",
                ]);
            for report in reports {
                table.add_row(vec![
                    report.filename.clone(),
                    status(&report.outcome).to_string(),
                    report.bytes_received.to_string(),
                    report.declared_size.to_string(),
                    report.packets.to_string(),
                    report.timeouts.to_string(),
                    report.overruns.to_string(),
                    detail(&report.outcome),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for report in reports {
                println!(
                    "transfer file={} status={} bytes={}/{} packets={} timeouts={} overruns={} {}",
                    report.filename,
                    status(&report.outcome),
                    report.bytes_received,
                    report.declared_size,
                    report.packets,
                    report.timeouts,
                    report.overruns,
                    detail(&report.outcome)
                );
            }
        }
        OutputFormat::Raw => {}
    }
}

/// Confirm a command written by `nuslink send`.
pub fn print_sent(socket: &str, command: &str, bytes: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&Record::Sent {
            socket,
            command,
            bytes,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOCKET", "COMMAND", "BYTES"])
                .add_row(vec![socket.to_string(), command.to_string(), bytes.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("> {command}"),
        OutputFormat::Raw => {}
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn status(outcome: &TransferOutcome) -> &'static str {
    match outcome {
        TransferOutcome::Completed { .. } => "completed",
        TransferOutcome::Aborted { .. } => "aborted",
        TransferOutcome::Disconnected => "disconnected",
    }
}

fn detail(outcome: &TransferOutcome) -> String {
    match outcome {
        TransferOutcome::Completed { path } => path.display().to_string(),
        TransferOutcome::Aborted { reason } => reason.clone(),
        TransferOutcome::Disconnected => String::new(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn report() -> TransferReport {
        TransferReport {
            filename: "calib.bin".into(),
            declared_size: 2048,
            bytes_received: 2048,
            packets: 2,
            timeouts: 0,
            overruns: 0,
            outcome: TransferOutcome::Completed {
                path: PathBuf::from("/tmp/out/calib.bin"),
            },
        }
    }

    #[test]
    fn transfer_record_is_flattened() {
        let report = report();
        let value = serde_json::to_value(Record::Transfer { report: &report }).unwrap();
        assert_eq!(value["type"], "transfer");
        assert_eq!(value["filename"], "calib.bin");
        assert_eq!(value["outcome"]["status"], "completed");
    }

    #[test]
    fn console_record_has_no_terminator() {
        let value = serde_json::to_value(Record::Console {
            line: "hello",
            timestamp: "0".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "console");
        assert_eq!(value["line"], "hello");
    }

    #[test]
    fn detail_names_destination() {
        assert_eq!(detail(&report().outcome), "/tmp/out/calib.bin");
        assert_eq!(status(&TransferOutcome::Disconnected), "disconnected");
    }
}
