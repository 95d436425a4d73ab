//! Output formatting for received messages.

use std::io::{self, Write};

use reel_core::{ResponseMessage, ResponseStatus};
use serde_json::Value;

use crate::cli::OutputFormat;

/// Render one message as a single line.
///
/// - `plain`: `<status> <compact data>`, or `error <text>`
/// - `json`: the message as compact JSON
pub fn render_message(format: OutputFormat, message: &ResponseMessage<Value>) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(message).unwrap_or_default(),
        OutputFormat::Plain => match (&message.status, &message.data) {
            (ResponseStatus::Error, _) => format!("error {}", message.error_description()),
            (status, Some(data)) => format!("{status} {data}"),
            (status, None) => status.to_string(),
        },
    }
}

/// Parse the `--output` string stored in config defaults.
pub fn format_from_config(value: &str) -> OutputFormat {
    match value {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Plain,
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
    let _ = stdout.flush();
}
