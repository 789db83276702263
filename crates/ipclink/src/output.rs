use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use ipclink_client::InvokeOutcome;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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

/// One-shot call result. JSON output is the outcome itself:
/// `{"data": ...}` or `{"error": "..."}`.
pub fn print_outcome(endpoint: &str, method: &str, outcome: &InvokeOutcome, format: OutputFormat) {
    let (kind, value) = match outcome {
        InvokeOutcome::Data(data) => ("data", compact(data)),
        InvokeOutcome::Error(message) => ("error", message.clone()),
    };
    match format {
        OutputFormat::Json => println!("{}", to_json(outcome)),
        OutputFormat::Table => {
            print_table(
                vec!["ENDPOINT", "METHOD", "OUTCOME", "VALUE"],
                vec![endpoint.to_string(), method.to_string(), kind.to_string(), value],
            );
        }
        OutputFormat::Pretty => {
            println!("endpoint={endpoint} method={method} {kind}={value}");
        }
    }
}

#[derive(Serialize)]
struct ProbeOutput<'a> {
    endpoint: &'a str,
    path: String,
    listening: bool,
    timestamp: String,
}

pub fn print_probe(endpoint: &ipclink_transport::Endpoint, listening: bool, format: OutputFormat) {
    let path = endpoint.path().display().to_string();
    match format {
        OutputFormat::Json => {
            let out = ProbeOutput {
                endpoint: endpoint.name(),
                path,
                listening,
                timestamp: now_unix_seconds(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            print_table(
                vec!["ENDPOINT", "PATH", "LISTENING"],
                vec![endpoint.name().to_string(), path, listening.to_string()],
            );
        }
        OutputFormat::Pretty => {
            println!("endpoint={} path={path} listening={listening}", endpoint.name());
        }
    }
}

#[derive(Serialize)]
struct PushOutput<'a> {
    endpoint: &'a str,
    event: &'a str,
    args: &'a Value,
    timestamp: String,
}

pub fn print_push(endpoint: &str, event: &str, args: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PushOutput {
                endpoint,
                event,
                args,
                timestamp: now_unix_seconds(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            print_table(
                vec!["ENDPOINT", "EVENT", "ARGS"],
                vec![endpoint.to_string(), event.to_string(), compact(args)],
            );
        }
        OutputFormat::Pretty => {
            println!("endpoint={endpoint} event={event} args={}", compact(args));
        }
    }
}

fn print_table(header: Vec<&str>, row: Vec<String>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header)
        .add_row(row);
    println!("{table}");
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
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
    use serde_json::json;

    use super::*;

    #[test]
    fn strings_print_without_quotes() {
        assert_eq!(compact(&json!("boom")), "boom");
        assert_eq!(compact(&json!({"x": 1})), r#"{"x":1}"#);
    }

    #[test]
    fn outcome_json_is_tagged() {
        assert_eq!(
            to_json(&InvokeOutcome::Error("nope".into())),
            r#"{"error":"nope"}"#
        );
    }
}
