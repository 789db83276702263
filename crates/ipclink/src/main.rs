mod cmd;
mod exit;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use ipclink_transport::{EndpointConfig, DEFAULT_APP_SPACE, DEFAULT_SOCKET_ROOT};

use crate::cmd::Command;
use crate::exit::{CliError, INTERNAL};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ipclink", version, about = "Call, probe and subscribe to named local endpoints")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// Directory holding endpoint sockets.
    #[arg(
        long,
        value_name = "DIR",
        env = "IPCLINK_SOCKET_ROOT",
        default_value = DEFAULT_SOCKET_ROOT,
        global = true
    )]
    socket_root: PathBuf,

    /// Prefix of endpoint socket file names.
    #[arg(
        long,
        value_name = "PREFIX",
        env = "IPCLINK_APP_SPACE",
        default_value = DEFAULT_APP_SPACE,
        global = true
    )]
    app_space: String,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            socket_root: self.socket_root.clone(),
            app_space: self.app_space.clone(),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let config = cli.endpoint_config();
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))
        .and_then(|runtime| runtime.block_on(cmd::run(cli.command, &config, format)));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_call_subcommand() {
        let cli = Cli::try_parse_from([
            "ipclink",
            "--socket-root",
            "/run/user/1000",
            "call",
            "indexer",
            "search",
            "--json",
            "{\"q\":\"x\"}",
        ])
        .expect("call args should parse");

        assert!(matches!(cli.command, Command::Call(_)));
        let config = cli.endpoint_config();
        assert_eq!(config.socket_root, PathBuf::from("/run/user/1000"));
        assert_eq!(config.app_space, DEFAULT_APP_SPACE);
    }

    #[test]
    fn rejects_conflicting_call_args() {
        let err = Cli::try_parse_from([
            "ipclink", "call", "svc", "m", "--json", "1", "--data", "hello",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn subscribe_needs_at_least_one_event() {
        let err = Cli::try_parse_from(["ipclink", "subscribe", "svc"])
            .expect_err("missing events should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ipclink", "probe", "svc", "--app-space", "dev."])
            .expect("probe args should parse");
        assert!(matches!(cli.command, Command::Probe(_)));
        assert_eq!(cli.app_space, "dev.");
    }
}
