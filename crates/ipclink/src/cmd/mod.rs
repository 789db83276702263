use clap::{Args, Subcommand};
use ipclink_transport::{Endpoint, EndpointConfig};
use serde_json::Value;

use crate::exit::{transport_error, CliError, CliResult, DATA_INVALID};
use crate::output::OutputFormat;

pub mod call;
pub mod echo;
pub mod probe;
pub mod subscribe;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Probe an endpoint, call one method and print the outcome.
    Call(CallArgs),
    /// Check whether an endpoint accepts connections.
    Probe(ProbeArgs),
    /// Print events pushed by an endpoint.
    Subscribe(SubscribeArgs),
    /// Serve an endpoint that replies to every request with its args.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(
    command: Command,
    config: &EndpointConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    match command {
        Command::Call(args) => call::run(args, config, format).await,
        Command::Probe(args) => probe::run(args, config, format).await,
        Command::Subscribe(args) => subscribe::run(args, config, format).await,
        Command::Echo(args) => echo::run(args, config).await,
        Command::Version(args) => version::run(args),
    }
}

/// Resolve an endpoint name from the command line.
pub fn resolve(config: &EndpointConfig, name: &str) -> CliResult<Endpoint> {
    config
        .resolve(name)
        .map_err(|err| transport_error("invalid endpoint", err))
}

#[derive(Args, Debug)]
pub struct CallArgs {
    /// Endpoint name.
    pub endpoint: String,
    /// Method to call.
    pub method: String,
    /// JSON arguments.
    #[arg(long, conflicts_with = "data")]
    pub json: Option<String>,
    /// String argument.
    #[arg(long, conflicts_with = "json")]
    pub data: Option<String>,
    /// Connection retries after the probe succeeds.
    #[arg(long, default_value = "10")]
    pub retries: u32,
}

impl CallArgs {
    /// Arguments to send; `null` when none were given.
    pub fn params(&self) -> CliResult<Value> {
        match (&self.json, &self.data) {
            (Some(json), _) => serde_json::from_str(json)
                .map_err(|err| CliError::new(DATA_INVALID, format!("invalid --json: {err}"))),
            (None, Some(data)) => Ok(Value::String(data.clone())),
            (None, None) => Ok(Value::Null),
        }
    }
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Endpoint name.
    pub endpoint: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    /// Endpoint name.
    pub endpoint: String,
    /// Events to print.
    #[arg(required = true)]
    pub events: Vec<String>,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Connection retries.
    #[arg(long, default_value = "10")]
    pub retries: u32,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint name to serve.
    pub endpoint: String,
    /// Also push this event to every client on a timer.
    #[arg(long, value_name = "EVENT")]
    pub tick: Option<String>,
    /// Interval between ticks, in milliseconds.
    #[arg(long, default_value = "1000", requires = "tick")]
    pub interval_ms: u64,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
