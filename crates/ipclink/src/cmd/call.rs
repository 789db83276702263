use ipclink_client::{connect_and_invoke_with, ConnectOptions, InvokeOptions};
use ipclink_transport::EndpointConfig;

use crate::cmd::{resolve, CallArgs};
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_outcome, OutputFormat};

pub async fn run(args: CallArgs, config: &EndpointConfig, format: OutputFormat) -> CliResult<i32> {
    let endpoint = resolve(config, &args.endpoint)?;
    let params = args.params()?;
    let options = InvokeOptions {
        connect: ConnectOptions::with_max_retries(args.retries),
        ..InvokeOptions::default()
    };

    tracing::debug!(endpoint = %endpoint, method = %args.method, "calling");
    let outcome = connect_and_invoke_with(&endpoint, &args.method, params, &options).await;
    print_outcome(endpoint.name(), &args.method, &outcome, format);

    Ok(if outcome.is_error() { FAILURE } else { SUCCESS })
}
