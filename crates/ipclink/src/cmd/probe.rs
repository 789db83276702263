use ipclink_client::is_listening;
use ipclink_transport::EndpointConfig;

use crate::cmd::{resolve, ProbeArgs};
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_probe, OutputFormat};

pub async fn run(args: ProbeArgs, config: &EndpointConfig, format: OutputFormat) -> CliResult<i32> {
    let endpoint = resolve(config, &args.endpoint)?;
    let listening = is_listening(&endpoint).await;
    print_probe(&endpoint, listening, format);

    Ok(if listening { SUCCESS } else { HEALTH_CHECK_FAILED })
}
