use ipclink_client::{Client, ClientError, ConnectOptions, LinkState};
use ipclink_transport::EndpointConfig;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::cmd::{resolve, SubscribeArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_push, OutputFormat};

pub async fn run(
    args: SubscribeArgs,
    config: &EndpointConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    let endpoint = resolve(config, &args.endpoint)?;
    let client = Client::new(endpoint.clone());

    let (push_tx, mut pushes) = mpsc::unbounded_channel::<(String, Value)>();
    for event in &args.events {
        let push_tx = push_tx.clone();
        let name = event.clone();
        client.subscribe(event.clone(), move |args: &Value| {
            let _ = push_tx.send((name.clone(), args.clone()));
        });
    }
    drop(push_tx);

    let events = args.events.join(",");
    client.connect(ConnectOptions::with_max_retries(args.retries), move |link| {
        tracing::info!(endpoint = %link.endpoint(), events = %events, "subscribed");
    });

    let mut printed = 0usize;
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            received = pushes.recv() => {
                let Some((event, payload)) = received else { break };
                print_push(endpoint.name(), &event, &payload, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            state = client.wait_for_state(|state| {
                matches!(state, LinkState::Disconnected | LinkState::Destroyed)
            }) => {
                return Err(match state {
                    LinkState::Destroyed => client_error(
                        "subscribe failed",
                        ClientError::EndpointNotListening(endpoint.name().to_string()),
                    ),
                    _ => CliError::new(
                        TRANSPORT_ERROR,
                        format!("{} closed the connection", endpoint.name()),
                    ),
                });
            }
        }
    }

    client.disconnect();
    Ok(SUCCESS)
}
