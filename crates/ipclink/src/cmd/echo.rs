use std::time::Duration;

use ipclink_client::{ClientError, EndpointListener, Envelope, ServerConnection};
use ipclink_transport::EndpointConfig;
use serde_json::Value;

use crate::cmd::{resolve, EchoArgs};
use crate::exit::{client_error, CliResult, SUCCESS};

/// What to do after a failed receive.
#[derive(Debug, PartialEq, Eq)]
enum RecvDisposition {
    Skip,
    Close,
}

fn classify_recv_error(err: &ClientError) -> RecvDisposition {
    match err {
        ClientError::MalformedEnvelope(_) | ClientError::UnknownEnvelopeType(_) => {
            RecvDisposition::Skip
        }
        _ => RecvDisposition::Close,
    }
}

pub async fn run(args: EchoArgs, config: &EndpointConfig) -> CliResult<i32> {
    let endpoint = resolve(config, &args.endpoint)?;
    let listener =
        EndpointListener::bind(&endpoint).map_err(|err| client_error("bind failed", err))?;
    tracing::info!(endpoint = %endpoint, path = %endpoint.path().display(), "serving");

    let tick = args
        .tick
        .map(|event| (event, Duration::from_millis(args.interval_ms.max(1))));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            accepted = listener.accept() => {
                let conn = accepted.map_err(|err| client_error("accept failed", err))?;
                tokio::spawn(serve(conn, tick.clone()));
            }
        }
    }

    tracing::info!(endpoint = %endpoint, "shutting down");
    Ok(SUCCESS)
}

async fn serve(mut conn: ServerConnection, tick: Option<(String, Duration)>) {
    let (event, period) = match tick {
        Some((event, period)) => (Some(event), period),
        None => (None, Duration::from_secs(3600)),
    };
    let mut ticker = tokio::time::interval(period);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(Envelope::Request { id, name, args })) => {
                    tracing::debug!(id, method = %name, "echoing request");
                    if let Err(err) = conn.reply(&id, args).await {
                        tracing::warn!(error = %err, "reply failed");
                        break;
                    }
                }
                Ok(Some(other)) => {
                    tracing::warn!(kind = other.kind(), "ignoring non-request envelope");
                }
                Ok(None) => break,
                Err(err) => match classify_recv_error(&err) {
                    RecvDisposition::Skip => {
                        tracing::warn!(error = %err, "skipping invalid message")
                    }
                    RecvDisposition::Close => {
                        tracing::warn!(error = %err, "receive failed");
                        break;
                    }
                },
            },
            _ = ticker.tick(), if event.is_some() => {
                let Some(event) = &event else { continue };
                ticks += 1;
                if let Err(err) = conn.push(event, Value::from(ticks)).await {
                    tracing::warn!(error = %err, "push failed");
                    break;
                }
            }
        }
    }
    tracing::debug!("client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipclink_frame::FrameError;

    #[test]
    fn invalid_messages_are_skipped() {
        let err = ClientError::UnknownEnvelopeType("bogus".into());
        assert_eq!(classify_recv_error(&err), RecvDisposition::Skip);
        let err = ClientError::MalformedEnvelope("not json".into());
        assert_eq!(classify_recv_error(&err), RecvDisposition::Skip);
    }

    #[test]
    fn framing_errors_close_the_connection() {
        let err = ClientError::Frame(FrameError::InvalidMagic);
        assert_eq!(classify_recv_error(&err), RecvDisposition::Close);
    }
}
