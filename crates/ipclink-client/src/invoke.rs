//! Presence probe and one-shot invocation.

use ipclink_transport::Endpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::client::{Client, LinkState};
use crate::connector::{self, ConnectOptions, LinkEvent};
use crate::error::ClientError;

/// Result of [`connect_and_invoke`]. Serializes as `{"data": ...}` or
/// `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokeOutcome {
    Data(Value),
    Error(String),
}

impl InvokeOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, InvokeOutcome::Error(_))
    }

    /// `Ok(data)` or `Err(message)`.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        match self {
            InvokeOutcome::Data(data) => Ok(data),
            InvokeOutcome::Error(message) => Err(message),
        }
    }

    fn from_error(err: ClientError) -> Self {
        InvokeOutcome::Error(err.to_string())
    }
}

/// Connection settings for the probe and for the call that follows it.
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// One retry: a quick yes/no.
    pub probe: ConnectOptions,
    /// Ten retries for the real connection.
    pub connect: ConnectOptions,
}

impl Default for InvokeOptions {
    fn default() -> Self {
        Self {
            probe: ConnectOptions::with_max_retries(1),
            connect: ConnectOptions::with_max_retries(10),
        }
    }
}

/// Whether `endpoint` accepts connections right now.
///
/// Best effort: the answer can be stale by the time the caller acts on it.
pub async fn is_listening(endpoint: &Endpoint) -> bool {
    is_listening_with(endpoint, InvokeOptions::default().probe).await
}

/// [`is_listening`] with explicit connect options.
pub async fn is_listening_with(endpoint: &Endpoint, options: ConnectOptions) -> bool {
    let (link, mut events) = connector::connect(endpoint.clone(), options);
    let listening = matches!(events.recv().await, Some(LinkEvent::Connected));
    link.disconnect();
    debug!(endpoint = %endpoint, listening, "probed endpoint");
    listening
}

/// Probe `endpoint`, then connect, call `method` once and disconnect.
///
/// Never fails: every outcome is an [`InvokeOutcome`]. A reply whose result is
/// a plain JSON string is reported as [`InvokeOutcome::Error`] carrying that
/// string, since endpoints signal application errors that way.
pub async fn connect_and_invoke(endpoint: &Endpoint, method: &str, args: Value) -> InvokeOutcome {
    connect_and_invoke_with(endpoint, method, args, &InvokeOptions::default()).await
}

/// [`connect_and_invoke`] with explicit connect options.
pub async fn connect_and_invoke_with(
    endpoint: &Endpoint,
    method: &str,
    args: Value,
    options: &InvokeOptions,
) -> InvokeOutcome {
    if !is_listening_with(endpoint, options.probe.clone()).await {
        return InvokeOutcome::from_error(ClientError::EndpointNotListening(
            endpoint.name().to_string(),
        ));
    }

    let client = Client::new(endpoint.clone());
    // Queued now, written as soon as the link connects.
    let reply = client.send(method, args);
    client.connect(options.connect.clone(), |_| {});

    let settled = tokio::select! {
        biased;
        result = reply => result,
        state = client.wait_for_state(|state| {
            matches!(state, LinkState::Disconnected | LinkState::Destroyed)
        }) => Err(match state {
            LinkState::Destroyed => ClientError::EndpointNotListening(endpoint.name().to_string()),
            _ => ClientError::ConnectionLost(endpoint.name().to_string()),
        }),
    };
    client.disconnect();

    match settled {
        Ok(Value::String(message)) => InvokeOutcome::Error(message),
        Ok(data) => InvokeOutcome::Data(data),
        Err(err) => {
            debug!(endpoint = %endpoint, method, error = %err, "one-shot call failed");
            InvokeOutcome::from_error(err)
        }
    }
}
