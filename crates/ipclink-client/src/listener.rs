use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use ipclink_frame::{FrameCodec, FrameConfig};
use ipclink_transport::{Endpoint, UnixDomainSocket};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{ClientError, Result};

/// Serving side of an endpoint.
///
/// Provides just enough to answer requests and publish events; what a request
/// means is up to the caller.
pub struct EndpointListener {
    socket: UnixDomainSocket,
    endpoint: Endpoint,
    frame_config: FrameConfig,
}

impl EndpointListener {
    /// Bind the endpoint's socket. Must be called from within a tokio runtime.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        let socket = UnixDomainSocket::bind(endpoint)?;
        Ok(Self {
            socket,
            endpoint: endpoint.clone(),
            frame_config: FrameConfig::default(),
        })
    }

    /// Override frame limits for accepted connections.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Accept the next client.
    pub async fn accept(&self) -> Result<ServerConnection> {
        let stream = self.socket.accept().await?;
        debug!(endpoint = %self.endpoint, "client connected");
        Ok(ServerConnection {
            framed: Framed::new(stream, FrameCodec::with_config(self.frame_config.clone())),
        })
    }

    /// The endpoint being served.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

/// One accepted client connection.
pub struct ServerConnection {
    framed: Framed<UnixStream, FrameCodec>,
}

impl ServerConnection {
    /// Next raw message, or `None` once the client hangs up.
    pub async fn recv_raw(&mut self) -> Result<Option<String>> {
        match self.framed.next().await {
            Some(Ok(payload)) => String::from_utf8(payload.to_vec())
                .map(Some)
                .map_err(|err| ClientError::MalformedEnvelope(err.to_string())),
            Some(Err(err)) => Err(err.into()),
            None => Ok(None),
        }
    }

    /// Next envelope, or `None` once the client hangs up.
    ///
    /// Undecodable messages surface as errors; the connection stays usable.
    pub async fn recv(&mut self) -> Result<Option<Envelope>> {
        match self.recv_raw().await? {
            Some(raw) => Envelope::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Answer request `id` with `result`.
    pub async fn reply(&mut self, id: &str, result: Value) -> Result<()> {
        self.send_envelope(&Envelope::Reply {
            id: id.to_string(),
            result,
        })
        .await
    }

    /// Answer request `id` with an error envelope.
    pub async fn reply_error(&mut self, id: &str) -> Result<()> {
        self.send_envelope(&Envelope::Error { id: id.to_string() }).await
    }

    /// Publish event `name` to this client.
    pub async fn push(&mut self, name: &str, args: Value) -> Result<()> {
        self.send_envelope(&Envelope::Push {
            name: name.to_string(),
            args,
        })
        .await
    }

    /// Encode and send any envelope.
    pub async fn send_envelope(&mut self, envelope: &Envelope) -> Result<()> {
        let raw = envelope.encode()?;
        self.send_raw(&raw).await
    }

    /// Send a raw message as-is.
    pub async fn send_raw(&mut self, raw: &str) -> Result<()> {
        self.framed
            .send(Bytes::copy_from_slice(raw.as_bytes()))
            .await?;
        Ok(())
    }
}
