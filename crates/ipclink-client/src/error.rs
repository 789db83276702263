/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] ipclink_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] ipclink_frame::FrameError),

    /// The message is not a well-formed envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The message carries a `type` this protocol does not define.
    #[error("unknown envelope type {0:?}")]
    UnknownEnvelopeType(String),

    /// The presence probe found nobody accepting connections.
    #[error("{0} is not listening")]
    EndpointNotListening(String),

    /// The connection ended while a one-shot call was waiting for its reply.
    #[error("{0} closed the connection before replying")]
    ConnectionLost(String),

    /// A request with this id is already waiting for its reply.
    #[error("request {id} is already pending")]
    DuplicateRequestId { id: String },

    /// The endpoint answered the request with an error envelope.
    #[error("request {id} failed on the remote endpoint")]
    RemoteError { id: String },

    /// The client went away before the request settled.
    #[error("client closed before request {id} settled")]
    Closed { id: String },

    /// No live connection to write to.
    #[error("not connected")]
    NotConnected,

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
