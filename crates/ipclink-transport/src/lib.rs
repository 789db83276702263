//! Named local endpoints for ipclink.
//!
//! This is the lowest layer of ipclink. It knows how to:
//! - resolve an endpoint name to a socket path ([`Endpoint`])
//! - pace connection attempts ([`RetryPolicy`])
//! - connect to, bind and accept on Unix domain sockets ([`UnixDomainSocket`])
//!
//! Everything above this layer works on the connected [`tokio::net::UnixStream`].

pub mod endpoint;
pub mod error;
pub mod retry;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, EndpointConfig, DEFAULT_APP_SPACE, DEFAULT_SOCKET_ROOT};
pub use error::{Result, TransportError};
pub use retry::{Backoff, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
