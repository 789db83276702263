//! Request/reply and publish/subscribe over named local endpoints.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint naming, retry policy, Unix domain sockets
//! - [`frame`]: length-prefixed framing of envelopes on the byte stream
//! - [`client`]: envelopes, reply correlation, subscriptions, one-shot calls
//!   (behind the `client` feature)

/// Re-export transport types.
pub mod transport {
    pub use ipclink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use ipclink_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use ipclink_client::*;
}
