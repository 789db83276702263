//! Request/reply and publish/subscribe over a named local endpoint.
//!
//! This is the layer applications use. Send a named request and await its
//! correlated reply, subscribe to events the endpoint pushes, or fire a
//! single probe-then-call with [`connect_and_invoke`].

pub mod correlator;
pub mod envelope;
pub mod error;
pub mod listeners;
pub mod queue;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod connector;
#[cfg(unix)]
pub mod invoke;
#[cfg(unix)]
pub mod listener;

#[cfg(all(test, unix))]
mod test_support;

pub use correlator::{Correlator, PendingReply};
pub use envelope::{Envelope, TYPE_ERROR, TYPE_PUSH, TYPE_REPLY};
pub use error::{ClientError, Result};
pub use listeners::{Callback, ListenerRegistry, Subscription};
pub use queue::OutboundQueue;

#[cfg(unix)]
pub use client::{uuid_v4, Client, IdGenerator, LinkState};
#[cfg(unix)]
pub use connector::{connect, ConnectOptions, LinkEvent, LinkHandle};
#[cfg(unix)]
pub use invoke::{
    connect_and_invoke, connect_and_invoke_with, is_listening, is_listening_with, InvokeOptions,
    InvokeOutcome,
};
#[cfg(unix)]
pub use listener::{EndpointListener, ServerConnection};
