use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use ipclink_frame::{FrameCodec, FrameConfig, FrameError};
use ipclink_transport::{Endpoint, RetryPolicy, UnixDomainSocket};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle and traffic of one connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The socket is connected. Sent at most once per link.
    Connected,
    /// One inbound message.
    Message(String),
    /// An established connection ended (peer closed, I/O error, or
    /// [`LinkHandle::disconnect`]). Always the last event after `Connected`.
    Disconnected,
    /// The connection could not be established. The only event for a link
    /// that never connected.
    Destroyed,
}

/// Options for opening a link.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Log per-attempt failures at debug level only.
    pub silent: bool,
    /// Bounded retry policy for the initial connect.
    pub retry: RetryPolicy,
    /// Frame limits for this connection.
    pub frame: FrameConfig,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            silent: true,
            retry: RetryPolicy::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl ConnectOptions {
    /// Default options with an explicit retry budget.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            retry: RetryPolicy::with_max_retries(max_retries),
            ..Self::default()
        }
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Sending side of a link.
///
/// Cheap to clone. Messages emitted before the socket connects are written
/// once it does.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    id: u64,
    endpoint: Endpoint,
    max_payload: usize,
    outbound: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl LinkHandle {
    /// Process-unique id of this link.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Endpoint this link points at.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Largest message this link will write, in bytes.
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    /// Queue one raw message for writing.
    ///
    /// Messages over [`LinkHandle::max_payload`] are refused up front.
    pub fn emit(&self, raw: impl Into<String>) -> Result<()> {
        let raw = raw.into();
        if raw.len() > self.max_payload {
            return Err(FrameError::PayloadTooLarge {
                size: raw.len(),
                max: self.max_payload,
            }
            .into());
        }
        self.try_emit(raw).map_err(|_| ClientError::NotConnected)
    }

    /// Like [`LinkHandle::emit`], handing the message back when the link is
    /// gone.
    pub(crate) fn try_emit(&self, raw: String) -> std::result::Result<(), String> {
        if self.cancel.is_cancelled() {
            return Err(raw);
        }
        self.outbound.send(raw).map_err(|err| err.0)
    }

    /// Tear the link down. Idempotent.
    pub fn disconnect(&self) {
        self.cancel.cancel();
    }

    /// Whether the link has been torn down.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Open a link to `endpoint` in the background.
///
/// Returns immediately; progress arrives on the event receiver. Must be called
/// from within a tokio runtime.
pub fn connect(
    endpoint: Endpoint,
    options: ConnectOptions,
) -> (LinkHandle, mpsc::UnboundedReceiver<LinkEvent>) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let handle = LinkHandle {
        id: NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed),
        endpoint: endpoint.clone(),
        max_payload: options.frame.max_payload_size,
        outbound: outbound_tx,
        cancel: CancellationToken::new(),
    };

    tokio::spawn(run_link(
        handle.id,
        endpoint,
        options,
        outbound_rx,
        handle.cancel.clone(),
        event_tx,
    ));

    (handle, event_rx)
}

async fn run_link(
    link: u64,
    endpoint: Endpoint,
    options: ConnectOptions,
    outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<LinkEvent>,
) {
    let connected = tokio::select! {
        () = cancel.cancelled() => {
            debug!(link, endpoint = %endpoint, "link cancelled before connecting");
            let _ = events.send(LinkEvent::Destroyed);
            return;
        }
        result = UnixDomainSocket::connect_with_retry(&endpoint, &options.retry, options.silent) => result,
    };

    let stream = match connected {
        Ok(stream) => stream,
        Err(err) => {
            if options.silent {
                debug!(link, endpoint = %endpoint, error = %err, "giving up on endpoint");
            } else {
                warn!(link, endpoint = %endpoint, error = %err, "giving up on endpoint");
            }
            let _ = events.send(LinkEvent::Destroyed);
            return;
        }
    };

    if options.silent {
        debug!(link, endpoint = %endpoint, "link connected");
    } else {
        info!(link, endpoint = %endpoint, "link connected");
    }
    if events.send(LinkEvent::Connected).is_err() {
        cancel.cancel();
        return;
    }

    let (sink, mut frames) = Framed::new(stream, FrameCodec::with_config(options.frame)).split();
    let writer = tokio::spawn(write_loop(link, sink, outbound, cancel.clone()));

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            inbound = frames.next() => match inbound {
                Some(Ok(payload)) => match String::from_utf8(payload.to_vec()) {
                    Ok(raw) => {
                        if events.send(LinkEvent::Message(raw)).is_err() {
                            break;
                        }
                    }
                    Err(_) => warn!(link, size = payload.len(), "dropping non-UTF-8 message"),
                },
                Some(Err(err)) => {
                    warn!(link, error = %err, "link read failed");
                    break;
                }
                None => {
                    debug!(link, "endpoint closed the connection");
                    break;
                }
            },
        }
    }

    cancel.cancel();
    let _ = writer.await;
    debug!(link, endpoint = %endpoint, "link disconnected");
    let _ = events.send(LinkEvent::Disconnected);
}

async fn write_loop(
    link: u64,
    mut sink: SplitSink<Framed<UnixStream, FrameCodec>, Bytes>,
    mut outbound: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = outbound.recv() => match next {
                Some(raw) => match sink.send(Bytes::from(raw)).await {
                    Ok(()) => {}
                    // Rejected before anything reached the buffer; the link is intact.
                    Err(err @ FrameError::PayloadTooLarge { .. }) => {
                        warn!(link, error = %err, "dropping oversized message");
                    }
                    Err(err) => {
                        warn!(link, error = %err, "link write failed");
                        cancel.cancel();
                        break;
                    }
                },
                // Every handle is gone; nobody can write or wants to read.
                None => {
                    cancel.cancel();
                    break;
                }
            },
        }
    }
    let _ = sink.close().await;
}
