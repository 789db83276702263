use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ipclink_frame::{FrameError, DEFAULT_MAX_PAYLOAD};
use ipclink_transport::Endpoint;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

use crate::connector::{self, ConnectOptions, LinkEvent, LinkHandle};
use crate::correlator::{Correlator, PendingReply};
use crate::envelope::Envelope;
use crate::error::{ClientError, Result};
use crate::listeners::{ListenerRegistry, Subscription};
use crate::queue::OutboundQueue;

/// Produces request ids. Must not repeat an id that is still pending.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Random (v4) UUID request ids.
pub fn uuid_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Where the client's most recent link stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// `connect` has not been called.
    Idle,
    /// Attempting to connect.
    Connecting,
    /// Connected; requests are written immediately.
    Connected,
    /// The connection ended. Call `connect` again to reconnect.
    Disconnected,
    /// Every connection attempt failed.
    Destroyed,
}

/// Request/reply and publish/subscribe client for one endpoint.
///
/// Requests sent while disconnected are buffered and written, in order, as
/// soon as a connection is established. Cloning shares the same client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: Endpoint,
    next_id: IdGenerator,
    state: Mutex<State>,
    listeners: ListenerRegistry,
    link_state: watch::Sender<LinkState>,
}

struct State {
    /// Most recent link, connected or not.
    link: Option<LinkHandle>,
    /// Set only while `link` is connected.
    connection: Option<LinkHandle>,
    correlator: Correlator,
    queue: OutboundQueue,
    /// Frame limit of the most recent `connect`.
    max_payload: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            link: None,
            connection: None,
            correlator: Correlator::new(),
            queue: OutboundQueue::new(),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl State {
    fn is_current(&self, link: &LinkHandle) -> bool {
        self.link.as_ref().is_some_and(|current| current.id() == link.id())
    }
}

impl Client {
    /// Client for `endpoint` using random UUID request ids.
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_id_generator(endpoint, uuid_v4)
    }

    /// Client for `endpoint` with a custom request id source.
    pub fn with_id_generator<G>(endpoint: Endpoint, next_id: G) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
    {
        let (link_state, _) = watch::channel(LinkState::Idle);
        Self {
            inner: Arc::new(Inner {
                endpoint,
                next_id: Arc::new(next_id),
                state: Mutex::new(State::default()),
                listeners: ListenerRegistry::new(),
                link_state,
            }),
        }
    }

    /// The endpoint this client talks to.
    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Start connecting in the background.
    ///
    /// On success the outbound queue is flushed first, then `on_connected`
    /// runs once. A previous link, if any, is torn down. There is no automatic
    /// reconnect: after a disconnect, call `connect` again. Must be called from
    /// within a tokio runtime.
    pub fn connect<F>(&self, options: ConnectOptions, on_connected: F)
    where
        F: FnOnce(&LinkHandle) + Send + 'static,
    {
        let max_payload = options.frame.max_payload_size;
        let (link, events) = connector::connect(self.inner.endpoint.clone(), options);
        {
            let mut state = self.inner.lock_state();
            state.max_payload = max_payload;
            if let Some(previous) = state.link.replace(link.clone()) {
                debug!(endpoint = %self.inner.endpoint, link = previous.id(), "replacing previous link");
                previous.disconnect();
            }
            state.connection = None;
            self.inner.link_state.send_replace(LinkState::Connecting);
        }
        tokio::spawn(drive_link(
            Arc::downgrade(&self.inner),
            link,
            events,
            on_connected,
        ));
    }

    /// Close the current link, if any.
    pub fn disconnect(&self) {
        let mut state = self.inner.lock_state();
        state.connection = None;
        if let Some(link) = &state.link {
            link.disconnect();
        }
    }

    /// Call operation `name` with `args`.
    ///
    /// Never fails for lack of a connection: while disconnected the request is
    /// queued. The returned future settles with the reply's `result`, or with
    /// an error if the endpoint answers with an error envelope. A request whose
    /// encoding exceeds the frame limit fails at once and never reaches the
    /// connection. It does not time out.
    pub fn send(&self, name: &str, args: Value) -> PendingReply {
        let id = (self.inner.next_id)();
        let raw = match Envelope::request(id.clone(), name, args).encode() {
            Ok(raw) => raw,
            Err(err) => return PendingReply::failed(id, err),
        };

        let mut state = self.inner.lock_state();
        if raw.len() > state.max_payload {
            let err = oversized(raw.len(), state.max_payload);
            debug!(id, name, error = %err, "request refused");
            return PendingReply::failed(id, err);
        }
        let reply = match state.correlator.register(id.clone()) {
            Ok(reply) => reply,
            Err(err) => return PendingReply::failed(id, err),
        };

        let unsent = match &state.connection {
            Some(connection) => connection.try_emit(raw).err(),
            None => Some(raw),
        };
        match unsent {
            Some(raw) => {
                state.queue.push(raw);
                debug!(id, name, queued = state.queue.len(), "request queued until connected");
            }
            None => trace!(id, name, "request sent"),
        }
        reply
    }

    /// Typed wrapper over [`Client::send`].
    pub async fn call<A, R>(&self, name: &str, args: &A) -> Result<R>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let result = self.send(name, args).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Run `callback` for every push of `event`.
    pub fn subscribe<F>(&self, event: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(event, callback)
    }

    /// Remove every subscriber of `event`.
    pub fn unsubscribe_all(&self, event: &str) {
        self.inner.listeners.unsubscribe_all(event);
    }

    /// The client's listener registry.
    pub fn listeners(&self) -> &ListenerRegistry {
        &self.inner.listeners
    }

    /// Whether requests are currently written straight to a connection.
    pub fn is_connected(&self) -> bool {
        self.inner.lock_state().connection.is_some()
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.inner.link_state.borrow()
    }

    /// Wait until the link state satisfies `predicate`, returning that state.
    pub async fn wait_for_state<P>(&self, mut predicate: P) -> LinkState
    where
        P: FnMut(LinkState) -> bool,
    {
        let mut rx = self.inner.link_state.subscribe();
        let reached = rx
            .wait_for(|state| predicate(*state))
            .await
            .map(|state| *state);
        reached.unwrap_or_else(|_| *rx.borrow())
    }

    /// Requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.inner.lock_state().correlator.len()
    }

    /// Requests buffered until the next connect.
    pub fn queued_messages(&self) -> usize {
        self.inner.lock_state().queue.len()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flush the queue into `link` and make it the live connection.
    fn on_connected(&self, link: &LinkHandle) -> bool {
        let mut state = self.lock_state();
        if !state.is_current(link) {
            link.disconnect();
            return false;
        }

        let queued = state.queue.drain();
        let mut flushed = 0usize;
        let mut pending = queued.into_iter();
        while let Some(raw) = pending.next() {
            // Queued under a larger limit than this link allows.
            if raw.len() > link.max_payload() {
                reject_queued(&mut state.correlator, &raw, link.max_payload());
                continue;
            }
            flushed += 1;
            if let Err(raw) = link.try_emit(raw) {
                warn!(endpoint = %self.endpoint, "link closed while flushing; keeping requests queued");
                state
                    .queue
                    .requeue_front(std::iter::once(raw).chain(pending));
                return false;
            }
        }

        state.connection = Some(link.clone());
        self.link_state.send_replace(LinkState::Connected);
        info!(endpoint = %self.endpoint, flushed, "connected");
        true
    }

    fn on_message(&self, raw: &str) {
        match Envelope::decode(raw) {
            Ok(Envelope::Reply { id, result }) => {
                if !self.lock_state().correlator.resolve(&id, result) {
                    debug!(id, "reply for unknown or settled request");
                }
            }
            Ok(Envelope::Error { id }) => {
                if self.lock_state().correlator.fail(&id) {
                    debug!(id, "endpoint rejected request");
                } else {
                    debug!(id, "error for unknown or settled request");
                }
            }
            Ok(Envelope::Push { name, args }) => {
                let delivered = self.listeners.dispatch(&name, &args);
                trace!(event = %name, delivered, "push dispatched");
            }
            Ok(Envelope::Request { id, name, .. }) => {
                warn!(endpoint = %self.endpoint, id, name, "ignoring request sent by endpoint");
            }
            Err(err) => {
                warn!(endpoint = %self.endpoint, error = %err, "dropping invalid message");
            }
        }
    }

    fn on_disconnected(&self, link: &LinkHandle) {
        let mut state = self.lock_state();
        if state
            .connection
            .as_ref()
            .is_some_and(|connection| connection.id() == link.id())
        {
            state.connection = None;
        }
        if state.is_current(link) {
            self.link_state.send_replace(LinkState::Disconnected);
            info!(endpoint = %self.endpoint, "disconnected");
        }
    }

    fn on_destroyed(&self, link: &LinkHandle) {
        let state = self.lock_state();
        if state.is_current(link) {
            self.link_state.send_replace(LinkState::Destroyed);
            debug!(endpoint = %self.endpoint, "gave up connecting");
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(link) = state.link.take() {
            link.disconnect();
        }
    }
}

fn oversized(size: usize, max: usize) -> ClientError {
    ClientError::Frame(FrameError::PayloadTooLarge { size, max })
}

/// Settle a queued request that cannot be written on the current link.
fn reject_queued(correlator: &mut Correlator, raw: &str, max: usize) {
    if let Ok(Envelope::Request { id, .. }) = Envelope::decode(raw) {
        let err = oversized(raw.len(), max);
        warn!(id, error = %err, "dropping queued request");
        correlator.reject(&id, err);
    }
}

/// Apply one link's events to the client until the link ends or the client
/// is dropped.
async fn drive_link<F>(
    inner: Weak<Inner>,
    link: LinkHandle,
    mut events: mpsc::UnboundedReceiver<LinkEvent>,
    on_connected: F,
) where
    F: FnOnce(&LinkHandle) + Send + 'static,
{
    let mut on_connected = Some(on_connected);
    while let Some(event) = events.recv().await {
        let Some(client) = inner.upgrade() else {
            link.disconnect();
            return;
        };
        match event {
            LinkEvent::Connected => {
                if client.on_connected(&link) {
                    if let Some(callback) = on_connected.take() {
                        if catch_unwind(AssertUnwindSafe(|| callback(&link))).is_err() {
                            warn!(endpoint = %client.endpoint, "on_connected callback panicked");
                        }
                    }
                }
            }
            LinkEvent::Message(raw) => client.on_message(&raw),
            LinkEvent::Disconnected => client.on_disconnected(&link),
            LinkEvent::Destroyed => client.on_destroyed(&link),
        }
    }
}
