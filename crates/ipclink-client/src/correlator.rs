use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{ClientError, Result};

type Completion = oneshot::Sender<Result<Value>>;

/// In-flight requests keyed by id.
///
/// Each entry settles exactly once: the first matching reply or error wins,
/// later ones find no entry and are ignored.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: HashMap<String, Completion>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `id` and return the future its reply settles.
    pub fn register(&mut self, id: impl Into<String>) -> Result<PendingReply> {
        let id = id.into();
        if self.pending.contains_key(&id) {
            return Err(ClientError::DuplicateRequestId { id });
        }
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);
        Ok(PendingReply { id, rx })
    }

    /// Settle `id` with a successful result.
    ///
    /// Returns `false` (and does nothing) if `id` is not pending.
    pub fn resolve(&mut self, id: &str, result: Value) -> bool {
        self.settle(id, Ok(result))
    }

    /// Settle `id` after the endpoint answered with an error envelope.
    ///
    /// Returns `false` (and does nothing) if `id` is not pending.
    pub fn fail(&mut self, id: &str) -> bool {
        self.settle(id, Err(ClientError::RemoteError { id: id.to_string() }))
    }

    /// Settle `id` with a local failure, e.g. a request that could not be
    /// written.
    ///
    /// Returns `false` (and does nothing) if `id` is not pending.
    pub fn reject(&mut self, id: &str, err: ClientError) -> bool {
        self.settle(id, Err(err))
    }

    fn settle(&mut self, id: &str, outcome: Result<Value>) -> bool {
        let Some(completion) = self.pending.remove(id) else {
            debug!(id, "no pending request for id; dropping");
            return false;
        };
        if completion.send(outcome).is_err() {
            debug!(id, "caller stopped waiting for reply");
        }
        true
    }

    /// Whether `id` is waiting for its reply.
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Ids of all pending requests, sorted (for diagnostics).
    pub fn pending_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pending.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// The eventual reply to one request.
///
/// Resolves with the reply's `result`, or an error when the endpoint answered
/// with an error envelope or the client went away first. There is no timeout.
#[derive(Debug)]
pub struct PendingReply {
    id: String,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingReply {
    /// A reply that is already settled with `err`.
    pub(crate) fn failed(id: impl Into<String>, err: ClientError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { id: id.into(), rx }
    }

    /// Id of the request this reply belongs to.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingReply {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Closed {
                id: this.id.clone(),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn resolve_settles_registered_request() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();
        assert_eq!(reply.id(), "a");
        assert!(correlator.contains("a"));

        assert!(correlator.resolve("a", json!({"x": 1})));
        assert!(correlator.is_empty());
        assert_eq!(reply.await.unwrap(), json!({"x": 1}));
    }

    #[tokio::test]
    async fn string_result_is_still_a_successful_reply() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();
        correlator.resolve("a", json!("boom"));
        assert_eq!(reply.await.unwrap(), json!("boom"));
    }

    #[tokio::test]
    async fn fail_rejects_with_remote_error() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();
        assert!(correlator.fail("a"));
        assert!(!correlator.contains("a"));

        let err = reply.await.unwrap_err();
        assert!(matches!(err, ClientError::RemoteError { ref id } if id == "a"));
    }

    #[tokio::test]
    async fn reject_settles_with_the_given_error() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();
        assert!(correlator.reject("a", ClientError::NotConnected));
        assert!(!correlator.reject("a", ClientError::NotConnected));
        assert!(matches!(reply.await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn duplicate_reply_is_a_no_op() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();

        assert!(correlator.resolve("a", json!(1)));
        assert!(!correlator.resolve("a", json!(2)));
        assert!(!correlator.fail("a"));
        assert_eq!(reply.await.unwrap(), json!(1));
    }

    #[test]
    fn unknown_ids_are_ignored() {
        let mut correlator = Correlator::new();
        assert!(!correlator.resolve("ghost", json!(null)));
        assert!(!correlator.fail("ghost"));
        assert!(correlator.is_empty());
    }

    #[test]
    fn register_refuses_an_id_that_is_still_pending() {
        let mut correlator = Correlator::new();
        let _first = correlator.register("a").unwrap();
        let err = correlator.register("a").unwrap_err();
        assert!(matches!(err, ClientError::DuplicateRequestId { ref id } if id == "a"));
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn id_can_be_reused_after_it_settles() {
        let mut correlator = Correlator::new();
        let _first = correlator.register("a").unwrap();
        correlator.resolve("a", json!(1));
        assert!(correlator.register("a").is_ok());
    }

    #[test]
    fn resolving_after_caller_gave_up_still_removes_entry() {
        let mut correlator = Correlator::new();
        drop(correlator.register("a").unwrap());
        assert!(correlator.resolve("a", json!(1)));
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn dropped_correlator_closes_pending_replies() {
        let mut correlator = Correlator::new();
        let reply = correlator.register("a").unwrap();
        drop(correlator);
        assert!(matches!(reply.await, Err(ClientError::Closed { .. })));
    }

    #[test]
    fn pending_ids_are_sorted() {
        let mut correlator = Correlator::new();
        let _b = correlator.register("b").unwrap();
        let _a = correlator.register("a").unwrap();
        assert_eq!(correlator.pending_ids(), vec!["a", "b"]);
    }
}
