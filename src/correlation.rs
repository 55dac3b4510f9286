//! Outbound call correlation.
//!
//! The original busy-waits: `contact_microservice` stores a tag in a
//! shared dict, then polls `self._data` every millisecond until the
//! dispatcher's `__exec` fills it in or ten seconds pass. This replaces
//! the poll with a `tokio::sync::oneshot` channel per tag, the same
//! producer/consumer split `ConcurrentProcessor` uses for its worker
//! handoff in `concurrent/message_processor.rs`: insert a sender keyed
//! by tag, hand the receiver to the caller, and have the dispatcher's
//! reply branch do a single `remove` + `send`. A tag can only be
//! consumed once because the oneshot itself is single-use - there is no
//! separate bookkeeping to get wrong.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::errors::RelayError;

/// Matches the original's `SERVICE_REQUEST_MAX_TIMEOUT`.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Default)]
pub struct CorrelationTable {
    pending: DashMap<String, oneshot::Sender<Value>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `tag` has an outstanding call awaiting reply - this is
    /// what the dispatcher consults to classify an inbound frame as a
    /// `Reply` ahead of the `ms`/`user` structural checks.
    pub fn is_awaiting(&self, tag: &str) -> bool {
        self.pending.contains_key(tag)
    }

    /// Register `tag` as awaiting a reply, returning the receiver half
    /// the caller awaits on.
    fn register(&self, tag: String) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(tag, tx);
        rx
    }

    /// Deliver `data` to whoever is awaiting `tag`. Removes the entry so
    /// the tag cannot be delivered to twice; a send to a receiver nobody
    /// is polling anymore (already timed out and dropped) is silently
    /// discarded, same as the original dropping the response on the
    /// floor once `SERVICE_REQUEST_MAX_TIMEOUT` has elapsed.
    pub fn deliver(&self, tag: &str, data: Value) -> bool {
        match self.pending.remove(tag) {
            Some((_, tx)) => tx.send(data).is_ok(),
            None => false,
        }
    }

    /// Wait up to [`CALL_TIMEOUT`] for a reply to `tag`. On timeout the
    /// entry is removed so a late-arriving reply cannot be delivered to
    /// a stale registration.
    pub async fn wait_for(&self, tag: String, rx: oneshot::Receiver<Value>) -> Result<Value, RelayError> {
        match timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(RelayError::Timeout { tag }),
            Err(_) => {
                self.pending.remove(&tag);
                Err(RelayError::Timeout { tag })
            }
        }
    }

    /// Register and wait in one step - the shape `call_peer` and
    /// `lookup_user` both use, since both share the same ten-second
    /// timeout.
    pub async fn call(&self, tag: String) -> CallHandle<'_> {
        let rx = self.register(tag.clone());
        CallHandle { table: self, tag, rx: Some(rx) }
    }
}

/// A registered-but-not-yet-awaited call. Kept separate from `register`
/// so callers can send their outbound frame after registering the tag
/// (avoiding the race where a reply arrives before the tag is known)
/// without yet paying the cost of the timeout wait.
pub struct CallHandle<'a> {
    table: &'a CorrelationTable,
    tag: String,
    rx: Option<oneshot::Receiver<Value>>,
}

impl<'a> CallHandle<'a> {
    pub async fn wait(mut self) -> Result<Value, RelayError> {
        let rx = self.rx.take().expect("wait() called more than once");
        self.table.wait_for(self.tag.clone(), rx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivered_reply_resolves_the_call() {
        let table = CorrelationTable::new();
        let handle = table.call("t1".to_string()).await;
        assert!(table.is_awaiting("t1"));

        assert!(table.deliver("t1", json!({"ok": true})));
        let result = handle.wait().await.unwrap();
        assert_eq!(result, json!({"ok": true}));
        assert!(!table.is_awaiting("t1"));
    }

    #[tokio::test]
    async fn delivering_to_unknown_tag_is_a_noop() {
        let table = CorrelationTable::new();
        assert!(!table.deliver("ghost", json!(null)));
    }

    #[tokio::test]
    async fn a_tag_can_only_be_delivered_once() {
        let table = CorrelationTable::new();
        let handle = table.call("t1".to_string()).await;
        assert!(table.deliver("t1", json!(1)));
        assert!(!table.deliver("t1", json!(2)));
        assert_eq!(handle.wait().await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn timeout_removes_the_pending_entry() {
        let table = CorrelationTable::new();
        let rx = table.register("t1".to_string());
        drop(rx);
        // Sender is still held by the table; sending now should fail
        // since the receiver was dropped.
        assert!(!table.deliver("t1", json!(1)));
        assert!(!table.is_awaiting("t1"));
    }
}
