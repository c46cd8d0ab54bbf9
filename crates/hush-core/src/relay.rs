//! Relay broadcaster.
//!
//! Stateless with respect to content: the relay persists and fans out opaque
//! ciphertext blobs to the live subscribers of a thread digest, never parsing
//! the payload. Capability checks happen at subscribe time in the runtime;
//! by the time a frame reaches `publish` the connection is already vetted.
//!
//! # Ordering
//!
//! Messages published to the same thread are delivered to each live
//! subscriber in publish order. `publish` persists and fans out under the
//! registry lock, so the per-thread order every subscriber's channel sees is
//! exactly the persistence order. No ordering holds across threads.
//!
//! # Dead connections
//!
//! A send failure means the receiving task is gone; the subscriber is pruned
//! on the spot, and `remove_connection` purges a closed connection from
//! every thread it subscribed to, so delivery attempts to dead connections
//! do not accumulate.
//!
//! # Teardown
//!
//! Deregistration is authoritative in both directions. `publish` refuses
//! frames from a connection that is no longer registered, and every
//! registration hands back a teardown signal that resolves once the
//! connection is dropped from the registry — the runtime's socket task
//! watches it and closes the socket, so a wiped deployment cannot be
//! repopulated by a pre-wipe connection.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use hush_crypto::ThreadId;
use hush_proto::ServerFrame;
use thiserror::Error;
use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::storage::{MessageRecord, Storage, StorageError};

/// Runtime-assigned identifier for one relay connection.
pub type ConnectionId = u64;

/// Errors from relay operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// The connection was never registered or has been removed.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// Persisting the message failed; nothing was delivered.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

struct Subscriber {
    conn_id: ConnectionId,
    sender: UnboundedSender<ServerFrame>,
}

struct ConnectionEntry {
    sender: UnboundedSender<ServerFrame>,
    /// Dropped with the entry; the paired receiver then resolves, which is
    /// how the socket task learns its registration is gone.
    _closer: watch::Sender<()>,
}

#[derive(Default)]
struct Registry {
    /// Per-thread subscriber lists, in subscribe order.
    subscribers: HashMap<ThreadId, Vec<Subscriber>>,
    /// Registered connections and their outbound channels.
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Reverse index for prompt cleanup on disconnect.
    threads_by_conn: HashMap<ConnectionId, HashSet<ThreadId>>,
}

/// Fan-out hub for the relay channel.
///
/// Shared across connection tasks; all registry mutations and the
/// persist-then-deliver sequence are serialized by one internal lock.
pub struct RelayBroadcaster<S: Storage> {
    storage: S,
    registry: Mutex<Registry>,
}

impl<S: Storage> RelayBroadcaster<S> {
    /// Create a relay over a storage backend.
    pub fn new(storage: S) -> Self {
        Self { storage, registry: Mutex::new(Registry::default()) }
    }

    /// The storage backend this relay persists into.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a connection's outbound channel.
    ///
    /// Must precede any `subscribe` or `publish` for that connection. The
    /// returned receiver resolves (with `Err` from `changed`) once the
    /// connection leaves the registry, whether through `remove_connection`
    /// or `disconnect_all`; the socket task must then close the socket.
    pub fn register_connection(
        &self,
        conn_id: ConnectionId,
        sender: UnboundedSender<ServerFrame>,
    ) -> watch::Receiver<()> {
        let (closer, closed) = watch::channel(());
        let mut registry = self.lock();
        registry.connections.insert(conn_id, ConnectionEntry { sender, _closer: closer });
        registry.threads_by_conn.entry(conn_id).or_default();
        closed
    }

    /// Subscribe a registered connection to a thread digest.
    ///
    /// Idempotent: subscribing twice keeps a single delivery slot.
    ///
    /// # Errors
    ///
    /// [`RelayError::UnknownConnection`] if the connection was never
    /// registered (or already removed).
    pub fn subscribe(&self, conn_id: ConnectionId, thread_id: ThreadId) -> Result<(), RelayError> {
        let mut registry = self.lock();

        let Some(sender) = registry.connections.get(&conn_id).map(|c| c.sender.clone()) else {
            return Err(RelayError::UnknownConnection(conn_id));
        };

        let subscribers = registry.subscribers.entry(thread_id).or_default();
        if !subscribers.iter().any(|s| s.conn_id == conn_id) {
            subscribers.push(Subscriber { conn_id, sender });
        }

        registry.threads_by_conn.entry(conn_id).or_default().insert(thread_id);
        Ok(())
    }

    /// Remove one subscription.
    pub fn unsubscribe(&self, conn_id: ConnectionId, thread_id: ThreadId) {
        let mut registry = self.lock();

        if let Some(subscribers) = registry.subscribers.get_mut(&thread_id) {
            subscribers.retain(|s| s.conn_id != conn_id);
            if subscribers.is_empty() {
                registry.subscribers.remove(&thread_id);
            }
        }

        if let Some(threads) = registry.threads_by_conn.get_mut(&conn_id) {
            threads.remove(&thread_id);
        }
    }

    /// Remove a closed connection from every subscriber set.
    pub fn remove_connection(&self, conn_id: ConnectionId) {
        let mut registry = self.lock();

        let threads = registry.threads_by_conn.remove(&conn_id).unwrap_or_default();
        for thread_id in threads {
            if let Some(subscribers) = registry.subscribers.get_mut(&thread_id) {
                subscribers.retain(|s| s.conn_id != conn_id);
                if subscribers.is_empty() {
                    registry.subscribers.remove(&thread_id);
                }
            }
        }

        registry.connections.remove(&conn_id);
    }

    /// Persist a blob from a registered connection and deliver it to every
    /// live subscriber of the thread.
    ///
    /// The blob is forwarded exactly as received, plus the routing metadata
    /// (id, timestamp) assigned at persistence. Subscribers whose channel is
    /// closed are pruned instead of delivered to.
    ///
    /// # Errors
    ///
    /// [`RelayError::UnknownConnection`] if the publisher has been removed
    /// from the registry — in particular by a wipe's `disconnect_all`, after
    /// which nothing may write into the fresh store. [`RelayError::Storage`]
    /// if persistence fails; nothing is delivered in that case.
    pub fn publish(
        &self,
        publisher: ConnectionId,
        thread_id: ThreadId,
        ciphertext: String,
        iv: String,
        now_ms: u64,
    ) -> Result<MessageRecord, RelayError> {
        // Persist and fan out under one guard so per-thread delivery order
        // matches persistence order for every subscriber, and so the
        // registration check cannot race a concurrent disconnect_all
        let mut registry = self.lock();

        if !registry.connections.contains_key(&publisher) {
            return Err(RelayError::UnknownConnection(publisher));
        }

        let record =
            self.storage.store_message(thread_id, ciphertext, iv, now_ms)?;

        let frame = ServerFrame::Message {
            id: record.id.clone(),
            thread_id: thread_id.to_hex(),
            ciphertext: record.ciphertext.clone(),
            iv: record.iv.clone(),
            created_at: record.created_at,
        };

        if let Some(subscribers) = registry.subscribers.get_mut(&thread_id) {
            let before = subscribers.len();
            subscribers.retain(|s| s.sender.send(frame.clone()).is_ok());
            let pruned = before - subscribers.len();
            if pruned > 0 {
                tracing::debug!(thread = %thread_id, pruned, "pruned dead subscribers");
            }
        }

        Ok(record)
    }

    /// Drop every connection and subscription (wipe path).
    ///
    /// Every teardown signal handed out by `register_connection` resolves,
    /// the runtime closes the sockets, and any frame still in flight from a
    /// dropped connection is refused by `publish`.
    pub fn disconnect_all(&self) {
        let mut registry = self.lock();
        registry.subscribers.clear();
        registry.connections.clear();
        registry.threads_by_conn.clear();
    }

    /// Live subscriber count for a thread (tests).
    pub fn subscriber_count(&self, thread_id: ThreadId) -> usize {
        self.lock().subscribers.get(&thread_id).map_or(0, Vec::len)
    }

    /// Registered connection count (tests).
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }
}

#[cfg(test)]
mod tests {
    use hush_crypto::thread_id;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use super::*;
    use crate::storage::MemoryStorage;

    fn relay() -> RelayBroadcaster<MemoryStorage> {
        RelayBroadcaster::new(MemoryStorage::new())
    }

    fn connect(
        relay: &RelayBroadcaster<MemoryStorage>,
        conn_id: ConnectionId,
    ) -> UnboundedReceiver<ServerFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = relay.register_connection(conn_id, tx);
        rx
    }

    fn received_ciphertexts(rx: &mut UnboundedReceiver<ServerFrame>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let ServerFrame::Message { ciphertext, .. } = frame {
                out.push(ciphertext);
            }
        }
        out
    }

    #[test]
    fn publish_reaches_all_subscribers() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let mut rx1 = connect(&relay, 1);
        let mut rx2 = connect(&relay, 2);
        relay.subscribe(1, tid).unwrap();
        relay.subscribe(2, tid).unwrap();

        relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        assert_eq!(received_ciphertexts(&mut rx1), vec!["Y3Q=".to_string()]);
        assert_eq!(received_ciphertexts(&mut rx2), vec!["Y3Q=".to_string()]);
    }

    #[test]
    fn publish_persists_before_delivery() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let _rx = connect(&relay, 1);
        let record = relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        let stored = relay.storage().load_messages(tid, 10).unwrap();
        assert_eq!(stored, vec![record]);
    }

    #[test]
    fn per_thread_order_is_preserved() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let mut rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();

        for i in 0..10 {
            relay.publish(1, tid, format!("ct{i}"), "aXY=".into(), i).unwrap();
        }

        let received = received_ciphertexts(&mut rx);
        let expected: Vec<String> = (0..10).map(|i| format!("ct{i}")).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn threads_do_not_cross_deliver() {
        let relay = relay();
        let ab = thread_id("alice", "bob");
        let cd = thread_id("carol", "dave");

        let mut rx = connect(&relay, 1);
        relay.subscribe(1, ab).unwrap();

        relay.publish(1, cd, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        assert!(received_ciphertexts(&mut rx).is_empty());
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let mut rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();
        relay.unsubscribe(1, tid);

        relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        assert!(received_ciphertexts(&mut rx).is_empty());
        assert_eq!(relay.subscriber_count(tid), 0);
    }

    #[test]
    fn subscribe_requires_registration() {
        let relay = relay();
        let tid = thread_id("alice", "bob");
        assert_eq!(relay.subscribe(7, tid), Err(RelayError::UnknownConnection(7)));
    }

    #[test]
    fn double_subscribe_delivers_once() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let mut rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();
        relay.subscribe(1, tid).unwrap();

        relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        assert_eq!(received_ciphertexts(&mut rx).len(), 1);
    }

    #[test]
    fn remove_connection_purges_every_subscription() {
        let relay = relay();
        let ab = thread_id("alice", "bob");
        let ac = thread_id("alice", "carol");

        let _rx = connect(&relay, 1);
        relay.subscribe(1, ab).unwrap();
        relay.subscribe(1, ac).unwrap();

        relay.remove_connection(1);

        assert_eq!(relay.subscriber_count(ab), 0);
        assert_eq!(relay.subscriber_count(ac), 0);
        assert_eq!(relay.connection_count(), 0);
    }

    #[test]
    fn dropped_receiver_is_pruned_on_publish() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();
        drop(rx);

        relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        assert_eq!(relay.subscriber_count(tid), 0);
    }

    #[test]
    fn publish_requires_live_registration() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let err = relay.publish(9, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap_err();

        assert_eq!(err, RelayError::UnknownConnection(9));
        assert_eq!(relay.storage().message_count().unwrap(), 0);
    }

    #[test]
    fn dropped_connection_cannot_repopulate_a_wiped_store() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let _rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();
        relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 100).unwrap();

        relay.disconnect_all();
        relay.storage().wipe_all().unwrap();

        // The old connection's frames are refused, not persisted
        let err = relay.publish(1, tid, "Y3Q=".into(), "aXY=".into(), 200).unwrap_err();
        assert_eq!(err, RelayError::UnknownConnection(1));
        assert_eq!(relay.storage().message_count().unwrap(), 0);
    }

    #[test]
    fn teardown_signal_resolves_on_disconnect_all() {
        let relay = relay();
        let (tx, _rx) = mpsc::unbounded_channel();
        let closed = relay.register_connection(1, tx);

        assert!(closed.has_changed().is_ok());
        relay.disconnect_all();
        assert!(closed.has_changed().is_err());
    }

    #[test]
    fn teardown_signal_resolves_on_remove_connection() {
        let relay = relay();
        let (tx, _rx) = mpsc::unbounded_channel();
        let closed = relay.register_connection(1, tx);

        relay.remove_connection(1);
        assert!(closed.has_changed().is_err());
    }

    #[test]
    fn disconnect_all_clears_registry_and_closes_channels() {
        let relay = relay();
        let tid = thread_id("alice", "bob");

        let mut rx = connect(&relay, 1);
        relay.subscribe(1, tid).unwrap();

        relay.disconnect_all();

        assert_eq!(relay.connection_count(), 0);
        assert_eq!(relay.subscriber_count(tid), 0);
        // Sender side dropped with the registry: the channel reports closure
        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
    }
}
