//! One logical client connection.
//!
//! A [`Socket`] owns its ordered room-join list and the pending-request
//! table for ack correlation. The cheap, clonable [`SocketHandle`] carries
//! everything needed to address the connection from a broadcast: identity,
//! handshake session and the outbound queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Envelope, ProtocolError, WireError};

use super::broadcaster::Broadcaster;
use super::middleware::HandshakeSession;

/// Process-unique connection identity, allocated at accept time.
pub type SocketId = Uuid;

/// Reply callback for an outbound request; invoked at most once.
pub type AckCallback = Box<dyn FnOnce(Result<Option<Value>, WireError>) + Send>;

/// Addressing info for one connection, safe to hold in room member sets.
#[derive(Clone)]
pub struct SocketHandle {
    id: SocketId,
    session: Arc<HandshakeSession>,
    outbound: mpsc::UnboundedSender<Envelope>,
}

impl SocketHandle {
    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn session(&self) -> &HandshakeSession {
        &self.session
    }

    pub fn uid(&self) -> Option<&str> {
        self.session.uid()
    }

    /// Fire-and-forget event (channel 0, no correlation id).
    pub fn emit(&self, event: &str, payload: Value) {
        self.send(Envelope::event(event, payload));
    }

    pub(crate) fn send(&self, envelope: Envelope) {
        // The connection may already be tearing down; sending to a vanished
        // socket is not an error.
        if self.outbound.send(envelope).is_err() {
            tracing::debug!(socket_id = %self.id, "dropping message for closed connection");
        }
    }
}

pub struct Socket {
    handle: SocketHandle,
    broadcaster: Arc<Broadcaster>,
    connected_at: DateTime<Utc>,
    /// Rooms in join order; `leave_all` unwinds in reverse.
    subscriptions: Mutex<Vec<String>>,
    pending: Mutex<HashMap<u64, AckCallback>>,
    next_request_id: AtomicU64,
}

impl Socket {
    pub(crate) fn new(
        id: SocketId,
        session: Arc<HandshakeSession>,
        broadcaster: Arc<Broadcaster>,
        outbound: mpsc::UnboundedSender<Envelope>,
    ) -> Arc<Self> {
        Arc::new(Self {
            handle: SocketHandle {
                id,
                session,
                outbound,
            },
            broadcaster,
            connected_at: Utc::now(),
            subscriptions: Mutex::new(Vec::new()),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
        })
    }

    pub fn id(&self) -> SocketId {
        self.handle.id
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn uid(&self) -> Option<&str> {
        self.handle.uid()
    }

    pub fn session(&self) -> &HandshakeSession {
        self.handle.session()
    }

    pub fn handle(&self) -> &SocketHandle {
        &self.handle
    }

    pub fn emit(&self, event: &str, payload: Value) {
        self.handle.emit(event, payload);
    }

    /// Sends a channel-0 envelope with a fresh correlation id and registers
    /// `on_reply` to run when the matching channel-1 envelope arrives.
    pub fn request(
        &self,
        event: &str,
        payload: Value,
        on_reply: impl FnOnce(Result<Option<Value>, WireError>) + Send + 'static,
    ) {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .insert(id, Box::new(on_reply));
        self.handle.send(Envelope::request(event, payload, id));
    }

    /// Resolves an inbound ack against the pending-request table.
    ///
    /// General acknowledgement multiplexing beyond reply correlation is
    /// unsupported; an ack that matches nothing is an explicit error, never
    /// a silent no-op.
    pub(crate) fn resolve_ack(
        &self,
        id: u64,
        result: Result<Option<Value>, WireError>,
    ) -> Result<(), ProtocolError> {
        let callback = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&id)
            .ok_or(ProtocolError::UnmatchedAck(id))?;
        callback(result);
        Ok(())
    }

    // -- Room membership ---------------------------------------------------

    /// Joins a room, keeping the registry and the socket's own join list in
    /// step. Joining a room twice is a no-op on both sides.
    pub fn join(&self, room: &str) {
        self.broadcaster.join(room, self.handle.clone());
        let mut subscriptions = self.subscriptions.lock().expect("subscriptions poisoned");
        if !subscriptions.iter().any(|r| r == room) {
            subscriptions.push(room.to_string());
        }
    }

    pub fn leave(&self, room: &str) -> Result<(), super::broadcaster::RoomError> {
        self.broadcaster.leave(room, self.handle.id)?;
        let mut subscriptions = self.subscriptions.lock().expect("subscriptions poisoned");
        if let Some(position) = subscriptions.iter().position(|r| r == room) {
            subscriptions.remove(position);
        }
        Ok(())
    }

    /// Leaves every joined room in reverse join order. Individual failures
    /// are logged and do not stop the unwind.
    pub fn leave_all(&self) {
        let rooms = self.rooms();
        for room in rooms.iter().rev() {
            if let Err(err) = self.leave(room) {
                tracing::warn!(socket_id = %self.id(), room, %err, "failed to leave room");
            }
        }
    }

    /// Snapshot of the joined rooms, in join order.
    pub fn rooms(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .expect("subscriptions poisoned")
            .clone()
    }

    /// Members of `room` excluding this socket (the `to` direction).
    pub fn others_in(&self, room: &str) -> Vec<SocketHandle> {
        self.broadcaster
            .members(room)
            .into_iter()
            .filter(|member| member.id() != self.handle.id)
            .collect()
    }

    /// All members of `room` including this socket (the `in` direction).
    pub fn everyone_in(&self, room: &str) -> Vec<SocketHandle> {
        self.broadcaster.members(room)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::loopback_socket;
    use super::*;
    use serde_json::json;

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new())
    }

    #[test]
    fn join_and_leave_keep_both_sides_in_step() {
        let broadcaster = broadcaster();
        let (socket, _rx) = loopback_socket(broadcaster.clone(), Some("u1"));

        socket.join("t1");
        socket.join("t2");
        socket.join("t1"); // idempotent
        assert_eq!(socket.rooms(), vec!["t1".to_string(), "t2".to_string()]);
        assert!(broadcaster.contains("t1", socket.id()));
        assert!(broadcaster.contains("t2", socket.id()));

        socket.leave("t1").unwrap();
        assert_eq!(socket.rooms(), vec!["t2".to_string()]);
        assert!(!broadcaster.room_exists("t1"));
    }

    #[test]
    fn leave_all_unwinds_every_room() {
        let broadcaster = broadcaster();
        let (socket, _rx) = loopback_socket(broadcaster.clone(), Some("u1"));

        for room in ["a", "b", "c"] {
            socket.join(room);
        }
        socket.leave_all();

        assert!(socket.rooms().is_empty());
        assert_eq!(broadcaster.room_count(), 0);
        // A second unwind is harmless.
        socket.leave_all();
    }

    #[test]
    fn broadcast_helpers_split_self_from_others() {
        let broadcaster = broadcaster();
        let (alice, _rx_a) = loopback_socket(broadcaster.clone(), Some("alice"));
        let (bob, _rx_b) = loopback_socket(broadcaster.clone(), Some("bob"));

        alice.join("t1");
        bob.join("t1");

        let others: Vec<_> = alice.others_in("t1").iter().map(SocketHandle::id).collect();
        assert_eq!(others, vec![bob.id()]);
        assert_eq!(alice.everyone_in("t1").len(), 2);
    }

    #[tokio::test]
    async fn request_reply_is_resolved_at_most_once() {
        let broadcaster = broadcaster();
        let (socket, mut rx) = loopback_socket(broadcaster, Some("u1"));

        let (result_tx, mut result_rx) = mpsc::unbounded_channel();
        socket.request("ping", json!({}), move |result| {
            result_tx.send(result).unwrap();
        });

        let sent = rx.recv().await.unwrap();
        let request_id = sent.id.expect("request carries an id");

        socket
            .resolve_ack(request_id, Ok(Some(json!({"pong": true}))))
            .unwrap();
        let delivered = result_rx.recv().await.unwrap().unwrap();
        assert_eq!(delivered, Some(json!({"pong": true})));

        // The same id resolves exactly once; a second ack is a loud error.
        let err = socket.resolve_ack(request_id, Ok(None)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnmatchedAck(id) if id == request_id));
    }

    #[test]
    fn unmatched_ack_is_rejected() {
        let broadcaster = broadcaster();
        let (socket, _rx) = loopback_socket(broadcaster, None);

        let err = socket.resolve_ack(42, Ok(None)).unwrap_err();
        assert!(matches!(err, ProtocolError::UnmatchedAck(42)));
    }

    #[test]
    fn emitting_to_a_closed_connection_is_a_silent_no_op() {
        let broadcaster = broadcaster();
        let (socket, rx) = loopback_socket(broadcaster, None);
        drop(rx);
        socket.emit("reserveSeat", json!({})); // must not panic
    }
}
