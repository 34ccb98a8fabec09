//! Transport server: accepts WebSocket upgrades, runs the handshake
//! middleware pipeline, owns the live socket registry and provides
//! server-wide addressing (to one socket, to a room).

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock, RwLock};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::{Channel, ClientEvent, Envelope, ProtocolError, WireError};

use super::broadcaster::Broadcaster;
use super::middleware::{run_pipeline, HandshakeContext, HandshakeMiddleware, HandshakeSession};
use super::socket::{Socket, SocketHandle, SocketId};

/// Single-use reply channel handed to event handlers. Dropping it without
/// sending is the no-op reply; for events without a correlation id the
/// caller cannot observe a reply either way.
pub struct Reply {
    target: SocketHandle,
    id: Option<u64>,
}

impl Reply {
    pub(crate) fn new(target: SocketHandle, id: Option<u64>) -> Self {
        Self { target, id }
    }

    pub fn ok(self, payload: Option<Value>) {
        self.send(Ok(payload));
    }

    pub fn error(self, error: WireError) {
        self.send(Err(error));
    }

    pub fn send(self, result: Result<Option<Value>, WireError>) {
        if let Some(id) = self.id {
            self.target.send(Envelope::ack(id, result));
        }
    }
}

/// Application-facing connection lifecycle events.
#[async_trait]
pub trait ConnectionHandler: Send + Sync {
    async fn on_connect(&self, _socket: &Arc<Socket>) {}

    async fn on_event(&self, socket: &Arc<Socket>, event: ClientEvent, reply: Reply);

    /// Runs before the socket leaves its rooms, so the handler can still see
    /// the join list.
    async fn on_close(&self, _socket: &Arc<Socket>) {}
}

pub struct SocketServer {
    sockets: DashMap<SocketId, Arc<Socket>>,
    broadcaster: Arc<Broadcaster>,
    middlewares: RwLock<Vec<Arc<dyn HandshakeMiddleware>>>,
    handler: OnceLock<Arc<dyn ConnectionHandler>>,
    max_message_size: usize,
}

impl SocketServer {
    pub fn new(max_message_size: usize) -> Arc<Self> {
        Arc::new(Self {
            sockets: DashMap::new(),
            broadcaster: Arc::new(Broadcaster::new()),
            middlewares: RwLock::new(Vec::new()),
            handler: OnceLock::new(),
            max_message_size,
        })
    }

    /// Appends a middleware to the handshake pipeline.
    pub fn use_middleware(&self, middleware: Arc<dyn HandshakeMiddleware>) {
        self.middlewares
            .write()
            .expect("middleware lock poisoned")
            .push(middleware);
    }

    /// Installs the application handler. Must happen before serving.
    pub fn set_handler(&self, handler: Arc<dyn ConnectionHandler>) {
        if self.handler.set(handler).is_err() {
            tracing::warn!("connection handler installed twice; keeping the first");
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn socket(&self, id: SocketId) -> Option<Arc<Socket>> {
        self.sockets.get(&id).map(|entry| entry.value().clone())
    }

    pub fn connection_count(&self) -> usize {
        self.sockets.len()
    }

    /// Delivers to exactly one socket if still live; sending to a vanished
    /// connection is a silent no-op.
    pub fn emit_to(&self, id: SocketId, event: &str, payload: Value) {
        if let Some(socket) = self.socket(id) {
            socket.emit(event, payload);
        }
    }

    /// Broadcasts to the snapshot of a room's current members.
    pub fn emit_to_room(&self, room: &str, event: &str, payload: Value) {
        for member in self.broadcaster.members(room) {
            member.emit(event, payload.clone());
        }
    }

    pub fn room_members(&self, room: &str) -> Vec<SocketHandle> {
        self.broadcaster.members(room)
    }

    fn handler(&self) -> Option<Arc<dyn ConnectionHandler>> {
        self.handler.get().cloned()
    }

    /// Runs the middleware pipeline and, on success, promotes the raw
    /// connection. A middleware error aborts the handshake; the raw
    /// connection is never promoted.
    pub async fn handle_upgrade(
        self: Arc<Self>,
        ws: WebSocketUpgrade,
        addr: SocketAddr,
        headers: HeaderMap,
    ) -> Response {
        let chain = self
            .middlewares
            .read()
            .expect("middleware lock poisoned")
            .clone();
        let mut ctx = HandshakeContext::new(addr, headers);
        if let Err(err) = run_pipeline(&chain, &mut ctx).await {
            tracing::error!(%addr, %err, "handshake middleware rejected connection");
            return (StatusCode::FORBIDDEN, err.to_string()).into_response();
        }

        let session = ctx.session;
        ws.max_message_size(self.max_message_size)
            .on_upgrade(move |socket| self.run_connection(socket, session))
    }

    async fn run_connection(self: Arc<Self>, ws: WebSocket, session: HandshakeSession) {
        let id = Uuid::new_v4();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let socket = Socket::new(id, Arc::new(session), self.broadcaster.clone(), outbound_tx);
        self.sockets.insert(id, socket.clone());
        tracing::info!(socket_id = %id, uid = ?socket.uid(), "socket connected");

        let Some(handler) = self.handler() else {
            tracing::error!(socket_id = %id, "no connection handler installed");
            self.sockets.remove(&id);
            return;
        };
        handler.on_connect(&socket).await;

        let (mut ws_sender, mut ws_receiver) = ws.split();
        let writer = tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match envelope.encode() {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::error!(socket_id = %id, %err, "failed to encode outbound frame");
                        continue;
                    }
                };
                if ws_sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        });

        while let Some(frame) = ws_receiver.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    self.dispatch(&handler, &socket, text.as_str()).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {} // binary/ping/pong frames are not part of the protocol
                Err(err) => {
                    tracing::warn!(socket_id = %id, %err, "websocket error");
                    break;
                }
            }
        }

        // Teardown: the handler sees the join list first, then the socket
        // leaves every room it is a member of.
        handler.on_close(&socket).await;
        socket.leave_all();
        self.sockets.remove(&id);
        writer.abort();
        let uptime = chrono::Utc::now() - socket.connected_at();
        tracing::info!(socket_id = %id, uptime_secs = uptime.num_seconds(), "socket disconnected");
    }

    /// Protocol dispatch for one inbound frame. Failures surface as a local
    /// error (and an ack error for requests); they never take the server
    /// down.
    async fn dispatch(&self, handler: &Arc<dyn ConnectionHandler>, socket: &Arc<Socket>, raw: &str) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(socket_id = %socket.id(), %err, "malformed inbound frame");
                return;
            }
        };

        match envelope.ch {
            Channel::Event => {
                let Some(name) = envelope.ev else {
                    tracing::warn!(socket_id = %socket.id(), "{}", ProtocolError::MissingEventName);
                    return;
                };
                let payload = envelope.p.unwrap_or(Value::Null);
                let reply = Reply::new(socket.handle().clone(), envelope.id);
                match ClientEvent::parse(&name, payload) {
                    Ok(event) => handler.on_event(socket, event, reply).await,
                    Err(err) => {
                        tracing::warn!(socket_id = %socket.id(), event = %name, %err, "rejected event");
                        reply.error(WireError::new(err.to_string()));
                    }
                }
            }
            Channel::Ack => {
                let Some(id) = envelope.id else {
                    tracing::warn!(socket_id = %socket.id(), "{}", ProtocolError::AckWithoutId);
                    return;
                };
                let result = match envelope.e {
                    Some(error) => Err(error),
                    None => Ok(envelope.p),
                };
                if let Err(err) = socket.resolve_ack(id, result) {
                    // Ack semantics beyond reply correlation are
                    // unsupported and fail loudly.
                    tracing::warn!(socket_id = %socket.id(), %err, "unsupported ack frame");
                }
            }
        }
    }
}

async fn ws_handler(
    State(server): State<Arc<SocketServer>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    server.handle_upgrade(ws, addr, headers).await
}

async fn reject_unknown_path() -> StatusCode {
    // Only the configured upgrade path is claimed; everything else on the
    // port is refused.
    StatusCode::NOT_FOUND
}

/// Router exposing the protocol upgrade at `ws_path` and rejecting every
/// other path.
pub fn create_router(ws_path: &str) -> Router<Arc<SocketServer>> {
    Router::new()
        .route(ws_path, get(ws_handler))
        .fallback(reject_unknown_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    /// Echoes every event back as a successful ack carrying the event name.
    struct EchoHandler;

    #[async_trait]
    impl ConnectionHandler for EchoHandler {
        async fn on_event(&self, _socket: &Arc<Socket>, event: ClientEvent, reply: Reply) {
            reply.ok(Some(json!({ "echoed": event.name() })));
        }
    }

    async fn spawn_server() -> (SocketAddr, Arc<SocketServer>) {
        let server = SocketServer::new(64 * 1024);
        server.set_handler(Arc::new(EchoHandler));
        let router = create_router("/ws").with_state(server.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });
        (addr, server)
    }

    #[tokio::test]
    async fn request_over_websocket_gets_matching_ack() {
        let (addr, _server) = spawn_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        let frame = r#"{"ch":0,"ev":"join","p":{"id":"t1"},"id":5}"#;
        ws.send(WsMessage::Text(frame.into())).await.unwrap();

        let reply = ws.next().await.unwrap().unwrap();
        let value: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(value["ch"], 1);
        assert_eq!(value["id"], 5);
        assert_eq!(value["p"]["echoed"], "join");
    }

    #[tokio::test]
    async fn unknown_event_request_is_acked_with_error() {
        let (addr, _server) = spawn_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        let frame = r#"{"ch":0,"ev":"teleport","p":{},"id":9}"#;
        ws.send(WsMessage::Text(frame.into())).await.unwrap();

        let reply = ws.next().await.unwrap().unwrap();
        let value: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(value["ch"], 1);
        assert_eq!(value["id"], 9);
        assert!(value["e"]["message"]
            .as_str()
            .unwrap()
            .contains("unknown event"));
    }

    #[tokio::test]
    async fn malformed_frame_does_not_kill_the_connection() {
        let (addr, _server) = spawn_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        ws.send(WsMessage::Text("not json".into())).await.unwrap();

        // The connection survives and keeps answering.
        let frame = r#"{"ch":0,"ev":"join","p":{"id":"t1"},"id":1}"#;
        ws.send(WsMessage::Text(frame.into())).await.unwrap();
        let reply = ws.next().await.unwrap().unwrap();
        let value: Value = serde_json::from_str(reply.to_text().unwrap()).unwrap();
        assert_eq!(value["id"], 1);
    }

    #[tokio::test]
    async fn non_upgrade_paths_are_rejected() {
        let (addr, _server) = spawn_server().await;
        let result = connect_async(format!("ws://{addr}/other")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejecting_middleware_aborts_the_upgrade() {
        struct RejectAll;

        #[async_trait]
        impl HandshakeMiddleware for RejectAll {
            async fn handle(
                &self,
                _ctx: &mut HandshakeContext,
            ) -> Result<(), super::super::middleware::MiddlewareError> {
                Err(super::super::middleware::MiddlewareError::Rejected(
                    "closed for maintenance".to_string(),
                ))
            }
        }

        let (addr, server) = spawn_server().await;
        server.use_middleware(Arc::new(RejectAll));

        let result = connect_async(format!("ws://{addr}/ws")).await;
        assert!(result.is_err());
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn close_deregisters_the_socket() {
        let (addr, server) = spawn_server().await;
        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();

        // Wait until the connection is registered.
        for _ in 0..50 {
            if server.connection_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(server.connection_count(), 1);

        ws.close(None).await.unwrap();
        for _ in 0..50 {
            if server.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(server.connection_count(), 0);
    }
}
