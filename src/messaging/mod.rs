//! Transport layer: room registry, sockets, handshake middleware and the
//! WebSocket server itself.

pub mod broadcaster;
pub mod middleware;
pub mod server;
pub mod socket;

pub use broadcaster::{Broadcaster, RoomError};
pub use middleware::{
    HandshakeContext, HandshakeMiddleware, HandshakeSession, MiddlewareError, SessionParser,
    SessionUser,
};
pub use server::{create_router, ConnectionHandler, Reply, SocketServer};
pub use socket::{Socket, SocketHandle, SocketId};
