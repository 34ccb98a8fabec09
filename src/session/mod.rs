//! Game session handling: consumes socket events, drives the table engine,
//! and pushes derived state back out through room broadcasts.
//!
//! All engine and timer state lives behind one async mutex, locked for the
//! duration of each handler, so every mutation a handler performs is atomic
//! with respect to other handlers and timer callbacks. Handlers never
//! suspend while holding the lock: outbound sends go through unbounded
//! queues.

mod betting;
mod response;
mod seating;
mod timers;

pub use response::BaseResponse;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::messaging::{Broadcaster, ConnectionHandler, Reply, Socket};
use crate::protocol::ClientEvent;
use crate::table::{TableEngine, TableError};

/// Errors a handler reports back to the requesting caller. Messages are the
/// client-facing wire text.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Missing user")]
    MissingUser,

    #[error("Player not found at table")]
    NotAtTable,

    #[error("Action out of turn")]
    OutOfTurn,

    #[error("Too short display name")]
    DisplayNameTooShort,

    #[error("Missing avatar style")]
    MissingAvatarStyle,

    #[error("Invalid buy-in")]
    InvalidBuyIn,

    #[error("Buy-in out of range")]
    BuyInOutOfRange,

    #[error(transparent)]
    Table(#[from] TableError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long the player to act may stall before a fold is forced.
    pub action_timeout: Duration,
    /// Grace period after a disconnect before seats are forcibly vacated.
    pub reconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            action_timeout: Duration::from_secs(40),
            reconnect_grace: Duration::from_secs(30),
        }
    }
}

pub(crate) struct ActionTimer {
    epoch: u64,
    task: JoinHandle<()>,
}

pub(crate) struct ReconnectTimer {
    epoch: u64,
    rooms: Vec<String>,
    task: JoinHandle<()>,
}

/// Everything the handlers mutate, guarded by one lock.
pub(crate) struct SessionState {
    pub(crate) engine: Box<dyn TableEngine>,
    pub(crate) action_timers: HashMap<String, ActionTimer>,
    pub(crate) reconnect_timers: HashMap<String, ReconnectTimer>,
    pub(crate) timer_epoch: u64,
}

/// The session orchestrator: one per process, shared across connections.
pub struct GameEventHandler {
    config: SessionConfig,
    broadcaster: Arc<Broadcaster>,
    state: Mutex<SessionState>,
    self_ref: Weak<Self>,
}

impl GameEventHandler {
    pub fn new(
        config: SessionConfig,
        broadcaster: Arc<Broadcaster>,
        engine: Box<dyn TableEngine>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            config,
            broadcaster,
            state: Mutex::new(SessionState {
                engine,
                action_timers: HashMap::new(),
                reconnect_timers: HashMap::new(),
                timer_epoch: 0,
            }),
            self_ref: self_ref.clone(),
        })
    }

    pub(crate) fn weak(&self) -> Weak<Self> {
        self.self_ref.clone()
    }
}

#[async_trait]
impl ConnectionHandler for GameEventHandler {
    async fn on_connect(&self, socket: &Arc<Socket>) {
        tracing::debug!(socket_id = %socket.id(), uid = ?socket.uid(), "session connected");
    }

    async fn on_event(&self, socket: &Arc<Socket>, event: ClientEvent, reply: Reply) {
        tracing::debug!(socket_id = %socket.id(), event = event.name(), "handling event");
        let mut state = self.state.lock().await;
        match event {
            ClientEvent::Join(params) => self.handle_join(&mut state, socket, &params, reply),
            ClientEvent::ReserveSeat(params) => {
                self.handle_reserve_seat(&mut state, socket, &params, reply);
            }
            ClientEvent::CancelReservation(params) => {
                self.handle_cancel_reservation(&mut state, socket, &params, reply);
            }
            ClientEvent::SitDown(params) => self.handle_sit_down(&mut state, socket, &params, reply),
            ClientEvent::StandUp(params) => self.handle_stand_up(&mut state, socket, &params, reply),
            ClientEvent::ActionTaken(params) => {
                self.handle_action_taken(&mut state, socket, &params, reply);
            }
            ClientEvent::SetAutomaticAction(params) => {
                self.handle_set_automatic_action(&mut state, socket, &params, reply);
            }
        }
    }

    /// Arms the reconnection grace timer. Runs before the socket leaves its
    /// rooms, so the join list is still visible here.
    async fn on_close(&self, socket: &Arc<Socket>) {
        let Some(uid) = socket.uid().map(str::to_string) else {
            return;
        };
        // Only rooms where this was the identity's last live connection need
        // a grace timer.
        let rooms: Vec<String> = socket
            .rooms()
            .into_iter()
            .filter(|room| {
                !self
                    .broadcaster
                    .members(room)
                    .iter()
                    .any(|member| member.id() != socket.id() && member.uid() == Some(uid.as_str()))
            })
            .collect();
        if rooms.is_empty() {
            return;
        }

        tracing::info!(%uid, ?rooms, "connection closed, starting reconnect grace");
        let mut state = self.state.lock().await;
        self.arm_reconnect_timer(&mut state, &uid, rooms);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::table::{ForcedBets, InMemoryTables};

    pub(crate) fn handler_with_table(config: SessionConfig) -> (Arc<GameEventHandler>, Arc<Broadcaster>) {
        let broadcaster = Arc::new(Broadcaster::new());
        let mut engine = InMemoryTables::new();
        engine
            .create_table("t1", ForcedBets::default(), 9)
            .expect("fresh engine");
        let handler = GameEventHandler::new(config, broadcaster.clone(), Box::new(engine));
        (handler, broadcaster)
    }
}
