//! Orchestrator-owned timers: per-room action timeouts and per-identity
//! reconnection grace.
//!
//! Both kinds are armed/disarmed explicitly; a timer left armed past the
//! condition it guards is a correctness bug. Each armed timer carries an
//! epoch so a firing that lost the race against a disarm (the task already
//! woke and is waiting for the state lock) detects it and backs off.

use serde_json::Map;

use crate::protocol::ServerEvent;
use crate::table::Action;

use super::response::seat_index;
use super::{ActionTimer, GameEventHandler, ReconnectTimer, SessionError, SessionState};

impl GameEventHandler {
    /// (Re)arms the room's action timer; an already-armed timer is replaced.
    pub(crate) fn arm_action_timer(&self, state: &mut SessionState, room: &str) {
        self.disarm_action_timer(state, room);

        state.timer_epoch += 1;
        let epoch = state.timer_epoch;
        let weak = self.weak();
        let room_owned = room.to_string();
        let timeout = self.config.action_timeout;

        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(handler) = weak.upgrade() {
                handler.on_action_timeout(&room_owned, epoch).await;
            }
        });
        state
            .action_timers
            .insert(room.to_string(), ActionTimer { epoch, task });
    }

    pub(crate) fn disarm_action_timer(&self, state: &mut SessionState, room: &str) {
        if let Some(timer) = state.action_timers.remove(room) {
            timer.task.abort();
        }
    }

    /// Forced fold on whichever seat holds the turn at fire time, through
    /// the same path as a manual action. Errors are logged, never surfaced
    /// to clients, and never block later timers.
    async fn on_action_timeout(&self, room: &str, epoch: u64) {
        let mut state = self.state.lock().await;
        let armed = matches!(state.action_timers.get(room), Some(t) if t.epoch == epoch);
        if !armed {
            return; // replaced or disarmed while we waited for the lock
        }
        state.action_timers.remove(room);

        tracing::info!(room, "action timeout, folding the player to act");
        let result = (|| -> Result<(), SessionError> {
            let extra = self.take_action(&mut state, room, Action::Fold, None)?;
            self.send_to_all(&state, room, ServerEvent::ActionTaken, &extra);
            self.post_action_events(&mut state, room)
        })();
        if let Err(err) = result {
            tracing::error!(room, %err, "failed to fold timed out player");
        }
    }

    /// Arms (replacing any existing) the grace timer for an identity,
    /// capturing the rooms its last connection had joined.
    pub(crate) fn arm_reconnect_timer(
        &self,
        state: &mut SessionState,
        uid: &str,
        rooms: Vec<String>,
    ) {
        self.disarm_reconnect_timer(state, uid);

        state.timer_epoch += 1;
        let epoch = state.timer_epoch;
        let weak = self.weak();
        let uid_owned = uid.to_string();
        let grace = self.config.reconnect_grace;

        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(handler) = weak.upgrade() {
                handler.on_reconnect_expired(&uid_owned, epoch).await;
            }
        });
        state.reconnect_timers.insert(
            uid.to_string(),
            ReconnectTimer { epoch, rooms, task },
        );
    }

    pub(crate) fn disarm_reconnect_timer(&self, state: &mut SessionState, uid: &str) {
        if let Some(timer) = state.reconnect_timers.remove(uid) {
            timer.task.abort();
        }
    }

    /// Grace expired without a rejoin: force the identity out of every room
    /// it had joined, exactly once. Per-room failures are logged and do not
    /// stop the remaining rooms.
    async fn on_reconnect_expired(&self, uid: &str, epoch: u64) {
        let mut state = self.state.lock().await;
        let armed = matches!(state.reconnect_timers.get(uid), Some(t) if t.epoch == epoch);
        if !armed {
            return; // rejoined or replaced while we waited for the lock
        }
        let Some(timer) = state.reconnect_timers.remove(uid) else {
            return;
        };

        tracing::info!(%uid, "reconnect grace expired, vacating seats");
        for room in timer.rooms {
            if let Err(err) = self.force_stand_up(&mut state, &room, uid) {
                tracing::error!(%uid, room, %err, "failed to vacate seat after grace expiry");
            }
        }
    }

    /// Stands the identity up (if seated), releases its reservation and
    /// broadcasts the resulting state, then runs the post-action cascade,
    /// since standing up mid-hand can close a betting round.
    fn force_stand_up(
        &self,
        state: &mut SessionState,
        room: &str,
        uid: &str,
    ) -> Result<(), SessionError> {
        let Some(index) = seat_index(state.engine.as_ref(), room, Some(uid))? else {
            return Ok(()); // nothing reserved here anymore
        };

        if state.engine.seats(room)?[index].is_some() {
            state.engine.stand_up(room, index)?;
        }
        state.engine.cancel_reservation(room, index)?;

        self.send_to_all(state, room, ServerEvent::StandUp, &Map::new());
        self.post_action_events(state, room)
    }
}
