//! Seating lifecycle: joining the room, reserving and releasing seats,
//! sitting down and standing up.

use serde_json::{Map, Value};

use crate::messaging::{Reply, Socket};
use crate::protocol::{ReserveSeatParams, ServerEvent, SitDownParams, TableRef};
use crate::table::{Reservation, TableError};

use super::response::{base_payload, base_response, seat_index};
use super::{GameEventHandler, SessionError, SessionState};

const MIN_BUY_IN: f64 = 1.0;
const MAX_BUY_IN: f64 = 99_999.0;
const MIN_DISPLAY_NAME_LEN: usize = 2;

impl GameEventHandler {
    /// `join`: enter the room and receive the caller's view of the table.
    /// Also cancels any reconnect grace running for the caller's identity.
    pub(crate) fn handle_join(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &TableRef,
        reply: Reply,
    ) {
        if let Some(uid) = socket.uid() {
            self.disarm_reconnect_timer(state, uid);
        }

        match base_response(state.engine.as_ref(), &params.id, socket.uid()) {
            Ok(base) => {
                socket.join(&params.id);
                reply.ok(Some(base_payload(base)));
            }
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "join rejected");
                reply.error(SessionError::from(err).into());
            }
        }
    }

    pub(crate) fn handle_reserve_seat(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &ReserveSeatParams,
        reply: Reply,
    ) {
        let result = (|| -> Result<Value, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            state
                .engine
                .set_reservation(&params.id, params.index, Reservation::for_uid(uid))?;
            let base = base_response(state.engine.as_ref(), &params.id, Some(uid))?;
            Ok(base_payload(base))
        })();

        match result {
            Ok(payload) => {
                reply.ok(Some(payload));
                self.send_to_others(state, socket, &params.id, ServerEvent::ReserveSeat, &Map::new());
            }
            Err(err) => {
                tracing::debug!(room = %params.id, index = params.index, %err, "reserveSeat rejected");
                reply.error(err.into());
            }
        }
    }

    /// `cancelReservation`: release the caller's own reservation. Requires
    /// the caller to have stood up first.
    pub(crate) fn handle_cancel_reservation(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &TableRef,
        reply: Reply,
    ) {
        let result = (|| -> Result<Value, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            let index = seat_index(state.engine.as_ref(), &params.id, Some(uid))?
                .ok_or(SessionError::NotAtTable)?;
            state.engine.cancel_reservation(&params.id, index)?;
            let base = base_response(state.engine.as_ref(), &params.id, Some(uid))?;
            Ok(base_payload(base))
        })();

        match result {
            Ok(payload) => {
                reply.ok(Some(payload));
                self.send_to_others(
                    state,
                    socket,
                    &params.id,
                    ServerEvent::CancelReservation,
                    &Map::new(),
                );
            }
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "cancelReservation rejected");
                reply.error(err.into());
            }
        }
    }

    /// `sitDown`: validated seating. May start a hand once two seats are
    /// occupied.
    pub(crate) fn handle_sit_down(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &SitDownParams,
        reply: Reply,
    ) {
        let result = (|| -> Result<Value, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            let index = seat_index(state.engine.as_ref(), &params.id, Some(uid))?;

            let name = params.name.trim();
            if name.len() < MIN_DISPLAY_NAME_LEN {
                return Err(SessionError::DisplayNameTooShort);
            }
            if params.avatar_style.is_empty() {
                return Err(SessionError::MissingAvatarStyle);
            }
            if !params.buy_in.is_finite() {
                return Err(SessionError::InvalidBuyIn);
            }
            if !(MIN_BUY_IN..=MAX_BUY_IN).contains(&params.buy_in) {
                return Err(SessionError::BuyInOutOfRange);
            }

            let index = index.ok_or(SessionError::Table(TableError::MissingReservation))?;
            state.engine.update_reservation(
                &params.id,
                index,
                Reservation {
                    uid: uid.to_string(),
                    name: Some(name.to_string()),
                    avatar_style: Some(params.avatar_style.clone()),
                },
            )?;
            state.engine.sit_down(&params.id, index, params.buy_in as u64)?;

            let base = base_response(state.engine.as_ref(), &params.id, Some(uid))?;
            Ok(base_payload(base))
        })();

        match result {
            Ok(payload) => {
                reply.ok(Some(payload));
                self.send_to_others(state, socket, &params.id, ServerEvent::SitDown, &Map::new());
                if let Err(err) = self.begin_hand_if_ready(state, &params.id) {
                    tracing::error!(room = %params.id, %err, "failed to start hand after sitDown");
                }
            }
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "sitDown rejected");
                reply.error(err.into());
            }
        }
    }

    /// Starts a hand when at least two seats are occupied and none is
    /// running, arming the action timer for the first decision.
    pub(crate) fn begin_hand_if_ready(
        &self,
        state: &mut SessionState,
        room: &str,
    ) -> Result<(), SessionError> {
        if state.engine.num_seated_players(room)? > 1 && !state.engine.is_hand_in_progress(room)? {
            state.engine.start_hand(room)?;
            self.send_to_all(state, room, ServerEvent::StartHand, &Map::new());
            self.arm_action_timer(state, room);
        }
        Ok(())
    }

    /// `standUp`: vacate the seat and release the reservation. Standing up
    /// mid-hand can close the betting round, so the post-action cascade runs
    /// afterwards.
    pub(crate) fn handle_stand_up(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &TableRef,
        reply: Reply,
    ) {
        let result = (|| -> Result<Value, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            let index = seat_index(state.engine.as_ref(), &params.id, Some(uid))?
                .ok_or(SessionError::NotAtTable)?;
            state.engine.stand_up(&params.id, index)?;
            state.engine.cancel_reservation(&params.id, index)?;
            let base = base_response(state.engine.as_ref(), &params.id, Some(uid))?;
            Ok(base_payload(base))
        })();

        match result {
            Ok(payload) => {
                reply.ok(Some(payload));
                self.send_to_others(state, socket, &params.id, ServerEvent::StandUp, &Map::new());
                if let Err(err) = self.post_action_events(state, &params.id) {
                    tracing::error!(room = %params.id, %err, "cascade after standUp failed");
                }
            }
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "standUp rejected");
                reply.error(err.into());
            }
        }
    }
}
