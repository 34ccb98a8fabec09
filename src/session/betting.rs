//! Turn-gated action handling, automatic-action unfolding and the
//! post-action cascade (round end, showdown, next hand).

use serde_json::{Map, Value};

use crate::messaging::{Reply, Socket};
use crate::protocol::{ActionTakenParams, ServerEvent, SetAutomaticActionParams};
use crate::table::{Action, AutomaticAction};

use super::response::seat_index;
use super::{GameEventHandler, SessionError, SessionState};

/// Computes the outgoing view of which presets will execute downstream of
/// the action about to be taken.
///
/// Scans circularly from the seat after the current actor, visiting only
/// seats eligible to hold automatic actions, for one full circuit. Once an
/// eligible seat with an empty slot is encountered, every later preset is
/// invalidated: the empty seat's real decision may change the betting
/// context those presets assumed.
pub(crate) fn unfolding_automatic_actions(
    presets: &[Option<AutomaticAction>],
    player_to_act: usize,
    eligible: impl Fn(usize) -> bool,
) -> Vec<Option<AutomaticAction>> {
    let mut view = presets.to_vec();
    let len = view.len();
    let mut nullify = false;
    let mut index = player_to_act;
    loop {
        index = (index + 1) % len;
        if index == player_to_act {
            break;
        }
        if !eligible(index) {
            continue;
        }
        if nullify {
            view[index] = None;
            continue;
        }
        if view[index].is_none() {
            nullify = true;
        }
    }
    view
}

impl GameEventHandler {
    /// `actionTaken`: rejected unless the sender resolves to a seat holding
    /// the turn; a rejection performs no mutation and no broadcast.
    pub(crate) fn handle_action_taken(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &ActionTakenParams,
        reply: Reply,
    ) {
        let result = (|| -> Result<Map<String, Value>, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            let seat = seat_index(state.engine.as_ref(), &params.id, Some(uid))?
                .ok_or(SessionError::NotAtTable)?;
            if state.engine.player_to_act(&params.id)? != seat {
                return Err(SessionError::OutOfTurn);
            }
            self.take_action(state, &params.id, params.action, params.bet_size)
        })();

        match result {
            Ok(extra) => {
                reply.ok(None);
                self.send_to_all(state, &params.id, ServerEvent::ActionTaken, &extra);
                if let Err(err) = self.post_action_events(state, &params.id) {
                    tracing::error!(room = %params.id, %err, "post-action cascade failed");
                }
            }
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "actionTaken rejected");
                reply.error(err.into());
            }
        }
    }

    /// Applies the action through the engine and computes the broadcast
    /// extras: the actor, the action, and the mapped unfolding array.
    pub(crate) fn take_action(
        &self,
        state: &mut SessionState,
        room: &str,
        action: Action,
        bet_size: Option<u64>,
    ) -> Result<Map<String, Value>, SessionError> {
        let engine = &mut state.engine;
        let prev_seats = engine.seats(room)?;
        let presets = engine.automatic_actions(room)?;
        let actor = engine.player_to_act(room)?;
        let mut unfolding = {
            let engine = engine.as_ref();
            unfolding_automatic_actions(&presets, actor, |index| {
                engine.can_set_automatic_actions(room, index).unwrap_or(false)
            })
        };

        engine.action_taken(room, action, bet_size)?;

        // If the next player to act still holds a slot in the predicted
        // view, the presets were amended mid-run; drop the whole prediction
        // rather than broadcasting stale state.
        if engine.is_betting_round_in_progress(room)? {
            let next = engine.player_to_act(room)?;
            if unfolding.get(next).copied().flatten().is_some() {
                unfolding.iter_mut().for_each(|slot| *slot = None);
            }
        }

        let hand_players = engine.hand_players(room)?;
        let seats = engine.seats(room)?;
        let mapped: Vec<Option<AutomaticAction>> = unfolding
            .iter()
            .enumerate()
            .map(|(index, slot)| match slot {
                // check/fold resolves by whether the seat is still in the
                // hand at this point.
                Some(AutomaticAction::CheckFold) => Some(if hand_players[index].is_some() {
                    AutomaticAction::Check
                } else {
                    AutomaticAction::Fold
                }),
                // call-any resolves to call only if the seat's committed bet
                // grew; otherwise the round reached it via checks. Known
                // approximation: several presets firing between the
                // snapshots can misattribute this.
                Some(AutomaticAction::CallAny) => {
                    let before = prev_seats[index].map_or(0, |s| s.bet_size);
                    let after = seats[index].map_or(0, |s| s.bet_size);
                    Some(if before < after {
                        AutomaticAction::Call
                    } else {
                        AutomaticAction::Check
                    })
                }
                other => *other,
            })
            .collect();

        let mut extra = Map::new();
        extra.insert("actor".to_string(), Value::from(actor));
        extra.insert(
            "action".to_string(),
            serde_json::to_value(action).unwrap_or(Value::Null),
        );
        extra.insert(
            "unfoldingAutomaticActions".to_string(),
            serde_json::to_value(mapped).unwrap_or(Value::Null),
        );
        Ok(extra)
    }

    /// After an accepted action: close the betting round if it just ended,
    /// run showdown once all rounds complete, deal the next hand while at
    /// least two seats remain, and keep the action timer in step.
    pub(crate) fn post_action_events(
        &self,
        state: &mut SessionState,
        room: &str,
    ) -> Result<(), SessionError> {
        if state.engine.is_hand_in_progress(room)?
            && !state.engine.is_betting_round_in_progress(room)?
        {
            state.engine.end_betting_round(room)?;
            self.send_to_all(state, room, ServerEvent::BettingRoundEnd, &Map::new());

            if state.engine.are_betting_rounds_completed(room)? {
                state.engine.showdown(room)?;
                self.send_to_all(state, room, ServerEvent::Showdown, &Map::new());
                self.disarm_action_timer(state, room);

                if state.engine.num_seated_players(room)? > 1 {
                    state.engine.start_hand(room)?;
                    self.send_to_all(state, room, ServerEvent::StartHand, &Map::new());
                    self.arm_action_timer(state, room);
                }
            } else {
                self.arm_action_timer(state, room);
            }
        } else if state.engine.is_hand_in_progress(room)? {
            self.arm_action_timer(state, room);
        }
        Ok(())
    }

    /// `setAutomaticAction`: store the caller's preset; replies with the
    /// refreshed automatic-action info only.
    pub(crate) fn handle_set_automatic_action(
        &self,
        state: &mut SessionState,
        socket: &Socket,
        params: &SetAutomaticActionParams,
        reply: Reply,
    ) {
        let result = (|| -> Result<Value, SessionError> {
            let uid = socket.uid().ok_or(SessionError::MissingUser)?;
            let index = seat_index(state.engine.as_ref(), &params.id, Some(uid))?
                .ok_or(SessionError::NotAtTable)?;
            state
                .engine
                .set_automatic_action(&params.id, index, params.action)?;
            let info = state.engine.automatic_actions_info(&params.id, index)?;
            Ok(serde_json::json!({ "automaticActions": info }))
        })();

        match result {
            Ok(payload) => reply.ok(Some(payload)),
            Err(err) => {
                tracing::debug!(room = %params.id, %err, "setAutomaticAction rejected");
                reply.error(err.into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_eligible(_: usize) -> bool {
        true
    }

    #[test]
    fn unfolding_keeps_presets_until_an_empty_slot_is_seen() {
        let presets = vec![
            None,
            Some(AutomaticAction::CallAny),
            Some(AutomaticAction::CheckFold),
            None,
        ];

        // Actor at seat 0: the scan (1, 2, 3) hits the empty slot last, so
        // both presets survive.
        let view = unfolding_automatic_actions(&presets, 0, all_eligible);
        assert_eq!(view, presets);
    }

    #[test]
    fn unfolding_nullifies_everything_after_the_first_empty_slot() {
        let presets = vec![
            None,
            Some(AutomaticAction::CallAny),
            Some(AutomaticAction::CheckFold),
            None,
        ];

        // Actor at seat 3: the scan (0, 1, 2) hits seat 0's empty slot
        // first, so every later preset is invalidated regardless of value.
        let view = unfolding_automatic_actions(&presets, 3, all_eligible);
        assert_eq!(view, vec![None, None, None, None]);
    }

    #[test]
    fn unfolding_skips_ineligible_seats() {
        let presets = vec![
            None,
            None,
            Some(AutomaticAction::Check),
            Some(AutomaticAction::CallAny),
        ];

        // Seat 1 is ineligible (folded), so its empty slot does not trip the
        // nullify flag and both presets survive.
        let view = unfolding_automatic_actions(&presets, 0, |index| index != 1);
        assert_eq!(view, presets);
    }

    #[test]
    fn unfolding_never_touches_the_actor_slot() {
        let presets = vec![Some(AutomaticAction::Fold), None, None, None];

        let view = unfolding_automatic_actions(&presets, 0, all_eligible);
        assert_eq!(view[0], Some(AutomaticAction::Fold));
    }
}
