//! Per-recipient response building.
//!
//! Hole cards differ per seat, so a room broadcast never serializes one
//! payload for everyone: the base response is computed once per member and
//! merged with any event-specific extras.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::messaging::{Socket, SocketHandle};
use crate::protocol::ServerEvent;
use crate::table::{AutomaticActionsInfo, Card, TableEngine, TableError, TableSnapshot};

use super::{GameEventHandler, SessionState};

/// What every reply and broadcast payload is built from: the recipient's
/// resolved seat, the serialized table, and the recipient's private fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseResponse {
    pub seat_index: i64,
    pub table: TableSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_actions: Option<AutomaticActionsInfo>,
    pub hole_cards: Vec<Card>,
}

/// Resolves a connection's seat by scanning the room's reservations for its
/// authenticated identity. No identity or no matching reservation both mean
/// "no seat".
pub(crate) fn seat_index(
    engine: &dyn TableEngine,
    room: &str,
    uid: Option<&str>,
) -> Result<Option<usize>, TableError> {
    let Some(uid) = uid else {
        return Ok(None);
    };
    Ok(engine
        .reservations(room)?
        .iter()
        .position(|reservation| reservation.as_ref().is_some_and(|r| r.uid == uid)))
}

pub(crate) fn base_response(
    engine: &dyn TableEngine,
    room: &str,
    uid: Option<&str>,
) -> Result<BaseResponse, TableError> {
    let seat = seat_index(engine, room, uid)?;
    Ok(BaseResponse {
        seat_index: seat.map_or(-1, |index| index as i64),
        table: engine.snapshot(room)?,
        automatic_actions: seat
            .map(|index| engine.automatic_actions_info(room, index))
            .transpose()?,
        hole_cards: seat
            .map(|index| engine.hole_cards(room, index))
            .transpose()?
            .unwrap_or_default(),
    })
}

/// `BaseResponse` holds only JSON-representable fields, so serializing it
/// cannot fail at runtime.
pub(crate) fn base_payload(base: BaseResponse) -> Value {
    serde_json::to_value(base).unwrap_or(Value::Null)
}

/// Serializes a base response merged with event-specific extras.
pub(crate) fn merged_payload(base: BaseResponse, extra: &Map<String, Value>) -> Value {
    let mut payload = match base_payload(base) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in extra {
        payload.insert(key.clone(), value.clone());
    }
    Value::Object(payload)
}

impl GameEventHandler {
    fn send_to_members(
        &self,
        engine: &dyn TableEngine,
        members: &[SocketHandle],
        room: &str,
        event: ServerEvent,
        extra: &Map<String, Value>,
    ) {
        for member in members {
            let base = match base_response(engine, room, member.uid()) {
                Ok(base) => base,
                Err(err) => {
                    tracing::warn!(room, socket_id = %member.id(), %err, "skipping broadcast recipient");
                    continue;
                }
            };
            member.emit(event.name(), merged_payload(base, extra));
        }
    }

    /// Broadcast to every member of the room, base response per recipient.
    pub(crate) fn send_to_all(
        &self,
        state: &SessionState,
        room: &str,
        event: ServerEvent,
        extra: &Map<String, Value>,
    ) {
        let members = self.broadcaster.members(room);
        self.send_to_members(state.engine.as_ref(), &members, room, event, extra);
    }

    /// Broadcast to the room excluding the sender.
    pub(crate) fn send_to_others(
        &self,
        state: &SessionState,
        socket: &Socket,
        room: &str,
        event: ServerEvent,
        extra: &Map<String, Value>,
    ) {
        let members = socket.others_in(room);
        self.send_to_members(state.engine.as_ref(), &members, room, event, extra);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{ForcedBets, InMemoryTables, Reservation};

    fn engine() -> InMemoryTables {
        let mut engine = InMemoryTables::new();
        engine.create_table("t1", ForcedBets::default(), 9).unwrap();
        engine
    }

    #[test]
    fn seat_resolution_scans_reservations_by_uid() {
        let mut engine = engine();
        engine
            .set_reservation("t1", 4, Reservation::for_uid("bob"))
            .unwrap();

        assert_eq!(seat_index(&engine, "t1", Some("bob")).unwrap(), Some(4));
        assert_eq!(seat_index(&engine, "t1", Some("eve")).unwrap(), None);
        assert_eq!(seat_index(&engine, "t1", None).unwrap(), None);
    }

    #[test]
    fn base_response_for_unseated_viewer_has_no_private_fields() {
        let engine = engine();
        let base = base_response(&engine, "t1", None).unwrap();

        assert_eq!(base.seat_index, -1);
        assert!(base.automatic_actions.is_none());
        assert!(base.hole_cards.is_empty());

        let value = serde_json::to_value(base).unwrap();
        assert_eq!(value["seatIndex"], -1);
        assert!(value.get("automaticActions").is_none());
    }

    #[test]
    fn merged_payload_overlays_extras_on_base_fields() {
        let engine = engine();
        let base = base_response(&engine, "t1", None).unwrap();
        let mut extra = Map::new();
        extra.insert("actor".to_string(), serde_json::json!(3));

        let payload = merged_payload(base, &extra);
        assert_eq!(payload["actor"], 3);
        assert_eq!(payload["seatIndex"], -1);
        assert!(payload["table"].is_object());
    }

    #[test]
    fn base_response_for_missing_table_is_an_error() {
        let engine = engine();
        assert!(base_response(&engine, "nope", None).is_err());
    }
}
