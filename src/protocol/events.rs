//! Typed application events carried in channel-0 envelopes.
//!
//! Inbound `(ev, p)` pairs are parsed into [`ClientEvent`] with an explicit
//! match; payload shapes are tagged structs, never open maps. Outbound event
//! names live in [`ServerEvent`] so broadcast call sites cannot typo them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::table::{Action, AutomaticAction};

use super::ProtocolError;

/// Parameters referring to a table room by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReserveSeatParams {
    pub id: String,
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SitDownParams {
    pub id: String,
    pub name: String,
    pub buy_in: f64,
    pub avatar_style: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionTakenParams {
    pub id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bet_size: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetAutomaticActionParams {
    pub id: String,
    #[serde(default)]
    pub action: Option<AutomaticAction>,
}

/// Every client-to-server event the session layer understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join(TableRef),
    ReserveSeat(ReserveSeatParams),
    CancelReservation(TableRef),
    SitDown(SitDownParams),
    StandUp(TableRef),
    ActionTaken(ActionTakenParams),
    SetAutomaticAction(SetAutomaticActionParams),
}

impl ClientEvent {
    /// Parse a channel-0 `(ev, p)` pair into a typed event.
    ///
    /// Unknown names and payloads that do not match the event's shape are
    /// both protocol errors; the caller decides whether they surface as an
    /// ack error (request) or a logged local error (fire-and-forget).
    pub fn parse(name: &str, payload: Value) -> Result<Self, ProtocolError> {
        fn params<T: serde::de::DeserializeOwned>(
            name: &str,
            payload: Value,
        ) -> Result<T, ProtocolError> {
            serde_json::from_value(payload).map_err(|source| ProtocolError::InvalidParams {
                event: name.to_string(),
                source,
            })
        }

        match name {
            "join" => Ok(Self::Join(params(name, payload)?)),
            "reserveSeat" => Ok(Self::ReserveSeat(params(name, payload)?)),
            "cancelReservation" => Ok(Self::CancelReservation(params(name, payload)?)),
            "sitDown" => Ok(Self::SitDown(params(name, payload)?)),
            "standUp" => Ok(Self::StandUp(params(name, payload)?)),
            "actionTaken" => Ok(Self::ActionTaken(params(name, payload)?)),
            "setAutomaticAction" => Ok(Self::SetAutomaticAction(params(name, payload)?)),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => "join",
            Self::ReserveSeat(_) => "reserveSeat",
            Self::CancelReservation(_) => "cancelReservation",
            Self::SitDown(_) => "sitDown",
            Self::StandUp(_) => "standUp",
            Self::ActionTaken(_) => "actionTaken",
            Self::SetAutomaticAction(_) => "setAutomaticAction",
        }
    }

    /// The table room the event addresses.
    pub fn table_id(&self) -> &str {
        match self {
            Self::Join(p) | Self::CancelReservation(p) | Self::StandUp(p) => &p.id,
            Self::ReserveSeat(p) => &p.id,
            Self::SitDown(p) => &p.id,
            Self::ActionTaken(p) => &p.id,
            Self::SetAutomaticAction(p) => &p.id,
        }
    }
}

/// Server-to-client event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    ReserveSeat,
    CancelReservation,
    SitDown,
    StandUp,
    StartHand,
    ActionTaken,
    BettingRoundEnd,
    Showdown,
}

impl ServerEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReserveSeat => "reserveSeat",
            Self::CancelReservation => "cancelReservation",
            Self::SitDown => "sitDown",
            Self::StandUp => "standUp",
            Self::StartHand => "startHand",
            Self::ActionTaken => "actionTaken",
            Self::BettingRoundEnd => "bettingRoundEnd",
            Self::Showdown => "showdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join() {
        let event = ClientEvent::parse("join", json!({"id": "t1"})).unwrap();
        assert_eq!(event, ClientEvent::Join(TableRef { id: "t1".into() }));
        assert_eq!(event.name(), "join");
        assert_eq!(event.table_id(), "t1");
    }

    #[test]
    fn parses_sit_down_with_camel_case_fields() {
        let event = ClientEvent::parse(
            "sitDown",
            json!({"id": "t1", "name": "Ada", "buyIn": 500.0, "avatarStyle": "robot"}),
        )
        .unwrap();

        match event {
            ClientEvent::SitDown(p) => {
                assert_eq!(p.name, "Ada");
                assert_eq!(p.buy_in, 500.0);
                assert_eq!(p.avatar_style, "robot");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_action_taken_without_bet_size() {
        let event =
            ClientEvent::parse("actionTaken", json!({"id": "t1", "action": "check"})).unwrap();
        match event {
            ClientEvent::ActionTaken(p) => {
                assert_eq!(p.action, Action::Check);
                assert_eq!(p.bet_size, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_event_name() {
        let err = ClientEvent::parse("teleport", json!({})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownEvent(name) if name == "teleport"));
    }

    #[test]
    fn rejects_mistyped_params() {
        // buyIn must be a number, not a string
        let err = ClientEvent::parse(
            "sitDown",
            json!({"id": "t1", "name": "Ada", "buyIn": "lots", "avatarStyle": "robot"}),
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParams { event, .. } if event == "sitDown"));
    }

    #[test]
    fn server_event_names_match_wire_contract() {
        assert_eq!(ServerEvent::StartHand.name(), "startHand");
        assert_eq!(ServerEvent::BettingRoundEnd.name(), "bettingRoundEnd");
        assert_eq!(ServerEvent::ReserveSeat.name(), "reserveSeat");
    }
}
