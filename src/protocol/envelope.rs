//! Wire envelope: the single JSON object framing every message.
//!
//! Every frame on the socket is one serialized [`Envelope`]. Channel 0
//! carries named events (optionally expecting a reply), channel 1 carries
//! acknowledgement replies correlated by `id`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::ProtocolError;

/// Message channel discriminant, serialized as a bare integer (`"ch": 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Fire an event, or request a reply when `id` is present.
    Event,
    /// Acknowledgement reply to a channel-0 request.
    Ack,
}

impl Channel {
    pub const fn as_u8(self) -> u8 {
        match self {
            Channel::Event => 0,
            Channel::Ack => 1,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Channel::Event),
            1 => Ok(Channel::Ack),
            other => Err(ProtocolError::UnknownChannel(other)),
        }
    }
}

impl Serialize for Channel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Channel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Channel::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Structured error carried in the `e` field of an ack reply.
///
/// Serialization keeps the human-readable `message` plus any named fields,
/// so rich errors survive the transport without a fixed schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WireError {
    pub message: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl WireError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E: std::error::Error> From<E> for WireError {
    fn from(err: E) -> Self {
        WireError::new(err.to_string())
    }
}

/// The envelope itself. Field names are the wire contract and must not
/// change: `ch` (channel), `ev` (event name), `p` (payload), `id`
/// (correlation id), `e` (error, ack replies only).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub ch: Channel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub p: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub e: Option<WireError>,
}

impl Envelope {
    /// Fire-and-forget event (channel 0, no correlation id).
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        Self {
            ch: Channel::Event,
            ev: Some(name.into()),
            p: Some(payload),
            id: None,
            e: None,
        }
    }

    /// Event expecting exactly one ack reply under `id`.
    pub fn request(name: impl Into<String>, payload: Value, id: u64) -> Self {
        Self {
            id: Some(id),
            ..Self::event(name, payload)
        }
    }

    /// Ack reply to the request correlated by `id`.
    pub fn ack(id: u64, result: Result<Option<Value>, WireError>) -> Self {
        let (p, e) = match result {
            Ok(payload) => (payload, None),
            Err(err) => (None, Some(err)),
        };
        Self {
            ch: Channel::Ack,
            ev: None,
            p,
            id: Some(id),
            e,
        }
    }

    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(ProtocolError::Malformed)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Malformed)
    }
}
