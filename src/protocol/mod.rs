//! Wire protocol: envelope framing, typed events, protocol errors.

pub mod envelope;
pub mod events;

pub use envelope::{Channel, Envelope, WireError};
pub use events::{
    ActionTakenParams, ClientEvent, ReserveSeatParams, ServerEvent, SetAutomaticActionParams,
    SitDownParams, TableRef,
};

use thiserror::Error;

/// Errors at the protocol boundary. These are local to the offending
/// connection and never fatal to the server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown channel {0}")]
    UnknownChannel(u8),

    #[error("channel-0 envelope is missing an event name")]
    MissingEventName,

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("invalid params for `{event}`: {source}")]
    InvalidParams {
        event: String,
        source: serde_json::Error,
    },

    #[error("ack for unknown request id {0}")]
    UnmatchedAck(u64),

    #[error("ack envelope is missing a correlation id")]
    AckWithoutId,

    #[error("message of {size} bytes exceeds the {limit} byte limit")]
    MessageTooLarge { size: usize, limit: usize },
}
