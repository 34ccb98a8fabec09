#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

//! # Poker Table Server
//!
//! A real-time multiplayer poker table server: a WebSocket session layer
//! with room-based broadcast, request/acknowledgement correlation, and a
//! timer-driven orchestrator enforcing turn order, automatic-action
//! unfolding and reconnection grace periods.
//!
//! In-memory only. Run the binary and connect over WebSocket.

/// Server configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Transport layer: rooms, sockets, middleware, WebSocket server
pub mod messaging;

/// Wire protocol: envelope framing and typed events
pub mod protocol;

/// Game session orchestration: event handlers, cascades, timers
pub mod session;

/// Table engine boundary and the in-memory baseline implementation
pub mod table;
