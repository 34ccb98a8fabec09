//! Default value functions referenced by `#[serde(default = ...)]`
//! attributes throughout the configuration system.

use crate::table::ForcedBets;

use super::logging::LogFormat;
use super::server::TableSpec;

// =============================================================================
// Port & Root Config
// =============================================================================

pub const fn default_port() -> u16 {
    3636
}

// =============================================================================
// Server Defaults
// =============================================================================

pub fn default_ws_path() -> String {
    "/ws".to_string()
}

pub const fn default_action_timeout_secs() -> u64 {
    40
}

pub const fn default_reconnect_grace_secs() -> u64 {
    30
}

pub const fn default_num_seats() -> usize {
    9
}

/// One always-on table so clients have somewhere to land.
pub fn default_tables() -> Vec<TableSpec> {
    vec![TableSpec {
        id: "sandbox".to_string(),
        forced_bets: ForcedBets {
            ante: 0,
            small_blind: 1,
            big_blind: 2,
        },
    }]
}

// =============================================================================
// Security Defaults
// =============================================================================

pub const fn default_max_message_size() -> usize {
    65536 // 64KB
}

pub fn default_session_keys() -> Vec<String> {
    vec!["secret".to_string(), "keys".to_string()]
}

pub fn default_cors_origins() -> String {
    "*".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub const fn default_log_format() -> LogFormat {
    LogFormat::Text
}

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "server.log".to_string()
}

pub fn default_log_rotation() -> String {
    "daily".to_string()
}
