//! Server behavior configuration: upgrade path, timers, provisioned tables.

use serde::{Deserialize, Serialize};

use crate::table::ForcedBets;

use super::defaults::{
    default_action_timeout_secs, default_num_seats, default_reconnect_grace_secs, default_tables,
    default_ws_path,
};

/// A table created at boot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSpec {
    pub id: String,
    #[serde(default)]
    pub forced_bets: ForcedBets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// The only URL path that accepts the protocol upgrade.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Seconds the player to act may stall before a fold is forced.
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,

    /// Seconds a disconnected identity keeps its seats before they are
    /// forcibly vacated.
    #[serde(default = "default_reconnect_grace_secs")]
    pub reconnect_grace_secs: u64,

    /// Seats per table.
    #[serde(default = "default_num_seats")]
    pub num_seats: usize,

    /// Tables provisioned at startup.
    #[serde(default = "default_tables")]
    pub tables: Vec<TableSpec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_path: default_ws_path(),
            action_timeout_secs: default_action_timeout_secs(),
            reconnect_grace_secs: default_reconnect_grace_secs(),
            num_seats: default_num_seats(),
            tables: default_tables(),
        }
    }
}
