//! Security-related configuration: session cookie keys, limits, CORS.

use serde::{Deserialize, Serialize};

use super::defaults::{default_cors_origins, default_max_message_size, default_session_keys};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfig {
    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Keys accepted when verifying the `session.sig` cookie. The first key
    /// signs; later keys keep older cookies valid during rotation. Replace
    /// the defaults in any real deployment.
    #[serde(default = "default_session_keys")]
    pub session_keys: Vec<String>,

    /// Comma-separated allowed origins, or `*`.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            session_keys: default_session_keys(),
            cors_origins: default_cors_origins(),
        }
    }
}
