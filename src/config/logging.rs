//! Logging configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::defaults::{
    default_log_dir, default_log_filename, default_log_format, default_log_rotation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Level filter. When unset, `RUST_LOG` applies, falling back to `info`.
    #[serde(default)]
    pub level: Option<LogLevel>,

    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default)]
    pub enable_file_logging: bool,

    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_filename")]
    pub filename: String,

    /// `daily`, `hourly` or `never`.
    #[serde(default = "default_log_rotation")]
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: default_log_format(),
            enable_file_logging: false,
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: default_log_rotation(),
        }
    }
}
