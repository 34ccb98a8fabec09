//! Configuration: JSON file + environment overrides + compiled defaults.
//!
//! # Module Structure
//!
//! - [`types`]: root `Config` struct
//! - [`server`]: table provisioning, timers, upgrade path
//! - [`security`]: session keys, message limits, CORS
//! - [`logging`]: log level/format/file output
//! - [`loader`]: configuration loading
//! - [`defaults`]: default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod security;
pub mod server;
pub mod types;

pub use loader::load;
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use security::SecurityConfig;
pub use server::{ServerConfig, TableSpec};
pub use types::Config;
