//! Configuration module for the Dicee Arena server.
//!
//! Configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`server`]: Room lifecycle and connection policy, lobby quotas
//! - [`game`]: Game timing knobs (countdown, AFK, grace)
//! - [`protocol`]: Wire limits (room codes, names, chat, frame size)
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

// Submodules
pub mod defaults;
pub mod game;
pub mod loader;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod types;
pub mod validation;

// Re-exports for convenience
pub use game::GameTimingConfig;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use protocol::ProtocolConfig;

pub use server::{LobbyConfig, ServerConfig};

pub use types::Config;

pub use validation::validate_config;
