//! Root configuration types.

use super::defaults::default_port;
use super::game::GameTimingConfig;
use super::logging::LoggingConfig;
use super::protocol::ProtocolConfig;
use super::server::{LobbyConfig, ServerConfig};
use serde::{Deserialize, Serialize};

/// Root configuration struct for the Dicee Arena server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub game: GameTimingConfig,
    #[serde(default)]
    pub lobby: LobbyConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            server: ServerConfig::default(),
            game: GameTimingConfig::default(),
            lobby: LobbyConfig::default(),
            protocol: ProtocolConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
