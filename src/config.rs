//! Server configuration loaded from the environment.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Maximum number of concurrent rooms
    pub max_rooms: usize,
    /// Whether the anti-teleport speed check is enforced
    pub speed_check: bool,
    /// Directory holding the persisted world state file
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            max_rooms: 100,
            speed_check: true,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults.
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if let Ok(parsed) = port.parse::<u16>() {
                if parsed > 0 {
                    config.port = parsed;
                } else {
                    tracing::warn!("PORT must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid PORT '{}', using default", port);
            }
        }

        if let Ok(max_rooms) = std::env::var("MAX_ROOMS") {
            if let Ok(parsed) = max_rooms.parse::<usize>() {
                if parsed > 0 && parsed <= 10000 {
                    config.max_rooms = parsed;
                } else {
                    tracing::warn!("MAX_ROOMS must be 1-10000, using default");
                }
            } else {
                tracing::warn!("Invalid MAX_ROOMS '{}', using default", max_rooms);
            }
        }

        if let Ok(speed_check) = std::env::var("SPEED_CHECK") {
            if let Ok(parsed) = speed_check.parse::<bool>() {
                config.speed_check = parsed;
            } else {
                tracing::warn!("Invalid SPEED_CHECK '{}', using default", speed_check);
            }
        }

        if let Ok(data_dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        config
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.max_rooms == 0 {
            return Err("max_rooms must be at least 1".to_string());
        }
        Ok(())
    }
}
