//! Relay configuration

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the control-channel server binds to
    pub listen_addr: String,
    /// Room size: 2 (direct forwarding) or 3 (switcher-arbitrated)
    pub room_capacity: usize,
    /// Pending packets per media switcher queue
    pub switcher_queue_capacity: usize,
    /// Pending outbound control messages per connection
    pub outbound_message_buffer: usize,
    /// STUN servers handed to the transport for candidate gathering
    pub stun_servers: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:9091".to_string(),
            room_capacity: 2,
            switcher_queue_capacity: 100,
            outbound_message_buffer: 64,
            stun_servers: vec!["stun:stun.l.google.com:19302".to_string()],
        }
    }
}

impl RelayConfig {
    /// Load configuration: defaults, overridden by an optional file,
    /// overridden by `SWITCHBOARD_*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, Error> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder
            .add_source(config::Environment::with_prefix("SWITCHBOARD").separator("__"))
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Fail fast on values the relay cannot run with.
    pub fn validate(&self) -> Result<(), Error> {
        if !(2..=3).contains(&self.room_capacity) {
            return Err(Error::Config(format!(
                "room_capacity must be 2 or 3, got {}",
                self.room_capacity
            )));
        }
        if self.switcher_queue_capacity == 0 {
            return Err(Error::Config(
                "switcher_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.outbound_message_buffer == 0 {
            return Err(Error::Config(
                "outbound_message_buffer must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
