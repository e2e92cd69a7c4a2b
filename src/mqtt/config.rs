use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Broker connection and topic namespace settings
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    /// Credentials are only sent when a username is configured
    pub username: Option<String>,
    pub password: Option<String>,
    /// Root of every state, command and status topic
    pub prefix: String,
    /// Home Assistant discovery root
    pub discovery_prefix: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
    /// Capacity of the rumqttc request channel. One poll publishes ~50 messages
    /// when discovery is due, so keep this well above that.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "energysmart-bridge".to_string(),
            username: None,
            password: None,
            prefix: "energysmart".to_string(),
            discovery_prefix: "homeassistant".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 5,
            channel_capacity: 256,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Username/password pair, if a non-empty username is set
    pub fn credentials(&self) -> Option<(String, String)> {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => Some((
                user.to_string(),
                self.password.clone().unwrap_or_default(),
            )),
            _ => None,
        }
    }
}
