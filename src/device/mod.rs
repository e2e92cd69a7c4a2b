//! # Device Model
//!
//! Everything that describes the water-heater module itself, independent of
//! HTTP and MQTT:
//!
//! ```text
//! device/
//! ├── telemetry.rs  - Poll payload → TelemetrySnapshot
//! ├── command.rs    - Command sent back in the poll reply
//! ├── translate.rs  - Device vocabulary ↔ Home Assistant vocabulary
//! └── registry.rs   - Known devices and their command mailboxes
//! ```
//!
//! The module only ever talks to us by polling, so a device exists for the
//! bridge from its first poll on. Commands arriving over MQTT are parked in
//! the device's mailbox and handed out one per poll.

pub mod command;
pub mod registry;
pub mod telemetry;
pub mod translate;

use std::fmt;

pub use command::Command;
pub use registry::{DeviceContext, DeviceRegistry};
pub use telemetry::{PollForm, TelemetrySnapshot, TriFlag};

/// Identifier of one module: uppercase hexadecimal, as it appears in topics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    /// Strict parse used for topic segments: `[A-F0-9]+` only
    pub fn parse(raw: &str) -> Option<Self> {
        let valid = !raw.is_empty()
            && raw
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c));
        valid.then(|| Self(raw.to_string()))
    }

    /// Lenient parse used for poll payloads, lowercase hex is upper-cased
    pub fn normalize(raw: &str) -> Option<Self> {
        Self::parse(&raw.trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_uppercase_hex_only() {
        assert!(DeviceId::parse("ABCDEF0123").is_some());
        assert!(DeviceId::parse("abcdef").is_none());
        assert!(DeviceId::parse("ABCDEG").is_none());
        assert!(DeviceId::parse("").is_none());
    }

    #[test]
    fn normalize_uppercases_poll_ids() {
        assert_eq!(
            DeviceId::normalize(" abc123 ").map(|id| id.to_string()),
            Some("ABC123".to_string())
        );
        assert!(DeviceId::normalize("xyz").is_none());
    }
}
