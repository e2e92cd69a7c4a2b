use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Report interval in seconds the module accepts
pub const UPDATE_RATE_RANGE: RangeInclusive<u16> = 30..=300;

/// Set point in °F the module accepts
pub const SET_POINT_RANGE: RangeInclusive<f64> = 80.0..=150.0;

/// Reply to one poll, in the module's own representation.
///
/// Every field is optional; a command with no field set tells the module
/// "nothing to do" and serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Command {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_point: Option<String>,
}

impl Command {
    pub fn update_rate(seconds: u16) -> Self {
        Self {
            update_rate: Some(seconds.to_string()),
            ..Self::default()
        }
    }

    /// `None` produces a command that changes nothing
    pub fn mode(mode: Option<&str>) -> Self {
        Self {
            mode: mode.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn set_point(degrees: i32) -> Self {
        Self {
            set_point: Some(degrees.to_string()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.update_rate.is_none() && self.mode.is_none() && self.set_point.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_serializes_to_empty_object() {
        let body = serde_json::to_string(&Command::default()).unwrap();
        assert_eq!(body, "{}");
        assert!(Command::mode(None).is_empty());
    }

    #[test]
    fn fields_use_module_names() {
        let body = serde_json::to_string(&Command::set_point(130)).unwrap();
        assert_eq!(body, r#"{"SetPoint":"130"}"#);

        let body = serde_json::to_string(&Command::update_rate(60)).unwrap();
        assert_eq!(body, r#"{"UpdateRate":"60"}"#);

        let body = serde_json::to_string(&Command::mode(Some("Hybrid"))).unwrap();
        assert_eq!(body, r#"{"Mode":"Hybrid"}"#);
    }
}
