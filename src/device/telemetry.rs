//! Poll payload parsing
//!
//! The module POSTs its whole state as a URL-encoded form on every check-in.
//! [`PollForm`] is the raw form as received, [`TelemetrySnapshot`] the typed
//! view the rest of the bridge works with.

use super::DeviceId;
use crate::error::{BridgeError, Result};
use serde::Deserialize;

/// Fault flag as reported by the module: missing, `None`, or a fault text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TriFlag {
    #[default]
    Absent,
    Clear,
    Set(String),
}

impl TriFlag {
    fn from_field(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None => TriFlag::Absent,
            Some(v) if v.is_empty() || v.eq_ignore_ascii_case("none") => TriFlag::Clear,
            Some(v) => TriFlag::Set(v.to_string()),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, TriFlag::Set(_))
    }
}

/// Raw poll form. Fields the bridge does not use are accepted and dropped.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PollForm {
    pub device_text: Option<String>,
    pub master_model_name: Option<String>,
    pub mod_fw_ver: Option<String>,

    pub set_point: Option<String>,
    pub max_set_point: Option<String>,
    pub upper_temp: Option<String>,
    pub lower_temp: Option<String>,
    pub update_rate: Option<String>,
    pub hot_water_vol: Option<String>,
    pub signal_strength: Option<String>,
    pub fault_codes: Option<String>,

    pub mode: Option<String>,
    pub grid: Option<String>,
    pub air_filter_status: Option<String>,
    pub leak_detect: Option<String>,

    pub system_in_heating: Option<String>,
    pub eco_error: Option<String>,
    pub condense_pump_fail: Option<String>,

    pub dry_fire: Option<String>,
    pub element_fail: Option<String>,
    pub tank_sensor_fail: Option<String>,
    pub leak: Option<String>,
    pub master_disp_fail: Option<String>,
    pub comp_sensor_fail: Option<String>,
    pub sys_sensor_fail: Option<String>,
    pub system_fail: Option<String>,
}

/// Full device state from a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub id: DeviceId,
    pub model_name: Option<String>,
    pub firmware: Option<String>,

    pub set_point: Option<i32>,
    pub max_set_point: Option<i32>,
    pub upper_temp: Option<i32>,
    pub lower_temp: Option<i32>,
    pub update_rate: Option<i32>,
    pub hot_water_vol: Option<String>,
    pub signal_strength: Option<String>,
    pub fault_codes: Option<String>,

    pub mode: Option<String>,
    pub grid: Option<String>,
    pub air_filter_status: Option<String>,
    pub leak_detect: Option<String>,

    pub system_in_heating: bool,
    pub eco_error: bool,
    pub condense_pump_fail: bool,

    pub dry_fire: TriFlag,
    pub element_fail: TriFlag,
    pub tank_sensor_fail: TriFlag,
    pub leak: TriFlag,
    pub master_disp_fail: TriFlag,
    pub comp_sensor_fail: TriFlag,
    pub sys_sensor_fail: TriFlag,
    pub system_fail: TriFlag,
}

impl TelemetrySnapshot {
    /// Minimal snapshot carrying only the id
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            model_name: None,
            firmware: None,
            set_point: None,
            max_set_point: None,
            upper_temp: None,
            lower_temp: None,
            update_rate: None,
            hot_water_vol: None,
            signal_strength: None,
            fault_codes: None,
            mode: None,
            grid: None,
            air_filter_status: None,
            leak_detect: None,
            system_in_heating: false,
            eco_error: false,
            condense_pump_fail: false,
            dry_fire: TriFlag::Absent,
            element_fail: TriFlag::Absent,
            tank_sensor_fail: TriFlag::Absent,
            leak: TriFlag::Absent,
            master_disp_fail: TriFlag::Absent,
            comp_sensor_fail: TriFlag::Absent,
            sys_sensor_fail: TriFlag::Absent,
            system_fail: TriFlag::Absent,
        }
    }
}

impl TryFrom<PollForm> for TelemetrySnapshot {
    type Error = BridgeError;

    fn try_from(form: PollForm) -> Result<Self> {
        let raw_id = form
            .device_text
            .as_deref()
            .ok_or_else(|| BridgeError::MalformedPoll("missing DeviceText".to_string()))?;
        let id = DeviceId::normalize(raw_id)
            .ok_or_else(|| BridgeError::MalformedPoll(format!("invalid DeviceText {raw_id:?}")))?;

        Ok(Self {
            id,
            model_name: form.master_model_name,
            firmware: form.mod_fw_ver,

            set_point: number("SetPoint", form.set_point.as_deref())?,
            max_set_point: number("MaxSetPoint", form.max_set_point.as_deref())?,
            upper_temp: number("UpperTemp", form.upper_temp.as_deref())?,
            lower_temp: number("LowerTemp", form.lower_temp.as_deref())?,
            update_rate: number("UpdateRate", form.update_rate.as_deref())?,
            hot_water_vol: form.hot_water_vol,
            signal_strength: form.signal_strength,
            fault_codes: form.fault_codes,

            mode: form.mode,
            grid: form.grid,
            air_filter_status: form.air_filter_status,
            leak_detect: form.leak_detect,

            system_in_heating: boolean("SystemInHeating", form.system_in_heating.as_deref())?,
            eco_error: boolean("EcoError", form.eco_error.as_deref())?,
            condense_pump_fail: boolean("CondensePumpFail", form.condense_pump_fail.as_deref())?,

            dry_fire: TriFlag::from_field(form.dry_fire.as_deref()),
            element_fail: TriFlag::from_field(form.element_fail.as_deref()),
            tank_sensor_fail: TriFlag::from_field(form.tank_sensor_fail.as_deref()),
            leak: TriFlag::from_field(form.leak.as_deref()),
            master_disp_fail: TriFlag::from_field(form.master_disp_fail.as_deref()),
            comp_sensor_fail: TriFlag::from_field(form.comp_sensor_fail.as_deref()),
            sys_sensor_fail: TriFlag::from_field(form.sys_sensor_fail.as_deref()),
            system_fail: TriFlag::from_field(form.system_fail.as_deref()),
        })
    }
}

fn number(field: &str, raw: Option<&str>) -> Result<Option<i32>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| BridgeError::MalformedPoll(format!("{field} is not a number: {v:?}"))),
    }
}

fn boolean(field: &str, raw: Option<&str>) -> Result<bool> {
    match raw.map(str::trim) {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(BridgeError::MalformedPoll(format!(
            "{field} is not a boolean: {v:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(id: &str) -> PollForm {
        PollForm {
            device_text: Some(id.to_string()),
            ..PollForm::default()
        }
    }

    #[test]
    fn parses_typed_fields() {
        let snapshot = TelemetrySnapshot::try_from(PollForm {
            set_point: Some("120".into()),
            system_in_heating: Some("True".into()),
            eco_error: Some("false".into()),
            dry_fire: Some("None".into()),
            leak: Some("Detected".into()),
            mode: Some("Hybrid".into()),
            ..form("abcdef")
        })
        .unwrap();

        assert_eq!(snapshot.id.as_str(), "ABCDEF");
        assert_eq!(snapshot.set_point, Some(120));
        assert_eq!(snapshot.max_set_point, None);
        assert!(snapshot.system_in_heating);
        assert!(!snapshot.eco_error);
        assert_eq!(snapshot.dry_fire, TriFlag::Clear);
        assert_eq!(snapshot.leak, TriFlag::Set("Detected".into()));
        assert_eq!(snapshot.element_fail, TriFlag::Absent);
        assert_eq!(snapshot.mode.as_deref(), Some("Hybrid"));
    }

    #[test]
    fn missing_or_bad_id_is_malformed() {
        assert!(matches!(
            TelemetrySnapshot::try_from(PollForm::default()),
            Err(BridgeError::MalformedPoll(_))
        ));
        assert!(matches!(
            TelemetrySnapshot::try_from(form("not-hex")),
            Err(BridgeError::MalformedPoll(_))
        ));
    }

    #[test]
    fn non_numeric_number_is_malformed() {
        let result = TelemetrySnapshot::try_from(PollForm {
            set_point: Some("hot".into()),
            ..form("ABC")
        });
        assert!(matches!(result, Err(BridgeError::MalformedPoll(_))));
    }

    #[test]
    fn non_boolean_flag_is_malformed() {
        let result = TelemetrySnapshot::try_from(PollForm {
            eco_error: Some("maybe".into()),
            ..form("ABC")
        });
        assert!(matches!(result, Err(BridgeError::MalformedPoll(_))));
    }
}
