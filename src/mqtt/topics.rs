//! Topic namespace of the bridge
//!
//! ```text
//! <prefix>/status                               presence, retained
//! <prefix>/<DEVICE>/<kind>_state                state, retained
//! <prefix>/<DEVICE>/<kind>_command              commands from Home Assistant
//! <discovery>/water_heater/<DEVICE>/config      discovery, heater entity
//! <discovery>/<component>/<DEVICE>/<entity>/config
//! ```

use crate::device::DeviceId;
use std::fmt;

macro_rules! topic_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every state and command suffix the bridge knows about
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TopicKind {
            $($variant),+
        }

        impl TopicKind {
            pub const ALL: &'static [TopicKind] = &[$(TopicKind::$variant),+];

            /// Canonical suffix spelling
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(TopicKind::$variant => $name),+
                }
            }
        }
    };
}

topic_kinds! {
    MaxSetPointState => "maxsetpoint_state",
    SetPointState => "setpoint_state",
    ModeState => "mode_state",
    SystemInHeatingState => "systeminheating_state",
    HotWaterVolState => "hotwatervol_state",
    UpperTempState => "uppertemp_state",
    LowerTempState => "lowertemp_state",
    UpdateRateState => "updaterate_state",
    DryFireState => "dryfire_state",
    ElementFailState => "elementfail_state",
    TankSensorFailState => "tanksensorfail_state",
    FaultCodesState => "faultcodes_state",
    SignalStrengthState => "signalstrength_state",
    RawModeState => "raw_mode_state",
    GridState => "grid_state",
    AirFilterStatusState => "air_filter_status_state",
    CondensePumpFailState => "condense_pump_fail_state",
    LeakDetectState => "leak_detect_state",
    EcoErrorState => "eco_error_state",
    LeakState => "leak_state",
    MasterDispFailState => "master_disp_fail_state",
    CompSensorFailState => "comp_sensor_fail_state",
    SysSensorFailState => "sys_sensor_fail_state",
    SystemFailState => "system_fail_state",
    LegacyFaultCodesState => "fault_codes_state",
    UpdateRateCommand => "updaterate_command",
    ModeCommand => "mode_command",
    SetPointCommand => "setpoint_command",
}

impl TopicKind {
    pub const COMMANDS: [TopicKind; 3] = [
        TopicKind::UpdateRateCommand,
        TopicKind::ModeCommand,
        TopicKind::SetPointCommand,
    ];

    /// Case-insensitive lookup of a suffix
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(suffix))
    }

    pub fn is_command(&self) -> bool {
        Self::COMMANDS.contains(self)
    }

    /// State topic reporting the value a command changes
    pub fn state_kind(&self) -> Option<TopicKind> {
        match self {
            TopicKind::UpdateRateCommand => Some(TopicKind::UpdateRateState),
            TopicKind::ModeCommand => Some(TopicKind::ModeState),
            TopicKind::SetPointCommand => Some(TopicKind::SetPointState),
            _ => None,
        }
    }
}

impl fmt::Display for TopicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats and parses topics under the configured prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicCodec {
    prefix: String,
    discovery_prefix: String,
}

impl TopicCodec {
    pub fn new(prefix: impl Into<String>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// `<prefix>/<DEVICE>/<kind>` → (device, kind); anything else is `None`
    pub fn parse(&self, topic: &str) -> Option<(DeviceId, TopicKind)> {
        let rest = topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        let (device, suffix) = rest.split_once('/')?;
        let kind = TopicKind::from_suffix(suffix)?;
        let device = DeviceId::parse(device)?;
        Some((device, kind))
    }

    pub fn format(&self, device: &DeviceId, kind: TopicKind) -> String {
        format!("{}/{}/{}", self.prefix, device, kind.as_str())
    }

    pub fn status_topic(&self) -> String {
        format!("{}/status", self.prefix)
    }

    /// Wildcard subscription covering one command kind on all devices
    pub fn command_filter(&self, kind: TopicKind) -> String {
        format!("{}/+/{}", self.prefix, kind.as_str())
    }

    /// Discovery config topic; `entity` is omitted for the main heater entity
    pub fn discovery_topic(&self, component: &str, device: &DeviceId, entity: Option<&str>) -> String {
        match entity {
            Some(entity) => format!(
                "{}/{}/{}/{}/config",
                self.discovery_prefix, component, device, entity
            ),
            None => format!("{}/{}/{}/config", self.discovery_prefix, component, device),
        }
    }
}
