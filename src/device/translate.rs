//! Value tables between the module and Home Assistant
//!
//! Every function is total: unknown input falls into the declared default
//! branch instead of failing.

use super::TriFlag;

pub const ON: &str = "ON";
pub const OFF: &str = "OFF";

/// Bus value reported for device modes we do not know
pub const UNKNOWN_MODE: &str = "unknown";

/// Bus mode names in the order they are advertised
pub const BUS_MODES: [&str; 4] = ["heat_pump", "eco", "electric", "off"];

/// Device mode → Home Assistant operation mode
pub fn mode_to_bus(device_mode: &str) -> &'static str {
    match device_mode {
        "Efficiency" => "heat_pump",
        "Hybrid" => "eco",
        "Electric" => "electric",
        "Vacation" => "off",
        _ => UNKNOWN_MODE,
    }
}

/// Home Assistant operation mode → device mode, `None` leaves the mode alone
pub fn mode_to_device(bus_mode: &str) -> Option<&'static str> {
    match bus_mode {
        "heat_pump" => Some("Efficiency"),
        "eco" => Some("Hybrid"),
        "electric" => Some("Electric"),
        "off" => Some("Vacation"),
        _ => None,
    }
}

pub fn flag(value: &TriFlag) -> &'static str {
    if value.is_set() {
        ON
    } else {
        OFF
    }
}

pub fn switch(value: bool) -> &'static str {
    if value {
        ON
    } else {
        OFF
    }
}

/// Grid sensor is off only when the module reports the grid as disabled
pub fn grid(value: Option<&str>) -> &'static str {
    match value {
        Some("Disabled") => OFF,
        _ => ON,
    }
}

pub fn air_filter(value: Option<&str>) -> &'static str {
    match value {
        Some("OK") => OFF,
        _ => ON,
    }
}

pub fn leak_detect(value: Option<&str>) -> &'static str {
    match value {
        Some("NotDetected") => OFF,
        _ => ON,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_MODES: [&str; 4] = ["Efficiency", "Hybrid", "Electric", "Vacation"];

    #[test]
    fn mode_table_round_trips() {
        for mode in DEVICE_MODES {
            assert_eq!(mode_to_device(mode_to_bus(mode)), Some(mode));
        }
        let advertised: Vec<_> = DEVICE_MODES.iter().map(|m| mode_to_bus(m)).collect();
        assert_eq!(advertised, BUS_MODES);
    }

    #[test]
    fn unknown_modes_use_defaults() {
        assert_eq!(mode_to_bus("Turbo"), UNKNOWN_MODE);
        assert_eq!(mode_to_bus("hybrid"), UNKNOWN_MODE);
        assert_eq!(mode_to_device("boost"), None);
        assert_eq!(mode_to_device(UNKNOWN_MODE), None);
    }

    #[test]
    fn flag_table() {
        assert_eq!(flag(&TriFlag::Absent), OFF);
        assert_eq!(flag(&TriFlag::Clear), OFF);
        assert_eq!(flag(&TriFlag::Set("Fault".into())), ON);
    }

    #[test]
    fn switch_table() {
        assert_eq!(switch(true), ON);
        assert_eq!(switch(false), OFF);
    }

    #[test]
    fn grid_table() {
        assert_eq!(grid(Some("Disabled")), OFF);
        assert_eq!(grid(Some("Enabled")), ON);
        assert_eq!(grid(None), ON);
    }

    #[test]
    fn air_filter_table() {
        assert_eq!(air_filter(Some("OK")), OFF);
        assert_eq!(air_filter(Some("Dirty")), ON);
        assert_eq!(air_filter(None), ON);
    }

    #[test]
    fn leak_detect_table() {
        assert_eq!(leak_detect(Some("NotDetected")), OFF);
        assert_eq!(leak_detect(Some("Detected")), ON);
        assert_eq!(leak_detect(None), ON);
    }
}
