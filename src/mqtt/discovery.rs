//! Home Assistant MQTT discovery descriptors
//!
//! The record depends on nothing but the device id, so announcing the same
//! device twice produces byte-identical payloads.

use super::topics::{TopicCodec, TopicKind};
use crate::device::command::{SET_POINT_RANGE, UPDATE_RATE_RANGE};
use crate::device::translate::BUS_MODES;
use crate::device::DeviceId;
use crate::error::Result;
use serde::Serialize;

const MANUFACTURER: &str = "A. O. Smith";
const MODEL: &str = "EnergySmart Water Heater";

/// One retained config message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Serialize, Debug, Clone, Default)]
struct DeviceInfo {
    identifiers: Vec<String>,
    name: String,
    manufacturer: &'static str,
    model: &'static str,
}

/// Union of the fields used by the entity types we announce
#[derive(Serialize, Debug, Default)]
struct Descriptor {
    name: &'static str,
    unique_id: String,
    availability_topic: String,
    device: DeviceInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    step: Option<u16>,

    // water_heater only
    #[serde(skip_serializing_if = "Option::is_none")]
    mode_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    modes: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature_command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_temperature_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature_unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    precision: Option<f64>,
}

/// Read-only entity: (component, slug, name, state, device_class, unit, icon)
type SensorSpec = (
    &'static str,
    &'static str,
    &'static str,
    TopicKind,
    Option<&'static str>,
    Option<&'static str>,
    Option<&'static str>,
);

const SENSORS: &[SensorSpec] = &[
    ("binary_sensor", "heating", "Heating", TopicKind::SystemInHeatingState, Some("heat"), None, None),
    ("binary_sensor", "grid", "Grid", TopicKind::GridState, None, None, Some("mdi:transmission-tower")),
    ("binary_sensor", "airfilterstatus", "Air Filter", TopicKind::AirFilterStatusState, Some("problem"), None, None),
    ("binary_sensor", "condensepumpfail", "Condensate Pump", TopicKind::CondensePumpFailState, Some("problem"), None, None),
    ("binary_sensor", "leakdetect", "Leak Detection", TopicKind::LeakDetectState, Some("moisture"), None, None),
    ("binary_sensor", "ecoerror", "ECO Error", TopicKind::EcoErrorState, Some("problem"), None, None),
    ("sensor", "rawmode", "Raw Mode", TopicKind::RawModeState, None, None, Some("mdi:water-boiler")),
    ("sensor", "hotwatervol", "Hot Water Volume", TopicKind::HotWaterVolState, None, None, Some("mdi:water-percent")),
    ("sensor", "uppertemp", "Upper Tank Temperature", TopicKind::UpperTempState, Some("temperature"), Some("°F"), None),
    ("sensor", "lowertemp", "Lower Tank Temperature", TopicKind::LowerTempState, Some("temperature"), Some("°F"), None),
    ("binary_sensor", "dryfire", "Dry Fire", TopicKind::DryFireState, Some("problem"), None, None),
    ("binary_sensor", "elementfail", "Element Failure", TopicKind::ElementFailState, Some("problem"), None, None),
    ("binary_sensor", "tanksensorfail", "Tank Sensor Failure", TopicKind::TankSensorFailState, Some("problem"), None, None),
    ("binary_sensor", "leak", "Leak", TopicKind::LeakState, Some("moisture"), None, None),
    ("binary_sensor", "masterdispfail", "Display Failure", TopicKind::MasterDispFailState, Some("problem"), None, None),
    ("binary_sensor", "compsensorfail", "Compressor Sensor Failure", TopicKind::CompSensorFailState, Some("problem"), None, None),
    ("binary_sensor", "syssensorfail", "System Sensor Failure", TopicKind::SysSensorFailState, Some("problem"), None, None),
    ("binary_sensor", "systemfail", "System Failure", TopicKind::SystemFailState, Some("problem"), None, None),
    ("sensor", "faultcodes", "Fault Codes", TopicKind::FaultCodesState, None, None, Some("mdi:alert-circle")),
    ("sensor", "signalstrength", "Signal Strength", TopicKind::SignalStrengthState, Some("signal_strength"), Some("dBm"), None),
];

/// Number of config messages published per device
pub const ENTITY_COUNT: usize = SENSORS.len() + 2;

/// Builds the full discovery record of one device
pub fn discovery_record(codec: &TopicCodec, id: &DeviceId) -> Result<Vec<DiscoveryMessage>> {
    let device = DeviceInfo {
        identifiers: vec![format!("energysmart_{id}")],
        name: format!("EnergySmart {id}"),
        manufacturer: MANUFACTURER,
        model: MODEL,
    };
    let base = |name: &'static str, slug: &str| Descriptor {
        name,
        unique_id: format!("{id}_{slug}"),
        availability_topic: codec.status_topic(),
        device: device.clone(),
        ..Descriptor::default()
    };

    let mut messages = Vec::with_capacity(ENTITY_COUNT);

    let heater = Descriptor {
        mode_state_topic: Some(codec.format(id, TopicKind::ModeState)),
        mode_command_topic: Some(codec.format(id, TopicKind::ModeCommand)),
        modes: Some(BUS_MODES.to_vec()),
        temperature_state_topic: Some(codec.format(id, TopicKind::SetPointState)),
        temperature_command_topic: Some(codec.format(id, TopicKind::SetPointCommand)),
        current_temperature_topic: Some(codec.format(id, TopicKind::UpperTempState)),
        min_temp: Some(*SET_POINT_RANGE.start()),
        max_temp: Some(*SET_POINT_RANGE.end()),
        temperature_unit: Some("F"),
        precision: Some(1.0),
        ..base("Water Heater", "waterheater")
    };
    messages.push(DiscoveryMessage {
        topic: codec.discovery_topic("water_heater", id, None),
        payload: serde_json::to_string(&heater)?,
    });

    for (component, slug, name, state, device_class, unit, icon) in SENSORS {
        let descriptor = Descriptor {
            state_topic: Some(codec.format(id, *state)),
            device_class: *device_class,
            unit_of_measurement: *unit,
            icon: *icon,
            ..base(*name, *slug)
        };
        messages.push(DiscoveryMessage {
            topic: codec.discovery_topic(component, id, Some(*slug)),
            payload: serde_json::to_string(&descriptor)?,
        });
    }

    let update_rate = Descriptor {
        state_topic: Some(codec.format(id, TopicKind::UpdateRateState)),
        command_topic: Some(codec.format(id, TopicKind::UpdateRateCommand)),
        unit_of_measurement: Some("s"),
        icon: Some("mdi:timer-sync"),
        min: Some(*UPDATE_RATE_RANGE.start()),
        max: Some(*UPDATE_RATE_RANGE.end()),
        step: Some(1),
        ..base("Update Rate", "updaterate")
    };
    messages.push(DiscoveryMessage {
        topic: codec.discovery_topic("number", id, Some("updaterate")),
        payload: serde_json::to_string(&update_rate)?,
    });

    Ok(messages)
}
