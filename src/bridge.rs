//! The translation core shared by the HTTP poll path and the MQTT event loop

use crate::device::translate::{self, mode_to_bus, UNKNOWN_MODE};
use crate::device::{Command, DeviceRegistry, TelemetrySnapshot};
use crate::mqtt::discovery::discovery_record;
use crate::mqtt::message_manager::{handle_command, BusClient, IgnoreReason, IntakeOutcome};
use crate::mqtt::topics::{TopicCodec, TopicKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

pub struct Bridge {
    codec: TopicCodec,
    registry: DeviceRegistry,
    bus: Arc<dyn BusClient>,
    // Broker session up; state is only published while set
    online: AtomicBool,
}

impl Bridge {
    pub fn new(codec: TopicCodec, bus: Arc<dyn BusClient>) -> Self {
        Self {
            codec,
            registry: DeviceRegistry::new(),
            bus,
            online: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Handles one device check-in and returns the reply for it.
    ///
    /// Discovery (first poll of the epoch only) is published before any state.
    /// Without a broker session nothing is published; the next connection
    /// epoch starts with an empty registry, so the device is announced then.
    pub fn handle_poll(&self, snapshot: &TelemetrySnapshot) -> Command {
        let (device, is_new) = self.registry.lookup_or_create(&snapshot.id);
        device.touch();

        // Registration happens first, so a device added after begin_epoch
        // always sees the flag set
        if self.is_online() {
            if is_new {
                info!(
                    "Publishing water heater config {} (model: {}, firmware: {})",
                    snapshot.id,
                    snapshot.model_name.as_deref().unwrap_or("unknown"),
                    snapshot.firmware.as_deref().unwrap_or("unknown"),
                );
                self.announce(snapshot);
            }

            debug!("Publishing water heater state {}", snapshot.id);
            self.publish_state(snapshot);
        } else {
            debug!("Broker not connected, not publishing state of {}", snapshot.id);
        }

        let command = self.registry.dequeue(&snapshot.id);
        if !command.is_empty() {
            debug!("Sent queued command {} {:?}", snapshot.id, command);
        }
        command
    }

    /// Inbound publish from the broker
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> IntakeOutcome {
        let outcome = handle_command(&self.codec, &self.registry, topic, payload);
        match &outcome {
            IntakeOutcome::Ignored(IgnoreReason::UnknownDevice) => {
                debug!("Dropped command on {}: device has not polled yet", topic)
            }
            IntakeOutcome::Ignored(reason) => debug!("Ignored message on {}: {}", topic, reason),
            IntakeOutcome::Queued(..) => {}
        }
        outcome
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Start of a connection epoch: mark online and forget every device
    pub fn begin_epoch(&self) {
        self.online.store(true, Ordering::SeqCst);
        self.registry.reset();
    }

    /// Broker session lost; polls keep being answered but publish nothing
    pub fn on_disconnected(&self) {
        if self.online.swap(false, Ordering::SeqCst) {
            debug!("Pausing state publishing until the broker is back");
        }
    }

    /// Publishes `online` and subscribes the command filters.
    ///
    /// Waits for room in the request channel, so this must not run on the
    /// task driving the event loop.
    pub async fn announce_presence(&self) {
        debug!("Publishing bridge online");
        let status = self.codec.status_topic();
        if let Err(e) = self.bus.deliver_retained(&status, STATUS_ONLINE).await {
            warn!("Failed to publish {}: {}", status, e);
        }

        for kind in TopicKind::COMMANDS {
            let filter = self.codec.command_filter(kind);
            match self.bus.subscribe_filter(&filter).await {
                Ok(()) => debug!("Subscribed to {}", filter),
                Err(e) => warn!("Failed to subscribe to {}: {}", filter, e),
            }
        }
    }

    /// [`Bridge::begin_epoch`] followed by [`Bridge::announce_presence`]
    pub async fn on_connected(&self) {
        self.begin_epoch();
        self.announce_presence().await;
    }

    fn announce(&self, snapshot: &TelemetrySnapshot) {
        match discovery_record(&self.codec, &snapshot.id) {
            Ok(messages) => {
                for message in messages {
                    self.publish(&message.topic, &message.payload);
                }
            }
            Err(e) => warn!("Failed to build discovery for {}: {}", snapshot.id, e),
        }
    }

    fn publish_state(&self, s: &TelemetrySnapshot) {
        let number = |kind: TopicKind, value: Option<i32>| {
            if let Some(value) = value {
                self.state(s, kind, &value.to_string());
            }
        };
        let text = |kind: TopicKind, value: Option<&str>| {
            if let Some(value) = value {
                self.state(s, kind, value);
            }
        };

        number(TopicKind::MaxSetPointState, s.max_set_point);
        number(TopicKind::SetPointState, s.set_point);
        self.state(
            s,
            TopicKind::ModeState,
            s.mode.as_deref().map(mode_to_bus).unwrap_or(UNKNOWN_MODE),
        );
        self.state(s, TopicKind::SystemInHeatingState, translate::switch(s.system_in_heating));
        text(TopicKind::HotWaterVolState, s.hot_water_vol.as_deref());

        number(TopicKind::UpperTempState, s.upper_temp);
        number(TopicKind::LowerTempState, s.lower_temp);
        number(TopicKind::UpdateRateState, s.update_rate);

        self.state(s, TopicKind::DryFireState, translate::flag(&s.dry_fire));
        self.state(s, TopicKind::ElementFailState, translate::flag(&s.element_fail));
        self.state(s, TopicKind::TankSensorFailState, translate::flag(&s.tank_sensor_fail));

        text(TopicKind::FaultCodesState, s.fault_codes.as_deref());
        text(TopicKind::SignalStrengthState, s.signal_strength.as_deref());
        text(TopicKind::RawModeState, s.mode.as_deref());

        self.state(s, TopicKind::GridState, translate::grid(s.grid.as_deref()));
        self.state(
            s,
            TopicKind::AirFilterStatusState,
            translate::air_filter(s.air_filter_status.as_deref()),
        );
        self.state(
            s,
            TopicKind::CondensePumpFailState,
            translate::switch(s.condense_pump_fail),
        );
        self.state(
            s,
            TopicKind::LeakDetectState,
            translate::leak_detect(s.leak_detect.as_deref()),
        );
        self.state(s, TopicKind::EcoErrorState, translate::switch(s.eco_error));

        self.state(s, TopicKind::LeakState, translate::flag(&s.leak));
        self.state(s, TopicKind::MasterDispFailState, translate::flag(&s.master_disp_fail));
        self.state(s, TopicKind::CompSensorFailState, translate::flag(&s.comp_sensor_fail));
        self.state(s, TopicKind::SysSensorFailState, translate::flag(&s.sys_sensor_fail));
        self.state(s, TopicKind::SystemFailState, translate::flag(&s.system_fail));
        text(TopicKind::LegacyFaultCodesState, s.fault_codes.as_deref());
    }

    fn state(&self, snapshot: &TelemetrySnapshot, kind: TopicKind, payload: &str) {
        self.publish(&self.codec.format(&snapshot.id, kind), payload);
    }

    /// Publish failures never reach the device; they are logged and dropped
    pub(crate) fn publish(&self, topic: &str, payload: &str) {
        if let Err(e) = self.bus.publish_retained(topic, payload) {
            warn!("Failed to publish {}: {}", topic, e);
        }
    }
}
