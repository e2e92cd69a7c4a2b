//! Message routing between the broker and the device registry
//!
//! Outbound: everything the bridge publishes goes through [`BusClient`], a
//! thin seam over `rumqttc::AsyncClient` so the poll path can be exercised
//! without a broker.
//!
//! Inbound: [`handle_command`] turns one publish on a command topic into at
//! most one queued [`Command`].

use super::topics::{TopicCodec, TopicKind};
use crate::device::command::{SET_POINT_RANGE, UPDATE_RATE_RANGE};
use crate::device::translate::mode_to_device;
use crate::device::{Command, DeviceId, DeviceRegistry};
use crate::error::Result;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use std::fmt;
use tracing::debug;

/// Access to the broker.
///
/// State traffic is fire-and-forget and may be dropped when the request
/// channel is full. Connection-level traffic (presence, subscriptions) waits
/// for room in the channel instead, so it survives a backlog built up while
/// the broker was away.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Publishes a retained message with QoS 0 without waiting
    fn publish_retained(&self, topic: &str, payload: &str) -> Result<()>;

    /// Publishes a retained message with QoS 0, waiting for channel capacity
    async fn deliver_retained(&self, topic: &str, payload: &str) -> Result<()>;

    async fn subscribe_filter(&self, filter: &str) -> Result<()>;
}

#[async_trait]
impl BusClient for AsyncClient {
    fn publish_retained(&self, topic: &str, payload: &str) -> Result<()> {
        self.try_publish(topic, QoS::AtMostOnce, true, payload.as_bytes().to_vec())?;
        Ok(())
    }

    async fn deliver_retained(&self, topic: &str, payload: &str) -> Result<()> {
        self.publish(topic, QoS::AtMostOnce, true, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn subscribe_filter(&self, filter: &str) -> Result<()> {
        self.subscribe(filter, QoS::AtMostOnce).await?;
        Ok(())
    }
}

/// Why an inbound message did not produce a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Topic outside our namespace or with an unknown suffix
    ForeignTopic,
    /// One of our state topics, e.g. a retained echo
    NotACommand,
    /// The device has not polled since the last (re)connect
    UnknownDevice,
    /// Non-numeric or out-of-range value
    InvalidPayload,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::ForeignTopic => "foreign topic",
            IgnoreReason::NotACommand => "not a command topic",
            IgnoreReason::UnknownDevice => "unknown device",
            IgnoreReason::InvalidPayload => "invalid payload",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Queued(DeviceId, Command),
    Ignored(IgnoreReason),
}

/// Validates one inbound message and queues the resulting command
pub fn handle_command(
    codec: &TopicCodec,
    registry: &DeviceRegistry,
    topic: &str,
    payload: &[u8],
) -> IntakeOutcome {
    let Some((id, kind)) = codec.parse(topic) else {
        return IntakeOutcome::Ignored(IgnoreReason::ForeignTopic);
    };
    if !kind.is_command() {
        return IntakeOutcome::Ignored(IgnoreReason::NotACommand);
    }

    let payload = String::from_utf8_lossy(payload);
    debug!("Received: Id: {}, Command: {}, Value: {}", id, kind, payload);

    if !registry.contains(&id) {
        return IntakeOutcome::Ignored(IgnoreReason::UnknownDevice);
    }

    let Some(command) = translate_command(kind, &payload) else {
        return IntakeOutcome::Ignored(IgnoreReason::InvalidPayload);
    };

    // The device may have been forgotten by a reconnect in between
    if !registry.enqueue(&id, command.clone()) {
        return IntakeOutcome::Ignored(IgnoreReason::UnknownDevice);
    }
    debug!("Queued {} {:?}", id, command);
    IntakeOutcome::Queued(id, command)
}

/// Payload of a command topic → device command, `None` if it must be dropped.
///
/// Unknown modes are not dropped: they become a command without a mode.
pub fn translate_command(kind: TopicKind, payload: &str) -> Option<Command> {
    let payload = payload.trim();
    match kind {
        TopicKind::UpdateRateCommand => {
            let rate: i64 = payload.parse().ok()?;
            let rate = u16::try_from(rate).ok()?;
            UPDATE_RATE_RANGE
                .contains(&rate)
                .then(|| Command::update_rate(rate))
        }
        TopicKind::ModeCommand => Some(Command::mode(mode_to_device(payload))),
        TopicKind::SetPointCommand => {
            let set_point: f64 = payload.parse().ok()?;
            SET_POINT_RANGE
                .contains(&set_point)
                .then(|| Command::set_point(set_point.trunc() as i32))
        }
        _ => None,
    }
}
