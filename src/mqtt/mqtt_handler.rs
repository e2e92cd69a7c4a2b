//! MQTT session with statum state machine for the connection lifecycle
//!
//! # State Machine
//!
//! ```text
//! Configured ──► Running ──► Draining ──► Closed
//!   (create)   (event loop)  (offline +
//!                             disconnect)
//! ```
//!
//! While `Running`, the broker connection itself moves between the runtime
//! [`ConnectionState`]s and is observable through a watch channel:
//!
//! ```text
//! Connecting ──► Connected ──► (error) ──► Connecting ...
//!                    │
//!                 shutdown ──► Disconnecting ──► Disconnected
//! ```
//!
//! rumqttc reconnects whenever the event loop is polled after an error, so the
//! only retry policy here is the fixed delay between those polls.

use super::config::MqttConfig;
use super::topics::TopicCodec;
use crate::bridge::{Bridge, STATUS_OFFLINE};
use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet, QoS};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// States for the session lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Configured, // Options built, client handed out
    Running,    // Driving the event loop
    Draining,   // Flushing offline status and disconnect
    Closed,     // Event loop finished
}

/// MQTT session with compile-time lifecycle safety via statum
#[machine]
pub struct MqttSession<S: SessionState> {
    client: AsyncClient,
    eventloop: EventLoop,
    codec: TopicCodec,
    reconnect_delay: Duration,
    state_tx: watch::Sender<ConnectionState>,
}

impl<S: SessionState> MqttSession<S> {
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

/// Connection options: broker, keep alive, credentials and the offline last will
pub fn mqtt_options(config: &MqttConfig, codec: &TopicCodec) -> MqttOptions {
    // rumqttc panics on an empty client id
    let client_id = match config.client_id.trim() {
        "" => MqttConfig::default().client_id,
        id => id.to_string(),
    };
    let mut options = MqttOptions::new(client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_last_will(LastWill::new(
        codec.status_topic(),
        STATUS_OFFLINE,
        QoS::AtMostOnce,
        true,
    ));
    if let Some((user, password)) = config.credentials() {
        options.set_credentials(user, password);
    }
    options
}

impl MqttSession<Configured> {
    pub fn create(config: &MqttConfig, codec: TopicCodec) -> Self {
        info!(
            "Configuring MQTT session for {}:{} as {}",
            config.host, config.port, config.client_id
        );
        let options = mqtt_options(config, &codec);
        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self::new(client, eventloop, codec, config.reconnect_delay(), state_tx)
    }

    /// Client handle for publishing; requests are queued until the loop runs
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    pub fn activate(self) -> MqttSession<Running> {
        self.set_state(ConnectionState::Connecting);
        self.transition()
    }
}

impl MqttSession<Running> {
    /// Main event loop, runs until the shutdown token is cancelled
    pub async fn run_until_shutdown(
        mut self,
        bridge: Arc<Bridge>,
        shutdown: CancellationToken,
    ) -> MqttSession<Draining> {
        info!("Starting MQTT event loop");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received for MQTT session");
                    break;
                }

                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected");
                        self.set_state(ConnectionState::Connected);
                        bridge.begin_epoch();
                        // Presence waits for channel room, which only this loop frees
                        let bridge = Arc::clone(&bridge);
                        tokio::spawn(async move { bridge.announce_presence().await });
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        bridge.handle_message(&publish.topic, &publish.payload);
                    }
                    Ok(Event::Incoming(Packet::Disconnect)) => {
                        warn!("Disconnected by broker");
                        self.set_state(ConnectionState::Disconnected);
                        bridge.on_disconnected();
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            "MQTT connection error: {}, retrying in {:?}",
                            e, self.reconnect_delay
                        );
                        self.set_state(ConnectionState::Connecting);
                        bridge.on_disconnected();
                        tokio::select! {
                            _ = shutdown.cancelled() => break,
                            _ = tokio::time::sleep(self.reconnect_delay) => {}
                        }
                    }
                }
            }
        }

        bridge.on_disconnected();
        self.transition()
    }
}

impl MqttSession<Draining> {
    /// Publishes "offline", disconnects and drives the loop until that is flushed
    pub async fn drain(mut self, timeout: Duration) -> MqttSession<Closed> {
        self.set_state(ConnectionState::Disconnecting);

        debug!("Publishing bridge offline");
        let status = self.codec.status_topic();
        if let Err(e) = self
            .client
            .try_publish(status, QoS::AtMostOnce, true, STATUS_OFFLINE)
        {
            warn!("Failed to queue offline status: {}", e);
        }
        if let Err(e) = self.client.try_disconnect() {
            warn!("Failed to queue disconnect: {}", e);
        }

        let eventloop = &mut self.eventloop;
        let flushed = tokio::time::timeout(timeout, async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Event loop ended during drain: {}", e);
                        break;
                    }
                }
            }
        })
        .await;

        if flushed.is_err() {
            warn!("Disconnect not flushed within {:?}", timeout);
        }

        self.set_state(ConnectionState::Disconnected);
        info!("MQTT session closed");
        self.transition()
    }
}

impl MqttSession<Closed> {}

/// Handle for the MQTT session running in a tokio task
///
/// Cancelling the shared token stops the event loop; [`MqttHandle::shutdown`]
/// then waits for the offline status and disconnect to be flushed.
#[derive(Debug)]
pub struct MqttHandle {
    shutdown: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl MqttHandle {
    pub fn start(
        session: MqttSession<Configured>,
        bridge: Arc<Bridge>,
        shutdown: CancellationToken,
        drain_timeout: Duration,
    ) -> Self {
        let state_rx = session.connection_state();
        let token = shutdown.clone();

        let task_handle = tokio::spawn(async move {
            let running = session.activate();
            let draining = running.run_until_shutdown(bridge, token).await;
            let _closed = draining.drain(drain_timeout).await;
        });

        Self {
            shutdown,
            task_handle: Some(task_handle),
            state_rx,
        }
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Stops the session and waits for the task to finish
    pub async fn shutdown(&mut self) {
        self.shutdown.cancel();

        if let Some(handle) = self.task_handle.take() {
            match handle.await {
                Ok(()) => debug!("MQTT task completed"),
                Err(e) => error!("MQTT task panicked: {}", e),
            }
        } else {
            debug!("MQTT session already shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::STATUS_ONLINE;
    use crate::device::{DeviceId, TelemetrySnapshot};

    fn config() -> MqttConfig {
        MqttConfig {
            host: "127.0.0.1".to_string(),
            // Nothing listens here; connection attempts fail immediately
            port: 1,
            reconnect_delay_secs: 60,
            ..MqttConfig::default()
        }
    }

    #[test]
    fn options_carry_offline_last_will() {
        let codec = TopicCodec::new("energysmart", "homeassistant");
        let options = mqtt_options(&config(), &codec);
        let will = options.last_will().unwrap();
        assert_eq!(will.topic, "energysmart/status");
        assert_eq!(&will.message[..], STATUS_OFFLINE.as_bytes());
        assert!(will.retain);
        assert_ne!(STATUS_ONLINE, STATUS_OFFLINE);
        assert_eq!(options.credentials(), None);
    }

    #[test]
    fn options_carry_credentials_when_configured() {
        let codec = TopicCodec::new("energysmart", "homeassistant");
        let config = MqttConfig {
            username: Some("bridge".to_string()),
            password: Some("pw".to_string()),
            ..config()
        };
        let options = mqtt_options(&config, &codec);
        assert_eq!(
            options.credentials(),
            Some(("bridge".to_string(), "pw".to_string()))
        );
    }

    #[tokio::test]
    async fn shutdown_completes_without_broker() {
        let codec = TopicCodec::new("energysmart", "homeassistant");
        let session = MqttSession::create(&config(), codec.clone());
        let bridge = Arc::new(Bridge::new(codec, Arc::new(session.client())));
        let mut handle = MqttHandle::start(
            session,
            bridge,
            CancellationToken::new(),
            Duration::from_secs(1),
        );

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .expect("shutdown should finish while the broker is unreachable");
        assert_eq!(*handle.connection_state().borrow(), ConnectionState::Disconnected);
    }

    fn snapshot() -> TelemetrySnapshot {
        let mut snapshot = TelemetrySnapshot::new(DeviceId::parse("ABCDEF").unwrap());
        snapshot.mode = Some("Hybrid".to_string());
        snapshot.set_point = Some(120);
        snapshot
    }

    // The event loop is never polled here, like during a broker outage
    #[tokio::test]
    async fn outage_backlog_does_not_starve_presence() {
        let codec = TopicCodec::new("energysmart", "homeassistant");
        let config = MqttConfig {
            channel_capacity: 10,
            ..config()
        };
        let session = MqttSession::create(&config, codec.clone());
        let bridge = Bridge::new(codec, Arc::new(session.client()));

        bridge.on_connected().await;
        bridge.on_disconnected();
        for _ in 0..20 {
            bridge.handle_poll(&snapshot());
        }

        tokio::time::timeout(Duration::from_secs(1), bridge.on_connected())
            .await
            .expect("online and subscriptions must fit after the outage");
        drop(session);
    }

    #[tokio::test]
    async fn presence_waits_for_room_instead_of_failing() {
        let codec = TopicCodec::new("energysmart", "homeassistant");
        let config = MqttConfig {
            channel_capacity: 4,
            ..config()
        };
        let session = MqttSession::create(&config, codec.clone());
        let client = session.client();
        while client
            .try_publish("energysmart/filler", QoS::AtMostOnce, false, "x")
            .is_ok()
        {}

        let bridge = Bridge::new(codec, Arc::new(client));
        let pending = tokio::time::timeout(Duration::from_millis(200), bridge.announce_presence()).await;
        assert!(pending.is_err(), "presence must queue, not be dropped");
        drop(session);
    }
}
