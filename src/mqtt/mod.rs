//! # MQTT Integration Module
//!
//! Everything the bridge does on the broker side: the topic namespace, Home
//! Assistant discovery, command intake and the connection lifecycle.
//!
//! ## Why This Module Exists
//!
//! The water heater only ever polls us over HTTP, while Home Assistant expects
//! a live MQTT device: retained state topics, discovery configs, an
//! availability topic and command topics it can publish to at any time. This
//! module is the broker half of that translation.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker settings and topic prefixes
//! ├── topics.rs           - Topic kinds, topic parsing and formatting
//! ├── discovery.rs        - Home Assistant discovery descriptors
//! ├── message_manager.rs  - Publish seam and command intake
//! └── mqtt_handler.rs     - Connection state machine and event loop
//! ```
//!
//! ## Connection Contract
//!
//! - Last will `<prefix>/status = offline` (retained) covers crashes
//! - Every ConnAck starts a new connection epoch: the device registry is reset,
//!   `online` is published and the command filters are (re)subscribed
//! - Connection errors are retried by polling the event loop again after a
//!   fixed delay; the bridge has no backoff logic of its own
//! - State publishes are QoS 0, never block the caller and are skipped while
//!   there is no session
//! - Presence and subscriptions wait for room in the request channel, so a
//!   backlog from an outage cannot crowd them out

pub mod config;
pub mod discovery;
pub mod message_manager;
pub mod mqtt_handler;
pub mod topics;
