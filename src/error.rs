//! Error definitions for the bridge library

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised by the bridge components
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The device sent a poll payload we cannot interpret
    #[error("Malformed poll: {0}")]
    MalformedPoll(String),

    /// Reading the configuration file or binding the listener failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for our schema
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The MQTT client rejected a request (request channel full or closed)
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// A discovery descriptor could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match self {
            BridgeError::MalformedPoll(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
