//! HTTP poll endpoint
//!
//! The module posts its full state as a URL-encoded form to a hard-coded
//! path and reads the next command from the JSON reply. The body is decoded
//! whatever `Content-Type` the firmware sends.

use crate::bridge::Bridge;
use crate::device::{Command, PollForm, TelemetrySnapshot};
use crate::error::{BridgeError, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Path the module firmware posts to
pub const POLL_PATH: &str = "/~branecky/postAll.php";

pub fn router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route(POLL_PATH, post(poll))
        .with_state(bridge)
}

async fn poll(State(bridge): State<Arc<Bridge>>, body: Bytes) -> Result<Json<Command>> {
    let form: PollForm = serde_urlencoded::from_bytes(&body)
        .map_err(|e| BridgeError::MalformedPoll(format!("undecodable form: {e}")))?;
    debug!("Poll: {:?}", form);

    let snapshot = TelemetrySnapshot::try_from(form)?;
    let command = bridge.handle_poll(&snapshot);
    debug!("Reply to {}: {:?}", snapshot.id, command);
    Ok(Json(command))
}

/// Serves the poll endpoint until the token is cancelled
pub async fn serve(bind: &str, bridge: Arc<Bridge>, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Listening for polls on {}", listener.local_addr()?);

    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::tests::RecordingBus;
    use crate::mqtt::message_manager::BusClient;
    use crate::mqtt::topics::TopicCodec;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn bridge() -> Arc<Bridge> {
        let bus: Arc<dyn BusClient> = Arc::new(RecordingBus::default());
        let bridge = Bridge::new(TopicCodec::new("energysmart", "homeassistant"), bus);
        bridge.begin_epoch();
        Arc::new(bridge)
    }

    fn poll_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(POLL_PATH)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(bridge: &Arc<Bridge>, body: &str) -> (StatusCode, String) {
        let response = router(Arc::clone(bridge))
            .oneshot(poll_request(body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn first_poll_gets_empty_command() {
        let bridge = bridge();
        let (status, body) = send(&bridge, "DeviceText=ABCDEF&Mode=Hybrid&SetPoint=120").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn queued_command_is_returned_in_reply() {
        let bridge = bridge();
        send(&bridge, "DeviceText=ABCDEF&SetPoint=120").await;
        bridge.handle_message("energysmart/ABCDEF/setpoint_command", b"130");

        let (status, body) = send(&bridge, "DeviceText=ABCDEF&SetPoint=120").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"SetPoint":"130"}"#);
    }

    #[tokio::test]
    async fn lowercase_id_is_normalized() {
        let bridge = bridge();
        let (status, _) = send(&bridge, "DeviceText=abcdef").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bridge.registry().len(), 1);

        bridge.handle_message("energysmart/ABCDEF/updaterate_command", b"60");
        let (_, body) = send(&bridge, "DeviceText=ABCDEF").await;
        assert_eq!(body, r#"{"UpdateRate":"60"}"#);
    }

    #[tokio::test]
    async fn malformed_polls_are_rejected() {
        let bridge = bridge();
        for body in [
            "Mode=Hybrid",
            "DeviceText=not-hex",
            "DeviceText=ABCDEF&SetPoint=hot",
        ] {
            let (status, _) = send(&bridge, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        }
        assert!(bridge.registry().is_empty());
    }

    #[tokio::test]
    async fn poll_without_content_type_is_accepted() {
        let bridge = bridge();
        for content_type in [None, Some("text/plain")] {
            let mut request = Request::builder().method("POST").uri(POLL_PATH);
            if let Some(content_type) = content_type {
                request = request.header(header::CONTENT_TYPE, content_type);
            }
            let request = request
                .body(Body::from("DeviceText=ABCDEF&Mode=Hybrid"))
                .unwrap();
            let response = router(Arc::clone(&bridge)).oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{content_type:?}");
        }
        assert_eq!(bridge.registry().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_body_is_rejected() {
        let bridge = bridge();
        let (status, _) = send(&bridge, "DeviceText=ABCDEF&DeviceText=123456").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(bridge.registry().is_empty());
    }

    #[tokio::test]
    async fn other_paths_are_not_served() {
        let response = router(bridge())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/postAll.php")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
