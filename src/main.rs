use color_eyre::{eyre::eyre, Result};
use energysmart_bridge::bridge::Bridge;
use energysmart_bridge::config::Config;
use energysmart_bridge::mqtt::mqtt_handler::{MqttHandle, MqttSession};
use energysmart_bridge::mqtt::topics::TopicCodec;
use energysmart_bridge::web;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = Config::load(config_path)
        .await
        .map_err(|e| eyre!("Failed to load config: {}", e))?;
    setup_logging_env(config.bridge.level());
    info!(
        "Starting bridge (http: {}, broker: {}:{}, prefix: {})",
        config.http.bind, config.mqtt.host, config.mqtt.port, config.mqtt.prefix
    );

    let shutdown = CancellationToken::new();

    // MQTT-Session und Bridge verbinden
    let codec = TopicCodec::new(config.mqtt.prefix.clone(), config.mqtt.discovery_prefix.clone());
    let session = MqttSession::create(&config.mqtt, codec.clone());
    let bridge = Arc::new(Bridge::new(codec, Arc::new(session.client())));

    let mut mqtt_handle = MqttHandle::start(
        session,
        Arc::clone(&bridge),
        shutdown.clone(),
        config.bridge.shutdown_timeout(),
    );

    let bind = config.http.bind.clone();
    let token = shutdown.clone();
    let mut server = tokio::spawn(async move { web::serve(&bind, bridge, token).await });

    // Auf Signal oder Serverende warten
    let finished = tokio::select! {
        _ = shutdown_signal() => None,
        result = &mut server => Some(result),
    };

    shutdown.cancel();
    mqtt_handle.shutdown().await;

    let result = match finished {
        Some(result) => result,
        None => server.await,
    };
    match result {
        Ok(Ok(())) => {
            info!("Shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("HTTP server failed: {}", e);
            Err(eyre!("HTTP server failed: {}", e))
        }
        Err(e) => Err(eyre!("HTTP server task panicked: {}", e)),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    Ok(())
}

fn setup_logging_env(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
