use std::future::IntoFuture;
use std::sync::Arc;

use tracing::{error, info};

use topicast::broker::Broker;
use topicast::config::load_config;
use topicast::transport::http::build_router;
use topicast::utils::logging;

#[tokio::main]
async fn main() {
    logging::init("info");

    // Load configuration with robust error handling
    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Arc::new(Broker::new());
    let app = build_router(broker);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    info!("Starting pub/sub server on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!("HTTP API available at: http://{}", addr);

    // Run the server and listen for a shutdown signal
    tokio::select! {
        result = axum::serve(listener, app).into_future() => {
            if let Err(e) = result {
                error!("Server exited unexpectedly: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }
}
