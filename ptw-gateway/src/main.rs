//! Entry point for the `ptw-gateway` HTTP server.

use std::{net::SocketAddr, sync::Arc};

use ptw_gateway::{
    config::{GatewayConfig, API_PREFIX},
    routes::{create_router, Gateway},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let gateway = match Gateway::from_config(&config) {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise gateway");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %config.listen_addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    info!(addr = %config.listen_addr, "ptw-gateway listening");
    info!(dist = %gateway.static_root().root().display(), "serving static root");
    info!(prefix = API_PREFIX, backend = %gateway.proxy().target(), "proxying api traffic");

    let app = create_router(Arc::new(gateway));
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
