mod api;
mod error;
mod settings;

use api::create_router;
use demo_dash_core::{ConfigStore, DashboardState};
use error::AppError;
use log::{error, info, warn};
use settings::ServerSettings;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    env_logger::init();
    println!(
        "demo_dash starting (pid {}), RUST_LOG={:?}",
        std::process::id(),
        std::env::var("RUST_LOG").ok()
    );

    let server = ServerSettings::load()?;
    let store = ConfigStore::load(&server.config_path).await?;
    let settings = store.snapshot().await;
    println!("Config file: {}", server.config_path);
    match settings.rpc_endpoint() {
        Some(url) => println!("RPC URL loaded: {}", url),
        None => println!("RPC URL not set; /test_rpc will report an error"),
    }
    if !settings.demo_mode {
        warn!("DEMO_MODE is off but all trading is simulated");
    }

    let state = Arc::new(DashboardState::new(store, server.rpc_timeout()).await?);
    let router = create_router(state.clone());

    let bind_addr = server.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind dashboard to {}: {}", bind_addr, e);
            return Err(e.into());
        }
    };
    info!("Dashboard listening on http://{}", bind_addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.shutdown().await;
    info!("Background loops stopped");
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
