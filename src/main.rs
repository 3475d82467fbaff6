//! Fleet Routing Uploads - Axum Server

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_routing_uploads::api::{create_router, AppState};
use fleet_routing_uploads::config::AppConfig;
use fleet_routing_uploads::console;
use fleet_routing_uploads::places::HttpPlaceLookup;
use fleet_routing_uploads::routing::HttpDistanceMatrix;
use fleet_routing_uploads::upload::UploadService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleet_routing_uploads=info".parse()?))
        .init();

    let config = AppConfig::load()?;
    info!(config = ?config, "Loaded configuration");
    console::print_banner();

    let distance_matrix = HttpDistanceMatrix::new(
        config.distance_matrix_url.clone(),
        config.distance_matrix_api_key(),
        config.distance_matrix_timeout(),
    )?;
    let places = HttpPlaceLookup::new(
        config.places_api_url.clone(),
        config.places_api_key(),
        config.places_timeout(),
    )?;
    let uploads = UploadService::new(
        Arc::new(distance_matrix),
        Arc::new(places),
        config.conversion_options(),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    console::print_server_started(
        addr,
        config.distance_matrix_api_key().is_some(),
        config.places_api_key().is_some(),
        config.max_upload_bytes,
    );

    let app = create_router(Arc::new(AppState::new(config, uploads)));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
