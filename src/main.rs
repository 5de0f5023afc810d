//! Firetrack
//!
//! Situational-awareness dashboard service: keeps a live, merged view of
//! firefighter positions, vitals, beacons and alerts polled from the
//! tracking backend, and serves it to operator dashboards over REST and
//! WebSocket.

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod alerts;
mod client;
mod config;
mod coords;
mod error;
mod handlers;
mod models;
mod scheduler;
mod state;
mod store;
mod validation;
mod views;
mod websocket;

use crate::client::BackendClient;
use crate::config::Settings;
use crate::scheduler::PollScheduler;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenv::dotenv().ok();

    // Logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,firetrack=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json())
        .init();

    // Load configuration
    let settings = Settings::from_env().context("Failed to load configuration")?;
    let bind_address = format!("{}:{}", settings.server.host, settings.server.port);

    info!("Starting firetrack dashboard service");
    info!(backend = %settings.backend.base_url, "Binding server to {}", bind_address);

    let client = BackendClient::new(&settings.backend.base_url, settings.backend.timeout())
        .context("Failed to build backend client")?;

    // Shared application state
    let app_state = Arc::new(RwLock::new(AppState::new(&settings.speech)));

    // ---------------------------------------------------------------------
    // Background polling
    // Tasks run on the actix runtime; the handle stops them on shutdown.
    // ---------------------------------------------------------------------
    let poller = PollScheduler::new(
        Arc::new(client.clone()),
        app_state.clone(),
        settings.polling.clone(),
    )
    .start();

    // ---------------------------------------------------------------------
    // HTTP + WebSocket server
    // ---------------------------------------------------------------------
    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .expose_headers(vec![actix_web::http::header::CONTENT_DISPOSITION])
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::Data::new(client.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure_routes)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?
    .run();

    let result = server.await;

    info!("Server stopped, shutting down pollers");
    poller.shutdown().await;

    result.context("HTTP server failed")
}
