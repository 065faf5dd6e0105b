//! Image-Vault
//!
//! Image asset management API using Rust + Actix-Web. Uploads go to S3
//! object storage, metadata lives in PostgreSQL, and a consistency
//! coordinator keeps the two aligned across partial failures.

use actix_web::{web, App, HttpServer, middleware};
use tracing::info;
use tracing_actix_web::TracingLogger;
use std::sync::Arc;
use std::time::Duration;

mod api;
mod assets;
mod config;
mod db;
mod storage;

use crate::assets::{AssetCoordinator, CoordinatorOptions};
use crate::config::Settings;
use crate::db::{DbPool, PgImageRepository};
use crate::storage::S3Store;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub coordinator: Arc<AssetCoordinator>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("image_vault=info".parse().unwrap())
                .add_directive("actix_web=info".parse().unwrap())
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load().expect("Failed to load configuration");
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Image-Vault v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    // Object storage client
    let store = S3Store::new(&settings.storage)
        .await
        .expect("Failed to create S3 client");
    info!(bucket = %store.bucket(), "Object storage client initialized");

    // Database pool; the metadata store is a required collaborator
    let pool = DbPool::new(&settings.database.url).expect("Failed to create database pool");
    pool.test_connection()
        .await
        .expect("Database connection test failed");

    let repository = PgImageRepository::new(pool);

    // Coordinator over the two collaborators
    let coordinator = Arc::new(AssetCoordinator::new(
        Arc::new(store),
        Arc::new(repository),
        CoordinatorOptions {
            strict_errors: settings.behavior.strict_errors,
            presign_expiry: Duration::from_secs(settings.storage.presign_expiry_secs),
        },
    ));

    let workers = settings
        .server
        .workers
        .unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        settings: settings.clone(),
        coordinator,
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "image-vault"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION")))
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers) // 2 workers per CPU for async I/O
    .bind(&bind_addr)?
    .run()
    .await
}
