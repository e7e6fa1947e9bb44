//! Presence/QR-Scan Service - Main Application Entry Point
//!
//! This is a REST API server for the presence/QR-scan engine of an
//! organization-management system: scanner device sessions, per-profile QR
//! codes, an append-only scan ledger, and quorum-gated group scan sessions.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: stateless signed scanner session tokens (JWT)
//! - **Format**: JSON requests/responses
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool
//! 3. Run database migrations
//! 4. Build the blob-store client and QR registry
//! 5. Build HTTP router with routes and middleware
//! 6. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod services;
mod state;

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::{blob_store::BlobStoreClient, qr_service::QrService};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Configuration loaded");

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    // QR registry with its in-process coalescing map, plus the blob-store
    // client it renders images through
    let blob_store = BlobStoreClient::new(&config.blob_store_url)
        .map_err(|e| anyhow::anyhow!("blob store configuration: {e}"))?;
    let qr = QrService::new(pool.clone(), blob_store);

    let server_port = config.server_port;
    let state = AppState::new(pool, config, qr);

    // Create scanner-token protected routes
    let protected_routes = Router::new()
        // Session check
        .route(
            "/api/v1/scanners/session",
            get(handlers::scanners::check_session),
        )
        // Plain profile-lookup scan
        .route("/api/v1/qr-codes/scan", post(handlers::qr_codes::scan))
        // Group scan sessions
        .route(
            "/api/v1/scan-purposes",
            get(handlers::group_scans::list_purposes),
        )
        .route(
            "/api/v1/group-scans",
            post(handlers::group_scans::create_session),
        )
        .route(
            "/api/v1/group-scans/{id}",
            get(handlers::group_scans::get_session),
        )
        .route(
            "/api/v1/group-scans/{id}/scan",
            post(handlers::group_scans::session_scan),
        )
        .route(
            "/api/v1/group-scans/{id}/claim",
            post(handlers::group_scans::claim_item),
        )
        // Apply authentication middleware to all routes in this group
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ));

    // Combine protected routes with public routes
    let app = Router::new()
        // Public routes (no scanner token required)
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/scanners/authenticate",
            post(handlers::scanners::authenticate),
        )
        // Profile owners generate their code through the org app's gateway,
        // not with a scanner token
        .route(
            "/api/v1/profiles/{id}/qr-code",
            post(handlers::profiles::generate_qr_code),
        )
        // Merge protected routes
        .merge(protected_routes)
        // Kiosk UIs are served from a different origin
        .layer(CorsLayer::permissive())
        // Add distributed tracing middleware for observability
        .layer(TraceLayer::new_for_http())
        // Share state with all handlers via State extraction
        .with_state(state);

    // Bind to network address and start server
    let addr = format!("0.0.0.0:{server_port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start serving HTTP requests. ConnectInfo gives handlers the peer
    // address for the scan audit trail.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
