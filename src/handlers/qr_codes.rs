//! Scanner-facing scan endpoint.
//!
//! A plain scan (outside any group session) resolves the badge to a profile
//! for display and appends one row to the usage ledger. Nothing about the
//! call is idempotent: N scans of the same badge are N audit rows.

use std::net::SocketAddr;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, State},
    http::HeaderMap,
};

use crate::{
    error::AppError,
    handlers::scan_context,
    middleware::auth::ScannerContext,
    models::qr_code::{ScanRequest, ScanResponse},
    services::scan_service,
    state::AppState,
};

/// Scan a badge for profile lookup.
///
/// # Endpoint
///
/// `POST /api/v1/qr-codes/scan`
///
/// # Request Body
///
/// ```json
/// {
///   "payload": "a1b2c3d4e5f6…"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "profile": { "id": "…", "display_name": "Ada Lovelace", "organization": { … } }
/// }
/// ```
///
/// # Errors
///
/// - **400 invalid_request**: malformed payload (nothing is recorded)
/// - **404 unknown_qr_code**: payload matches no issued code
/// - **410 expired_qr_code**: code expired or was superseded
/// - **500 internal_error**: the ledger append failed; the scan is reported
///   as failed rather than silently unaudited
pub async fn scan(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>, AppError> {
    let ctx = scan_context(&scanner, &headers, peer);

    let outcome = scan_service::ingest(&state.pool, &state.qr, &request.payload, &ctx).await?;

    tracing::debug!(
        "scanner {} scanned profile {} (usage record {})",
        scanner.scanner_id,
        outcome.profile.id,
        outcome.usage.id
    );

    Ok(Json(ScanResponse {
        profile: outcome.profile,
    }))
}
