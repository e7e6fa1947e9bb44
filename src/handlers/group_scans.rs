//! Group scan session HTTP handlers.
//!
//! This module implements the session endpoints:
//! - GET /api/v1/scan-purposes - Purposes available to the scanner's org
//! - POST /api/v1/group-scans - Open a session
//! - GET /api/v1/group-scans/{id} - Session detail projection
//! - POST /api/v1/group-scans/{id}/scan - Record a participant
//! - POST /api/v1/group-scans/{id}/claim - Claim the item, completing it

use std::net::SocketAddr;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::scan_context,
    middleware::auth::ScannerContext,
    models::group_scan::{
        ClaimResponse, CreateSessionRequest, ScanPurpose, SessionDetailResponse,
        SessionScanResponse, SessionStatus, SessionSummary,
    },
    models::qr_code::ScanRequest,
    services::group_scan_service,
    state::AppState,
};

/// List active scan purposes for the scanner's organization.
///
/// Reference data, ordered by `sort_order` then name; input to session
/// creation.
pub async fn list_purposes(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
) -> Result<Json<Vec<ScanPurpose>>, AppError> {
    let purposes =
        group_scan_service::list_purposes(&state.pool, scanner.organization_id).await?;

    Ok(Json(purposes))
}

/// Open a new group scan session.
///
/// # Request Body
///
/// ```json
/// {
///   "purpose_id": "880e8400-e29b-41d4-a716-446655440003"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "id": "990e8400-…",
///   "status": "active",
///   "purpose": { "id": "…", "name": "break", "description": null },
///   "created_at": "2025-06-01T10:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - **400 invalid_purpose**: purpose missing, inactive, or owned by another
///   organization (all indistinguishable by design)
pub async fn create_session(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (session, purpose) = group_scan_service::create_session(
        &state.pool,
        scanner.scanner_uuid,
        scanner.organization_id,
        request.purpose_id,
    )
    .await?;

    tracing::info!(
        "scanner {} opened group scan session {} for purpose '{}'",
        scanner.scanner_id,
        session.id,
        purpose.name
    );

    let summary = SessionSummary {
        id: session.id,
        status: session.status()?,
        purpose,
        created_at: session.created_at,
    };

    Ok((StatusCode::CREATED, Json(summary)))
}

/// Fetch the session detail projection.
///
/// Records are ordered by scan timestamp; `claim` is present once the
/// session has been completed.
pub async fn get_session(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetailResponse>, AppError> {
    let detail =
        group_scan_service::fetch_session(&state.pool, session_id, scanner.organization_id)
            .await?;

    Ok(Json(detail))
}

/// Record a participant scan into the session.
///
/// Appends both a usage-ledger row and a group scan record; duplicates of
/// the same profile are kept but never count twice toward the quorum.
///
/// # Errors
///
/// - **404 session_not_found**: absent or cross-organization session
/// - **409 session_completed**: the session was already claimed; nothing is
///   appended
/// - Payload errors as for the plain scan endpoint
pub async fn session_scan(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(session_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<ScanRequest>,
) -> Result<Json<SessionScanResponse>, AppError> {
    let ctx = scan_context(&scanner, &headers, peer);

    let (record, profile) = group_scan_service::record_scan(
        &state.pool,
        &state.qr,
        session_id,
        scanner.organization_id,
        &request.payload,
        &ctx,
    )
    .await?;

    Ok(Json(SessionScanResponse { record, profile }))
}

/// Claim the session's item.
///
/// Succeeds at most once per session: the claim insert and the transition
/// to `completed` commit as a single transaction, re-checking quorum and
/// claim absence under a row lock.
///
/// # Response (201)
///
/// ```json
/// {
///   "claim": { "id": "…", "session_id": "…", "claimed_at": "…" },
///   "status": "completed"
/// }
/// ```
///
/// # Errors
///
/// - **409 quorum_not_met**: fewer than 2 distinct participants; the
///   message names the current count so the UI can explain the rejection
/// - **409 session_completed**: already claimed (including lost races)
pub async fn claim_item(
    State(state): State<AppState>,
    Extension(scanner): Extension<ScannerContext>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (claim, status) =
        group_scan_service::claim_item(&state.pool, session_id, scanner.organization_id).await?;

    debug_assert_eq!(status, SessionStatus::Completed);
    tracing::info!(
        "scanner {} claimed item for session {}",
        scanner.scanner_id,
        session_id
    );

    Ok((StatusCode::CREATED, Json(ClaimResponse { claim, status })))
}
