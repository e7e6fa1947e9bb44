//! Scanner authentication HTTP handlers.
//!
//! This module implements the device-facing session endpoints:
//! - POST /api/v1/scanners/authenticate - Exchange credentials for a token
//! - GET /api/v1/scanners/session - Check the current token

use axum::{Extension, Json, extract::State};
use chrono::{TimeZone, Utc};

use crate::{
    error::AppError,
    middleware::auth::ScannerContext,
    models::{
        profile::OrganizationRef,
        scanner::{AuthenticateRequest, AuthenticateResponse, ScannerInfo, SessionResponse},
    },
    services::session_service,
    state::AppState,
};

/// Authenticate a scanner device.
///
/// # Request Body
///
/// ```json
/// {
///   "scanner_id": "front-desk-1",
///   "password": "hunter2"
/// }
/// ```
///
/// # Response (200)
///
/// ```json
/// {
///   "token": "eyJhbGciOiJIUzI1NiJ9…",
///   "expires_at": "2025-06-02T10:00:00Z",
///   "scanner": { "id": "…", "scanner_id": "front-desk-1", "name": "Front desk" },
///   "organization": { "id": "…", "name": "Acme" }
/// }
/// ```
///
/// # Errors
///
/// - **401 invalid_credentials**: unknown device id or wrong password
///   (deliberately indistinguishable)
/// - **401 scanner_disabled**: credentials correct but device disabled
pub async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, AppError> {
    let issued = session_service::authenticate(
        &state.pool,
        &state.config,
        &request.scanner_id,
        &request.password,
    )
    .await?;

    tracing::info!("scanner {} authenticated", issued.scanner.scanner_id);

    Ok(Json(AuthenticateResponse {
        token: issued.token,
        expires_at: issued.expires_at,
        scanner: ScannerInfo::from(&issued.scanner),
        organization: issued.organization,
    }))
}

/// Check the current session token.
///
/// Answers entirely from the verified token; no database lookup. A disabled
/// scanner therefore still passes this check until its token expires.
///
/// # Response (200)
///
/// ```json
/// {
///   "scanner": { "id": "…", "scanner_id": "front-desk-1", "name": "Front desk" },
///   "organization": { "id": "…", "name": "Acme" }
/// }
/// ```
pub async fn check_session(
    Extension(scanner): Extension<ScannerContext>,
) -> Result<Json<SessionResponse>, AppError> {
    // Middleware has already verified the token; just echo the claims
    let expires_at = Utc
        .timestamp_opt(scanner.expires_at, 0)
        .single()
        .ok_or(AppError::InvalidToken)?;

    Ok(Json(SessionResponse {
        expires_at,
        scanner: ScannerInfo {
            id: scanner.scanner_uuid,
            scanner_id: scanner.scanner_id,
            name: scanner.scanner_name,
        },
        organization: OrganizationRef {
            id: scanner.organization_id,
            name: scanner.organization_name,
        },
    }))
}
