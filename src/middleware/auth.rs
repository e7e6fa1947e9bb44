//! Scanner session-token authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the session token from the Authorization header
//! 2. Verify its signature and expiry (stateless, no database lookup)
//! 3. Inject the scanner's identity into the request
//! 4. Reject unauthorized requests with HTTP 401
//!
//! Because verification never touches the store, a scanner disabled after
//! authenticating keeps its already-issued sessions until they expire.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError, services::session_service, services::session_service::ScannerClaims,
    state::AppState,
};

/// Scanner identity attached to authenticated requests.
///
/// Inserted into the request's extension map; route handlers extract it
/// with `Extension<ScannerContext>` to know which device is calling.
#[derive(Debug, Clone)]
pub struct ScannerContext {
    /// Scanner row id
    pub scanner_uuid: Uuid,

    /// Human-readable device id (e.g., "front-desk-1")
    pub scanner_id: String,

    pub scanner_name: String,

    /// Used to scope every query: a scanner only ever sees its own
    /// organization's sessions, purposes, and profiles
    pub organization_id: Uuid,

    pub organization_name: String,

    /// Token expiry (unix seconds), echoed by the session-check endpoint
    pub expires_at: i64,
}

impl From<ScannerClaims> for ScannerContext {
    fn from(claims: ScannerClaims) -> Self {
        Self {
            scanner_uuid: claims.sub,
            scanner_id: claims.scanner_id,
            scanner_name: claims.scanner_name,
            organization_id: claims.organization_id,
            organization_name: claims.organization_name,
            expires_at: claims.exp,
        }
    }
}

/// Session-token authentication middleware function.
///
/// # Headers
///
/// Expected header format:
/// ```text
/// Authorization: Bearer <session token>
/// ```
///
/// # Returns
///
/// - `Ok(Response)` if the token verifies (calls next handler)
/// - `Err(AppError::InvalidToken)` otherwise (returns 401)
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::InvalidToken)?;

    // Signature + expiry check only; no store lookup
    let claims = session_service::verify_token(&state.config.token_secret, token)?;

    request
        .extensions_mut()
        .insert(ScannerContext::from(claims));

    Ok(next.run(request).await)
}
