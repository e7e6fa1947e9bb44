//! Profile-facing QR code generation handler.
//!
//! This endpoint is called by a member displaying their own code, not by a
//! scanner device, so it sits outside the scanner-token route group. The
//! organization app's gateway is responsible for making sure a member only
//! reaches their own profile id.

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{error::AppError, models::qr_code::QrCodeResponse, state::AppState};

/// Get or create the profile's QR code.
///
/// # Endpoint
///
/// `POST /api/v1/profiles/{id}/qr-code`
///
/// # Semantics
///
/// - A live, non-expired code is returned as-is; repeated calls are cheap
/// - An expired (or absent) code triggers regeneration; the old row is
///   superseded, never deleted
/// - Concurrent calls for the same profile coalesce onto one creation
/// - `image_url` is null until the blob store has accepted the rendered
///   image; that is not an error and the next call retries the upload
///
/// # Response (200)
///
/// ```json
/// {
///   "qr_code_id": "770e8400-…",
///   "payload": "a1b2c3…",
///   "image_url": "https://blobs.example.com/qr-codes/770e8400….svg",
///   "expires_at": "2025-07-01T10:00:00Z",
///   "profile": { "id": "…", "display_name": "Ada Lovelace", "organization": { … } }
/// }
/// ```
///
/// # Errors
///
/// - **404 profile_not_found**: no such profile
pub async fn generate_qr_code(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<QrCodeResponse>, AppError> {
    let (code, profile) = state.qr.get_or_create(profile_id).await?;

    Ok(Json(QrCodeResponse {
        qr_code_id: code.id,
        payload: code.secret,
        image_url: code.image_url,
        expires_at: code.expires_at,
        profile,
    }))
}
