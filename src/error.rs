//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code string.
///
/// # Error Categories
///
/// - **Authentication**: bad scanner credentials, disabled device, bad token
/// - **Not Found**: profile/session/purpose/code absent (or outside the
///   caller's organization, deliberately indistinguishable)
/// - **Conflict**: duplicate claim, quorum not met, completed session
/// - **Validation**: malformed payload or request data
/// - **Internal**: storage or blob-store failure (details hidden from client)
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, query error).
    ///
    /// This wraps any sqlx::Error using the `#[from]` attribute, which
    /// automatically implements `From<sqlx::Error> for AppError`.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unknown scanner id or wrong password.
    ///
    /// The two cases are deliberately not distinguished to the caller, to
    /// avoid scanner-id enumeration. Returns HTTP 401 Unauthorized.
    #[error("Invalid scanner credentials")]
    InvalidCredentials,

    /// The scanner credential exists but has been disabled by an admin.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Scanner is disabled")]
    ScannerDisabled,

    /// Session token is missing, malformed, tampered with, or expired.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid or expired session token")]
    InvalidToken,

    /// Member profile does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Profile not found")]
    ProfileNotFound,

    /// QR payload does not match any issued code.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Unknown QR code")]
    UnknownQrCode,

    /// QR payload matched a code whose expiry has passed.
    ///
    /// Returns HTTP 410 Gone so scanner UIs can prompt for regeneration.
    #[error("QR code has expired")]
    ExpiredQrCode,

    /// Group scan session does not exist or belongs to another organization.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Group scan session not found")]
    SessionNotFound,

    /// Scan purpose is missing, inactive, or owned by another organization.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("Invalid scan purpose")]
    InvalidPurpose,

    /// The session has already been completed by a successful claim.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("Session is already completed")]
    SessionCompleted,

    /// Claim attempted before two distinct participants were scanned.
    ///
    /// Returns HTTP 409 Conflict. The message carries the distinct count so
    /// the UI can explain why the claim was rejected.
    #[error("Quorum not met: {0} distinct participant(s) scanned, at least 2 required")]
    QuorumNotMet(i64),

    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),

    /// Non-database internal failure (e.g., coalesced QR creation failed).
    ///
    /// Returns HTTP 500 Internal Server Error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convert AppError into an HTTP response.
///
/// This implementation allows Axum handlers to return `Result<T, AppError>`
/// and have errors automatically converted to proper HTTP responses.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Map each error variant to (HTTP status, error code, message)
        let (status, code, message) = match self {
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "invalid_credentials",
                self.to_string(),
            ),
            AppError::ScannerDisabled => (
                StatusCode::UNAUTHORIZED,
                "scanner_disabled",
                self.to_string(),
            ),
            AppError::InvalidToken => {
                (StatusCode::UNAUTHORIZED, "invalid_token", self.to_string())
            }
            AppError::ProfileNotFound => {
                (StatusCode::NOT_FOUND, "profile_not_found", self.to_string())
            }
            AppError::UnknownQrCode => {
                (StatusCode::NOT_FOUND, "unknown_qr_code", self.to_string())
            }
            AppError::ExpiredQrCode => (StatusCode::GONE, "expired_qr_code", self.to_string()),
            AppError::SessionNotFound => {
                (StatusCode::NOT_FOUND, "session_not_found", self.to_string())
            }
            AppError::InvalidPurpose => {
                (StatusCode::BAD_REQUEST, "invalid_purpose", self.to_string())
            }
            AppError::SessionCompleted => {
                (StatusCode::CONFLICT, "session_completed", self.to_string())
            }
            AppError::QuorumNotMet(_) => {
                (StatusCode::CONFLICT, "quorum_not_met", self.to_string())
            }
            AppError::InvalidRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }
            AppError::Database(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred".to_string(),
            ),
        };

        // Build JSON response body
        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        // Return the response with status code and JSON body
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn auth_errors_map_to_401() {
        assert_eq!(status_of(AppError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::ScannerDisabled), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn claim_conflicts_map_to_409() {
        assert_eq!(status_of(AppError::SessionCompleted), StatusCode::CONFLICT);
        assert_eq!(status_of(AppError::QuorumNotMet(1)), StatusCode::CONFLICT);
    }

    #[test]
    fn expired_code_maps_to_410_and_unknown_to_404() {
        assert_eq!(status_of(AppError::ExpiredQrCode), StatusCode::GONE);
        assert_eq!(status_of(AppError::UnknownQrCode), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal("secret detail".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn quorum_message_names_the_count() {
        let msg = AppError::QuorumNotMet(1).to_string();
        assert!(msg.contains("1 distinct participant"));
    }
}
