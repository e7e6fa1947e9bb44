//! Scanner credential model and authentication request/response types.
//!
//! Scanners are physical or kiosk devices that authenticate once with a
//! scanner id and password, then carry a signed session token on every
//! subsequent call. Passwords are stored as SHA-256 hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::profile::OrganizationRef;

/// Represents a scanner credential record from the database.
///
/// # Database Table
///
/// Maps to the `scanners` table. Scanners are disabled (`is_active = false`)
/// rather than deleted, so historical usage records stay resolvable.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Scanner {
    /// Unique identifier for this scanner
    pub id: Uuid,

    /// Human-readable unique device id, entered at the kiosk login screen
    ///
    /// Example: "front-desk-1"
    pub scanner_id: String,

    /// Display name shown in UIs
    pub name: String,

    /// Organization this device belongs to
    pub organization_id: Uuid,

    /// SHA-256 hash of the device password (64 hex characters)
    pub password_hash: String,

    /// Whether this scanner may authenticate
    ///
    /// Disabling does not invalidate already-issued session tokens; those
    /// remain valid until they expire (stateless-token tradeoff).
    pub is_active: bool,

    /// Stamped on every successful authentication
    pub last_active_at: Option<DateTime<Utc>>,

    /// Timestamp when this scanner was registered
    pub created_at: DateTime<Utc>,
}

/// Request body for scanner authentication.
///
/// # JSON Example
///
/// ```json
/// {
///   "scanner_id": "front-desk-1",
///   "password": "hunter2"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct AuthenticateRequest {
    pub scanner_id: String,
    pub password: String,
}

/// Public scanner identity embedded in responses.
#[derive(Debug, Clone, Serialize)]
pub struct ScannerInfo {
    pub id: Uuid,
    pub scanner_id: String,
    pub name: String,
}

impl From<&Scanner> for ScannerInfo {
    fn from(scanner: &Scanner) -> Self {
        Self {
            id: scanner.id,
            scanner_id: scanner.scanner_id.clone(),
            name: scanner.name.clone(),
        }
    }
}

/// Response body for successful authentication.
///
/// # JSON Example
///
/// ```json
/// {
///   "token": "eyJhbGciOiJIUzI1NiJ9…",
///   "expires_at": "2025-06-02T10:00:00Z",
///   "scanner": { "id": "…", "scanner_id": "front-desk-1", "name": "Front desk" },
///   "organization": { "id": "…", "name": "Acme" }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AuthenticateResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub scanner: ScannerInfo,
    pub organization: OrganizationRef,
}

/// Response body for the session check endpoint.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub scanner: ScannerInfo,
    pub organization: OrganizationRef,
    /// When the presented token stops being accepted
    pub expires_at: DateTime<Utc>,
}
