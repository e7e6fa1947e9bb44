//! Profile QR code and usage ledger models.
//!
//! Each profile has at most one live QR code at a time. A code carries an
//! opaque 64-hex-character secret which is the entire scannable payload;
//! validation is a store lookup, not signature verification. Regeneration
//! supersedes the old row instead of deleting it, so the usage ledger keeps
//! valid references forever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::profile::ProfileSummary;

/// Represents a QR code record from the database.
///
/// # Database Table
///
/// Maps to the `profile_qr_codes` table. The partial unique index
/// `profile_qr_codes_live_profile` (on `profile_id WHERE superseded_at IS
/// NULL`) is the store-level authority for the one-live-code-per-profile
/// invariant.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileQrCode {
    /// Unique identifier; also keys the rendered image in the blob store
    pub id: Uuid,

    /// Profile this code belongs to
    pub profile_id: Uuid,

    /// Opaque scannable payload (64 hex characters, 32 random bytes)
    pub secret: String,

    /// Public URL of the rendered image, once the blob store has accepted it
    ///
    /// NULL until the first successful upload; the next generate request
    /// retries the upload rather than failing code creation.
    pub image_url: Option<String>,

    /// Codes past this instant are rejected by scan validation
    pub expires_at: DateTime<Utc>,

    /// Set when a regenerated code replaces this one; never cleared
    pub superseded_at: Option<DateTime<Utc>>,

    /// Timestamp when this code was created
    pub created_at: DateTime<Utc>,
}

impl ProfileQrCode {
    /// Whether the code's expiry horizon has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// One scan event in the append-only audit ledger.
///
/// # Database Table
///
/// Maps to the `qr_usage_records` table. Rows are inserted on every
/// validated scan and never updated or deleted by this service.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QrUsageRecord {
    pub id: Uuid,
    pub qr_code_id: Uuid,
    pub scanner_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub scanned_at: DateTime<Utc>,
}

/// Response body for QR code generation.
///
/// # JSON Example
///
/// ```json
/// {
///   "qr_code_id": "770e8400-e29b-41d4-a716-446655440002",
///   "payload": "a1b2c3…",
///   "image_url": "https://blobs.example.com/qr-codes/770e8400….svg",
///   "expires_at": "2025-07-01T10:00:00Z",
///   "profile": { "id": "…", "display_name": "Ada Lovelace", "organization": { … } }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct QrCodeResponse {
    pub qr_code_id: Uuid,

    /// The scannable payload, for clients that render the code themselves
    pub payload: String,

    /// NULL when the image has not been rendered yet (not an error)
    pub image_url: Option<String>,

    pub expires_at: DateTime<Utc>,
    pub profile: ProfileSummary,
}

/// Request body for scan endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "payload": "a1b2c3d4e5f6…"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// The opaque payload read from the QR image
    pub payload: String,
}

/// Response body for a plain profile-lookup scan.
#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub profile: ProfileSummary,
}
