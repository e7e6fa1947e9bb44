//! Group scan session models and the session state machine.
//!
//! A group scan session is a bounded occasion in which one scanner records
//! multiple participants toward a quorum-gated one-time claim. The state
//! machine has exactly two states: `active` (initial) and `completed`
//! (terminal). Legality of transitions is decided centrally by
//! [`SessionStatus`] rather than by status-string comparisons at call sites.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::profile::ProfileSummary;

/// Enumerated session state.
///
/// Monotonic: `Active` → `Completed`, never reversed, never skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    /// Parse the database representation.
    ///
    /// An unknown value means the row was written by something other than
    /// this service, which is an internal error, not caller input.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(AppError::Internal(format!(
                "unknown session status in store: {other}"
            ))),
        }
    }

    /// Database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    /// Reject any operation that requires the session to still accept scans
    /// or claims.
    pub fn ensure_active(&self) -> Result<(), AppError> {
        match self {
            SessionStatus::Active => Ok(()),
            SessionStatus::Completed => Err(AppError::SessionCompleted),
        }
    }

    /// Validate a state transition, returning the new state.
    ///
    /// The only legal transition is `Active` → `Completed`.
    pub fn transition_to(self, next: SessionStatus) -> Result<SessionStatus, AppError> {
        match (self, next) {
            (SessionStatus::Active, SessionStatus::Completed) => Ok(SessionStatus::Completed),
            _ => Err(AppError::SessionCompleted),
        }
    }
}

/// Scan purpose reference data (e.g., "break", "lunch").
///
/// # Database Table
///
/// Maps to the `scan_purposes` table. Purposes are organization-scoped and
/// read-only input to session creation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ScanPurpose {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub sort_order: i32,
}

/// Represents a group scan session record from the database.
#[derive(Debug, Clone, FromRow)]
pub struct GroupScanSession {
    pub id: Uuid,
    pub scanner_id: Uuid,
    pub organization_id: Uuid,
    pub purpose_id: Uuid,

    /// Raw status column; parse with [`GroupScanSession::status`]
    pub status: String,

    pub created_at: DateTime<Utc>,
}

impl GroupScanSession {
    /// Parsed session state.
    pub fn status(&self) -> Result<SessionStatus, AppError> {
        SessionStatus::parse(&self.status)
    }
}

/// One participant scan within a session.
///
/// Duplicates (same profile scanned twice) are allowed and kept; quorum is
/// computed over distinct profiles, so they never count twice.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GroupScanRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub profile_id: Uuid,
    pub scanned_at: DateTime<Utc>,
}

/// The one-time claim event that completes a session.
///
/// The UNIQUE constraint on `session_id` makes a lost claim race a
/// detectable conflict instead of a duplicate grant.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ItemClaimRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub claimed_at: DateTime<Utc>,
}

/// Request body for creating a group scan session.
///
/// # JSON Example
///
/// ```json
/// {
///   "purpose_id": "880e8400-e29b-41d4-a716-446655440003"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub purpose_id: Uuid,
}

/// Session header returned from create/fetch endpoints.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub status: SessionStatus,
    pub purpose: ScanPurpose,
    pub created_at: DateTime<Utc>,
}

/// Participant entry in the session detail view, ordered by scan time.
#[derive(Debug, Serialize)]
pub struct SessionRecordView {
    pub id: Uuid,
    pub profile: ProfileSummary,
    pub scanned_at: DateTime<Utc>,
}

/// Full session projection: header, ordered records, claim if any.
///
/// # JSON Example
///
/// ```json
/// {
///   "session": { "id": "…", "status": "completed", "purpose": { … }, "created_at": "…" },
///   "records": [ { "id": "…", "profile": { … }, "scanned_at": "…" } ],
///   "claim": { "id": "…", "session_id": "…", "claimed_at": "…" }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub session: SessionSummary,
    pub records: Vec<SessionRecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim: Option<ItemClaimRecord>,
}

/// Response body for a scan recorded into a session.
#[derive(Debug, Serialize)]
pub struct SessionScanResponse {
    pub record: GroupScanRecord,
    pub profile: ProfileSummary,
}

/// Response body for a successful claim.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claim: ItemClaimRecord,
    pub status: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_statuses() {
        assert_eq!(SessionStatus::parse("active").unwrap(), SessionStatus::Active);
        assert_eq!(
            SessionStatus::parse("completed").unwrap(),
            SessionStatus::Completed
        );
    }

    #[test]
    fn rejects_unknown_status_as_internal() {
        let err = SessionStatus::parse("archived").unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[test]
    fn active_to_completed_is_the_only_transition() {
        assert_eq!(
            SessionStatus::Active
                .transition_to(SessionStatus::Completed)
                .unwrap(),
            SessionStatus::Completed
        );
        assert!(
            SessionStatus::Completed
                .transition_to(SessionStatus::Completed)
                .is_err()
        );
        assert!(
            SessionStatus::Completed
                .transition_to(SessionStatus::Active)
                .is_err()
        );
        assert!(
            SessionStatus::Active
                .transition_to(SessionStatus::Active)
                .is_err()
        );
    }

    #[test]
    fn completed_sessions_reject_scans() {
        assert!(SessionStatus::Active.ensure_active().is_ok());
        assert!(matches!(
            SessionStatus::Completed.ensure_active(),
            Err(AppError::SessionCompleted)
        ));
    }

    #[test]
    fn round_trips_db_representation() {
        for status in [SessionStatus::Active, SessionStatus::Completed] {
            assert_eq!(SessionStatus::parse(status.as_str()).unwrap(), status);
        }
    }
}
