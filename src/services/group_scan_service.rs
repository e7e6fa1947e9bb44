//! Group scan session engine - the quorum-gated claim state machine.
//!
//! A session is opened by a scanner against an organization-scoped purpose,
//! collects participant scans while `active`, and is completed exactly once
//! by a successful item claim. The claim requires at least two *distinct*
//! participants: repeat scans of one badge never inflate the count, because
//! the gate exists to prove genuine co-presence.
//!
//! # Claim atomicity
//!
//! `claim_item` serializes against concurrent scans and claims for the same
//! session by locking the session row (`SELECT … FOR UPDATE`) and keeping
//! the quorum re-check, the claim insert, and the status flip in that same
//! transaction. The UNIQUE constraint on `item_claim_records.session_id` is
//! the backstop: a lost race becomes a detectable conflict, never a
//! duplicate grant. Claim insert and status transition commit together or
//! not at all.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
    db::{self, DbPool},
    error::AppError,
    models::{
        group_scan::{
            GroupScanRecord, GroupScanSession, ItemClaimRecord, ScanPurpose, SessionDetailResponse,
            SessionRecordView, SessionStatus, SessionSummary,
        },
        profile::{ProfileRow, ProfileSummary},
    },
    services::{
        qr_service::QrService,
        scan_service::{self, ScanContext},
    },
};

/// Minimum number of distinct participants before an item can be claimed.
const CLAIM_QUORUM: usize = 2;

/// Name of the UNIQUE constraint guarding one claim per session.
const CLAIM_CONSTRAINT: &str = "item_claim_records_session_id_key";

/// Active scan purposes for an organization, in display order.
pub async fn list_purposes(
    pool: &DbPool,
    organization_id: Uuid,
) -> Result<Vec<ScanPurpose>, AppError> {
    let purposes = sqlx::query_as::<_, ScanPurpose>(
        r#"
        SELECT * FROM scan_purposes
        WHERE organization_id = $1 AND is_active = true
        ORDER BY sort_order, name
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(purposes)
}

/// Open a new session in the `active` state.
///
/// # Guards
///
/// The purpose must exist, be active, and belong to the scanner's
/// organization; all three failures surface as `InvalidPurpose` so callers
/// cannot probe other organizations' purpose ids.
pub async fn create_session(
    pool: &DbPool,
    scanner_id: Uuid,
    organization_id: Uuid,
    purpose_id: Uuid,
) -> Result<(GroupScanSession, ScanPurpose), AppError> {
    let purpose = sqlx::query_as::<_, ScanPurpose>("SELECT * FROM scan_purposes WHERE id = $1")
        .bind(purpose_id)
        .fetch_optional(pool)
        .await?
        .filter(|p| p.is_active && p.organization_id == organization_id)
        .ok_or(AppError::InvalidPurpose)?;

    let session = sqlx::query_as::<_, GroupScanSession>(
        r#"
        INSERT INTO group_scan_sessions (scanner_id, organization_id, purpose_id, status)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(scanner_id)
    .bind(organization_id)
    .bind(purpose_id)
    .bind(SessionStatus::Active.as_str())
    .fetch_one(pool)
    .await?;

    Ok((session, purpose))
}

/// Record a participant scan into an active session.
///
/// Appends a usage-ledger row AND a group scan record in one transaction,
/// with the session row locked so a concurrent claim cannot complete the
/// session halfway through. Duplicate profiles are allowed and kept.
///
/// On a completed session, nothing is appended: the scan is rejected before
/// it is recorded anywhere. A badge from another organization is rejected
/// as `UnknownQrCode` the same way, so foreign profiles can never be
/// scanned into a session or counted toward its quorum.
pub async fn record_scan(
    pool: &DbPool,
    qr: &QrService,
    session_id: Uuid,
    organization_id: Uuid,
    payload: &str,
    ctx: &ScanContext,
) -> Result<(GroupScanRecord, ProfileSummary), AppError> {
    // Resolve first; a bad payload should not open a transaction
    let (code, profile) = qr.validate_and_resolve(payload).await?;
    scan_service::ensure_same_organization(&profile, organization_id)?;

    let mut tx = pool.begin().await?;

    let session = lock_session(&mut tx, session_id, organization_id).await?;
    session.status()?.ensure_active()?;

    scan_service::append_usage_record_tx(&mut tx, code.id, ctx).await?;

    let record = sqlx::query_as::<_, GroupScanRecord>(
        r#"
        INSERT INTO group_scan_records (session_id, profile_id)
        VALUES ($1, $2)
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(profile.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok((record, profile))
}

/// Claim the session's item, completing the session.
///
/// # Process
///
/// 1. Lock the session row (serializes against scans and other claims)
/// 2. Re-check the session is still active
/// 3. Re-count distinct participants; require the quorum
/// 4. Insert the claim and flip the status to completed, in the same
///    transaction
///
/// # Errors
///
/// - `SessionNotFound`: absent or cross-organization
/// - `SessionCompleted`: already claimed (including a lost race, which is
///   re-checked once before the conflict is surfaced)
/// - `QuorumNotMet`: fewer than two distinct participants scanned
pub async fn claim_item(
    pool: &DbPool,
    session_id: Uuid,
    organization_id: Uuid,
) -> Result<(ItemClaimRecord, SessionStatus), AppError> {
    let mut tx = pool.begin().await?;

    let session = lock_session(&mut tx, session_id, organization_id).await?;
    let status = session.status()?;
    status.ensure_active()?;

    let participants: Vec<Uuid> =
        sqlx::query_scalar("SELECT profile_id FROM group_scan_records WHERE session_id = $1")
            .bind(session_id)
            .fetch_all(&mut *tx)
            .await?;

    let distinct = distinct_participants(&participants);
    if distinct < CLAIM_QUORUM {
        tx.rollback().await?;
        return Err(AppError::QuorumNotMet(distinct as i64));
    }

    let inserted = sqlx::query_as::<_, ItemClaimRecord>(
        r#"
        INSERT INTO item_claim_records (session_id)
        VALUES ($1)
        RETURNING *
        "#,
    )
    .bind(session_id)
    .fetch_one(&mut *tx)
    .await;

    match inserted {
        Ok(claim) => {
            let next = status.transition_to(SessionStatus::Completed)?;
            sqlx::query("UPDATE group_scan_sessions SET status = $1 WHERE id = $2")
                .bind(next.as_str())
                .bind(session_id)
                .execute(&mut *tx)
                .await?;

            // Claim insert and status flip commit as one unit
            tx.commit().await?;

            Ok((claim, next))
        }
        Err(err) if db::is_unique_violation(&err, CLAIM_CONSTRAINT) => {
            // Lost the claim race. Re-check state once before surfacing the
            // conflict, so the caller gets an accurate reason.
            tx.rollback().await?;

            let already_claimed: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM item_claim_records WHERE session_id = $1)",
            )
            .bind(session_id)
            .fetch_one(pool)
            .await?;

            if !already_claimed {
                tracing::warn!(
                    "claim race on session {session_id}: unique violation but no claim row found"
                );
            }

            Err(AppError::SessionCompleted)
        }
        Err(err) => Err(err.into()),
    }
}

/// Read-only projection: session header, ordered records, claim if any.
///
/// Records are ordered by `scanned_at`, not insertion order; under
/// concurrency the two can differ and the timestamp is what callers get.
pub async fn fetch_session(
    pool: &DbPool,
    session_id: Uuid,
    organization_id: Uuid,
) -> Result<SessionDetailResponse, AppError> {
    let session = sqlx::query_as::<_, GroupScanSession>(
        "SELECT * FROM group_scan_sessions WHERE id = $1 AND organization_id = $2",
    )
    .bind(session_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::SessionNotFound)?;

    let status = session.status()?;

    let purpose = sqlx::query_as::<_, ScanPurpose>("SELECT * FROM scan_purposes WHERE id = $1")
        .bind(session.purpose_id)
        .fetch_one(pool)
        .await?;

    let records = sqlx::query_as::<_, SessionRecordRow>(
        r#"
        SELECT r.id AS record_id, r.scanned_at,
               p.id, p.display_name,
               o.id AS organization_id, o.name AS organization_name,
               d.id AS department_id, d.name AS department_name
        FROM group_scan_records r
        JOIN profiles p ON p.id = r.profile_id
        JOIN organizations o ON o.id = p.organization_id
        LEFT JOIN departments d ON d.id = p.department_id
        WHERE r.session_id = $1
        ORDER BY r.scanned_at
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    let claim = sqlx::query_as::<_, ItemClaimRecord>(
        "SELECT * FROM item_claim_records WHERE session_id = $1",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(SessionDetailResponse {
        session: SessionSummary {
            id: session.id,
            status,
            purpose,
            created_at: session.created_at,
        },
        records: records.into_iter().map(SessionRecordView::from).collect(),
        claim,
    })
}

/// Number of distinct profiles among a session's scan records.
///
/// Quorum is computed over participant identity, not scan count: {A, A, B}
/// counts as 2, {A} as 1.
fn distinct_participants(profile_ids: &[Uuid]) -> usize {
    profile_ids.iter().collect::<HashSet<_>>().len()
}

/// Lock the session row for the duration of the transaction.
///
/// Organization-scoped: a session belonging to another organization is
/// indistinguishable from an absent one.
async fn lock_session(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    session_id: Uuid,
    organization_id: Uuid,
) -> Result<GroupScanSession, AppError> {
    sqlx::query_as::<_, GroupScanSession>(
        "SELECT * FROM group_scan_sessions WHERE id = $1 AND organization_id = $2 FOR UPDATE",
    )
    .bind(session_id)
    .bind(organization_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(AppError::SessionNotFound)
}

/// Flat row for the session-detail record join.
#[derive(Debug, sqlx::FromRow)]
struct SessionRecordRow {
    record_id: Uuid,
    scanned_at: chrono::DateTime<chrono::Utc>,
    id: Uuid,
    display_name: String,
    organization_id: Uuid,
    organization_name: String,
    department_id: Option<Uuid>,
    department_name: Option<String>,
}

impl From<SessionRecordRow> for SessionRecordView {
    fn from(row: SessionRecordRow) -> Self {
        let profile = ProfileRow {
            id: row.id,
            display_name: row.display_name,
            organization_id: row.organization_id,
            organization_name: row.organization_name,
            department_id: row.department_id,
            department_name: row.department_name,
        };

        Self {
            id: row.record_id,
            profile: profile.into(),
            scanned_at: row.scanned_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_scans_of_one_badge_count_once() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        // {A, A, B}: quorum met
        assert_eq!(distinct_participants(&[a, a, b]), 2);
        // {A}: quorum not met
        assert_eq!(distinct_participants(&[a]), 1);
        assert_eq!(distinct_participants(&[a, a, a]), 1);
        assert_eq!(distinct_participants(&[]), 0);
    }

    #[test]
    fn quorum_threshold_is_two() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert!(distinct_participants(&[a, a, b]) >= CLAIM_QUORUM);
        assert!(distinct_participants(&[a, a, a]) < CLAIM_QUORUM);
    }
}
