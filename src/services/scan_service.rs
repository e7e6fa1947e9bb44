//! Scan ingestion service - validate a payload and append to the ledger.
//!
//! Every validated scan appends exactly one `qr_usage_records` row tagged
//! with the scanning device, source IP, and user agent. The operation is
//! side-effecting and deliberately not idempotent: rapid repeats of the same
//! code are distinct physical events and each gets its own audit row.
//!
//! A ledger-append failure fails the whole request. An audit gap reported as
//! an error is preferred over a scan reported as successful but unrecorded.

use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{profile::ProfileSummary, qr_code::QrUsageRecord},
    services::qr_service::QrService,
};

/// Request-scoped metadata recorded with every scan.
#[derive(Debug, Clone)]
pub struct ScanContext {
    /// Scanner row id (from the verified session token)
    pub scanner_id: Uuid,
    /// The scanner's organization; badges from any other organization are
    /// rejected before anything is recorded
    pub organization_id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Outcome of a validated, recorded scan.
#[derive(Debug)]
pub struct ScanOutcome {
    pub profile: ProfileSummary,
    pub usage: QrUsageRecord,
}

/// Validate a scanned payload, resolve the profile, and append a usage
/// record.
///
/// # Errors
///
/// - Resolution errors (`InvalidRequest`, `UnknownQrCode`, `ExpiredQrCode`)
///   propagate unchanged and append nothing
/// - A badge from another organization is rejected as `UnknownQrCode`
///   before anything is recorded
/// - A ledger insert failure is fatal for the request
pub async fn ingest(
    pool: &DbPool,
    qr: &QrService,
    payload: &str,
    ctx: &ScanContext,
) -> Result<ScanOutcome, AppError> {
    let (code, profile) = qr.validate_and_resolve(payload).await?;
    ensure_same_organization(&profile, ctx.organization_id)?;

    let usage = append_usage_record(pool, code.id, ctx).await?;

    Ok(ScanOutcome { profile, usage })
}

/// Reject a badge that belongs to a different organization than the
/// scanning device.
///
/// Surfaces as `UnknownQrCode`: to a scanner in organization X, a code from
/// organization Y is indistinguishable from one that was never issued, the
/// same convention resource lookups use to avoid leaking existence.
pub fn ensure_same_organization(
    profile: &ProfileSummary,
    organization_id: Uuid,
) -> Result<(), AppError> {
    if profile.organization.id != organization_id {
        return Err(AppError::UnknownQrCode);
    }
    Ok(())
}

/// Append one row to the audit ledger.
///
/// Also used by the group-scan path, inside its own transaction via
/// [`append_usage_record_tx`].
pub async fn append_usage_record(
    pool: &DbPool,
    qr_code_id: Uuid,
    ctx: &ScanContext,
) -> Result<QrUsageRecord, AppError> {
    let usage = sqlx::query_as::<_, QrUsageRecord>(
        r#"
        INSERT INTO qr_usage_records (qr_code_id, scanner_id, ip_address, user_agent)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(qr_code_id)
    .bind(ctx.scanner_id)
    .bind(&ctx.ip_address)
    .bind(&ctx.user_agent)
    .fetch_one(pool)
    .await?;

    Ok(usage)
}

/// Transaction-scoped variant of [`append_usage_record`], so the group-scan
/// path can commit the usage row and the participant row as one unit.
pub async fn append_usage_record_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    qr_code_id: Uuid,
    ctx: &ScanContext,
) -> Result<QrUsageRecord, AppError> {
    let usage = sqlx::query_as::<_, QrUsageRecord>(
        r#"
        INSERT INTO qr_usage_records (qr_code_id, scanner_id, ip_address, user_agent)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(qr_code_id)
    .bind(ctx.scanner_id)
    .bind(&ctx.ip_address)
    .bind(&ctx.user_agent)
    .fetch_one(&mut **tx)
    .await?;

    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::OrganizationRef;

    fn profile_in(organization_id: Uuid) -> ProfileSummary {
        ProfileSummary {
            id: Uuid::new_v4(),
            display_name: "Ada Lovelace".into(),
            organization: OrganizationRef {
                id: organization_id,
                name: "Acme".into(),
            },
            department: None,
        }
    }

    #[test]
    fn accepts_badge_from_own_organization() {
        let org = Uuid::new_v4();
        assert!(ensure_same_organization(&profile_in(org), org).is_ok());
    }

    #[test]
    fn foreign_badge_is_indistinguishable_from_unknown() {
        let profile = profile_in(Uuid::new_v4());
        assert!(matches!(
            ensure_same_organization(&profile, Uuid::new_v4()),
            Err(AppError::UnknownQrCode)
        ));
    }
}
