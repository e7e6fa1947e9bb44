//! QR code registry - one live code per profile, with request coalescing.
//!
//! # Correctness vs optimization
//!
//! Two mechanisms guard the one-live-code-per-profile invariant:
//!
//! - The partial unique index `profile_qr_codes_live_profile` at the store
//!   level. This is the actual authority: a creation that loses the insert
//!   race gets a unique violation and falls back to re-reading the winner's
//!   row.
//! - An in-process map from profile id to the in-flight creation future.
//!   Concurrent requests for the same profile await a single shared future
//!   instead of racing duplicate inserts. This is a best-effort fast path
//!   only; it does nothing across deployment instances.
//!
//! Image rendering is delegated to the blob store and is best-effort: an
//! upload failure leaves `image_url` NULL and the next generate request
//! retries it. Code creation never fails because of the image.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, TryFutureExt};
use qrcode::QrCode;
use qrcode::render::svg;
use uuid::Uuid;

use crate::{
    db::DbPool,
    error::AppError,
    models::{
        profile::{ProfileRow, ProfileSummary},
        qr_code::ProfileQrCode,
    },
    services::blob_store::BlobStoreClient,
};

/// Validity horizon for freshly created codes.
const QR_CODE_VALIDITY_DAYS: i64 = 30;

/// Name of the partial unique index enforcing one live code per profile.
const LIVE_CODE_CONSTRAINT: &str = "profile_qr_codes_live_profile";

type SharedCreate<V> = Shared<BoxFuture<'static, Result<V, Arc<AppError>>>>;

/// In-process map of in-flight creations, keyed by profile id.
///
/// Owned by [`QrService`] and injected through application state; never a
/// module-level global, so tests can construct isolated instances. Entries
/// are removed once the shared future settles, on success and failure
/// alike. Never authoritative: the store's unique index is.
pub struct RequestCoalescer<V: Clone> {
    inflight: Mutex<HashMap<Uuid, SharedCreate<V>>>,
}

impl<V> RequestCoalescer<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Run `create` for `key`, joining an already-in-flight creation if one
    /// exists.
    ///
    /// The first caller for a key inserts the shared future and drives it;
    /// later callers for the same key clone and await the same future, so a
    /// single underlying creation is observed by all of them. Errors are
    /// shared too (as `Arc`), since every waiter asked for the same work.
    pub async fn run<F>(&self, key: Uuid, create: F) -> Result<V, Arc<AppError>>
    where
        F: Future<Output = Result<V, AppError>> + Send + 'static,
    {
        let fut = {
            let mut map = self
                .inflight
                .lock()
                .expect("coalescer mutex poisoned");
            match map.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let shared = create.map_err(Arc::new).boxed().shared();
                    map.insert(key, shared.clone());
                    shared
                }
            }
        };

        let result = fut.clone().await;

        // Settled: clear the entry so the next request starts fresh. Only
        // remove our own future; a newer in-flight creation for the same key
        // must not be evicted by a late waiter.
        let mut map = self
            .inflight
            .lock()
            .expect("coalescer mutex poisoned");
        if map.get(&key).is_some_and(|entry| entry.ptr_eq(&fut)) {
            map.remove(&key);
        }

        result
    }
}

/// QR code registry service.
///
/// Constructed once at startup and shared through application state.
pub struct QrService {
    pool: DbPool,
    blob_store: BlobStoreClient,
    coalescer: RequestCoalescer<ProfileQrCode>,
}

impl QrService {
    pub fn new(pool: DbPool, blob_store: BlobStoreClient) -> Self {
        Self {
            pool,
            blob_store,
            coalescer: RequestCoalescer::new(),
        }
    }

    /// Get the profile's live QR code, creating one if none exists or the
    /// existing one has expired.
    ///
    /// # Process
    ///
    /// 1. Resolve the profile (404 if absent)
    /// 2. Fast path: return the live, non-expired code if there is one
    /// 3. Otherwise run the (coalesced) create-or-replace
    /// 4. Best-effort: render and upload the image if not stored yet
    ///
    /// Returns the code together with the resolved profile summary.
    pub async fn get_or_create(
        &self,
        profile_id: Uuid,
    ) -> Result<(ProfileQrCode, ProfileSummary), AppError> {
        let profile: ProfileSummary = self.fetch_profile(profile_id).await?.into();

        let mut code = match self.find_live(profile_id).await? {
            Some(code) if !code.is_expired(Utc::now()) => code,
            _ => {
                let pool = self.pool.clone();
                self.coalescer
                    .run(profile_id, create_or_replace(pool, profile_id))
                    .await
                    .map_err(|e| {
                        AppError::Internal(format!("QR code creation failed: {e}"))
                    })?
            }
        };

        if code.image_url.is_none() {
            match self.render_and_store(&code).await {
                Ok(url) => code.image_url = Some(url),
                Err(e) => {
                    tracing::warn!("QR image upload failed for code {}: {e}", code.id);
                }
            }
        }

        Ok((code, profile))
    }

    /// Decode an opaque scanned payload and resolve the target profile.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest`: payload is not a well-formed secret
    /// - `UnknownQrCode`: no code was ever issued with this secret
    /// - `ExpiredQrCode`: the code expired or was superseded by regeneration
    pub async fn validate_and_resolve(
        &self,
        payload: &str,
    ) -> Result<(ProfileQrCode, ProfileSummary), AppError> {
        let secret = parse_payload(payload)?;

        let code = sqlx::query_as::<_, ProfileQrCode>(
            "SELECT * FROM profile_qr_codes WHERE secret = $1",
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::UnknownQrCode)?;

        if code.superseded_at.is_some() || code.is_expired(Utc::now()) {
            return Err(AppError::ExpiredQrCode);
        }

        let profile = self.fetch_profile(code.profile_id).await?;

        Ok((code, profile.into()))
    }

    /// Fetch a profile joined with its organization and department.
    pub async fn fetch_profile(&self, profile_id: Uuid) -> Result<ProfileRow, AppError> {
        sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT p.id, p.display_name,
                   o.id AS organization_id, o.name AS organization_name,
                   d.id AS department_id, d.name AS department_name
            FROM profiles p
            JOIN organizations o ON o.id = p.organization_id
            LEFT JOIN departments d ON d.id = p.department_id
            WHERE p.id = $1
            "#,
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::ProfileNotFound)
    }

    /// The live (not superseded) code row for a profile, expired or not.
    async fn find_live(&self, profile_id: Uuid) -> Result<Option<ProfileQrCode>, AppError> {
        let code = sqlx::query_as::<_, ProfileQrCode>(
            "SELECT * FROM profile_qr_codes WHERE profile_id = $1 AND superseded_at IS NULL",
        )
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(code)
    }

    /// Render the code's payload as SVG, upload it, and persist the URL.
    async fn render_and_store(&self, code: &ProfileQrCode) -> Result<String, AppError> {
        let svg = render_svg(&code.secret)?;
        let url = self.blob_store.upload_qr_image(code.id, svg).await?;

        sqlx::query("UPDATE profile_qr_codes SET image_url = $1 WHERE id = $2")
            .bind(&url)
            .bind(code.id)
            .execute(&self.pool)
            .await?;

        Ok(url)
    }
}

/// Create a fresh code for the profile, superseding an expired live one.
///
/// Runs as the shared coalesced future, so it owns its pool handle. A lost
/// race on the live-code index falls back to re-reading the winner's row
/// instead of erroring.
async fn create_or_replace(pool: DbPool, profile_id: Uuid) -> Result<ProfileQrCode, AppError> {
    let mut tx = pool.begin().await?;

    // Supersede an expired live code; the row is retained so historical
    // usage records keep a valid reference.
    sqlx::query(
        r#"
        UPDATE profile_qr_codes
        SET superseded_at = NOW()
        WHERE profile_id = $1 AND superseded_at IS NULL AND expires_at <= NOW()
        "#,
    )
    .bind(profile_id)
    .execute(&mut *tx)
    .await?;

    let expires_at = Utc::now() + Duration::days(QR_CODE_VALIDITY_DAYS);

    let inserted = sqlx::query_as::<_, ProfileQrCode>(
        r#"
        INSERT INTO profile_qr_codes (profile_id, secret, expires_at)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(profile_id)
    .bind(generate_secret())
    .bind(expires_at)
    .fetch_one(&mut *tx)
    .await;

    match inserted {
        Ok(code) => {
            tx.commit().await?;
            Ok(code)
        }
        Err(err) if crate::db::is_unique_violation(&err, LIVE_CODE_CONSTRAINT) => {
            // Another request (possibly another instance) won the insert
            // race; its row is the live code now.
            tx.rollback().await?;
            sqlx::query_as::<_, ProfileQrCode>(
                "SELECT * FROM profile_qr_codes WHERE profile_id = $1 AND superseded_at IS NULL",
            )
            .bind(profile_id)
            .fetch_optional(&pool)
            .await?
            .ok_or_else(|| {
                AppError::Internal("lost QR creation race but found no live code".to_string())
            })
        }
        Err(err) => Err(err.into()),
    }
}

/// Generate an opaque scannable secret.
///
/// # Output
///
/// 64 hex characters (32 random bytes)
fn generate_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// Validate the shape of a scanned payload.
///
/// Payloads are exactly the 64-hex-character secret embedded in the image;
/// anything else is rejected before touching the store.
fn parse_payload(payload: &str) -> Result<&str, AppError> {
    let trimmed = payload.trim();
    if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AppError::InvalidRequest("Malformed QR payload".to_string()));
    }
    Ok(trimmed)
}

/// Render a payload as an SVG image.
fn render_svg(secret: &str) -> Result<String, AppError> {
    let code = QrCode::new(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("QR encoding failed: {e}")))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[test]
    fn secret_is_64_hex_chars_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn parse_accepts_generated_secrets() {
        let secret = generate_secret();
        assert_eq!(parse_payload(&secret).unwrap(), secret);
        // Surrounding whitespace from sloppy clients is tolerated
        assert_eq!(parse_payload(&format!("  {secret}\n")).unwrap(), secret);
    }

    #[test]
    fn parse_rejects_malformed_payloads() {
        for bad in ["", "abc", &"z".repeat(64), &"a".repeat(63), &"a".repeat(65)] {
            assert!(matches!(
                parse_payload(bad),
                Err(AppError::InvalidRequest(_))
            ));
        }
    }

    #[test]
    fn renders_svg_for_a_secret() {
        let svg = render_svg(&generate_secret()).expect("render");
        assert!(svg.contains("<svg"));
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_creation() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(50)).await;
            Ok(7u32)
        };

        let key = Uuid::new_v4();
        let (a, b) = tokio::join!(
            coalescer.run(key, make(calls.clone())),
            coalescer.run(key, make(calls.clone())),
        );

        assert_eq!(a.unwrap(), 7);
        assert_eq!(b.unwrap(), 7);
        // The second caller joined the first creation instead of starting
        // its own
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn entries_are_cleared_after_settle() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        let key = Uuid::new_v4();

        coalescer.run(key, async { Ok(1u32) }).await.unwrap();
        assert!(coalescer.inflight.lock().unwrap().is_empty());

        // Failure paths clear the entry too
        let err = coalescer
            .run(key, async { Err(AppError::Internal("boom".into())) })
            .await
            .unwrap_err();
        assert!(matches!(*err, AppError::Internal(_)));
        assert!(coalescer.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let coalescer: RequestCoalescer<u32> = RequestCoalescer::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = |calls: Arc<AtomicUsize>, v: u32| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(v)
        };

        let (a, b) = tokio::join!(
            coalescer.run(Uuid::new_v4(), make(calls.clone(), 1)),
            coalescer.run(Uuid::new_v4(), make(calls.clone(), 2)),
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
