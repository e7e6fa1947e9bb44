//! Scanner session service - credential checks and stateless session tokens.
//!
//! A scanner authenticates once with its device id and password and receives
//! a signed JWT carrying its identity and organization. Every later call
//! presents that token; verification checks signature and expiry only, with
//! no database lookup. There is no server-side session table and no
//! revocation list: disabling a scanner leaves already-issued tokens valid
//! until they expire.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    db::DbPool,
    error::AppError,
    models::{profile::OrganizationRef, scanner::Scanner},
};

/// Claims carried by a scanner session token.
///
/// Self-contained: everything the request path needs to know about the
/// caller is in here, so verification never touches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerClaims {
    /// Scanner row id
    pub sub: Uuid,
    /// Human-readable device id (e.g., "front-desk-1")
    pub scanner_id: String,
    pub scanner_name: String,
    pub organization_id: Uuid,
    pub organization_name: String,
    /// Expiration time (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
}

/// Outcome of a successful authentication.
#[derive(Debug)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub scanner: Scanner,
    pub organization: OrganizationRef,
}

/// Authenticate a scanner device and mint a session token.
///
/// # Process
///
/// 1. Look up the credential by device id
/// 2. Compare the SHA-256 hash of the supplied password
/// 3. Require the scanner to be active
/// 4. Stamp `last_active_at`
/// 5. Mint a signed token valid for `config.token_validity_hours`
///
/// # Errors
///
/// - `InvalidCredentials`: unknown device id OR wrong password. The two are
///   deliberately indistinguishable to prevent device-id enumeration.
/// - `ScannerDisabled`: credentials were correct but the device is disabled.
///   Only revealed after a successful password check.
pub async fn authenticate(
    pool: &DbPool,
    config: &Config,
    scanner_id: &str,
    password: &str,
) -> Result<IssuedSession, AppError> {
    let scanner = sqlx::query_as::<_, Scanner>("SELECT * FROM scanners WHERE scanner_id = $1")
        .bind(scanner_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if hash_password(password) != scanner.password_hash {
        return Err(AppError::InvalidCredentials);
    }

    if !scanner.is_active {
        return Err(AppError::ScannerDisabled);
    }

    let organization_name: String =
        sqlx::query_scalar("SELECT name FROM organizations WHERE id = $1")
            .bind(scanner.organization_id)
            .fetch_one(pool)
            .await?;

    // Side effect on successful authentication only
    sqlx::query("UPDATE scanners SET last_active_at = NOW() WHERE id = $1")
        .bind(scanner.id)
        .execute(pool)
        .await?;

    let (token, expires_at) = mint_token(
        &config.token_secret,
        config.token_validity_hours,
        &scanner,
        &organization_name,
    )?;

    Ok(IssuedSession {
        token,
        expires_at,
        organization: OrganizationRef {
            id: scanner.organization_id,
            name: organization_name,
        },
        scanner,
    })
}

/// Mint a signed session token for an authenticated scanner.
pub fn mint_token(
    secret: &str,
    validity_hours: u64,
    scanner: &Scanner,
    organization_name: &str,
) -> Result<(String, DateTime<Utc>), AppError> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(validity_hours as i64);

    let claims = ScannerClaims {
        sub: scanner.id,
        scanner_id: scanner.scanner_id.clone(),
        scanner_name: scanner.name.clone(),
        organization_id: scanner.organization_id,
        organization_name: organization_name.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| AppError::Internal(format!("failed to sign session token: {e}")))?;

    Ok((token, expires_at))
}

/// Verify a session token's signature and expiry.
///
/// Stateless by design: no database lookup. A token past its `exp` is
/// rejected regardless of signature validity.
pub fn verify_token(secret: &str, token: &str) -> Result<ScannerClaims, AppError> {
    let validation = Validation::default();
    decode::<ScannerClaims>(token, &DecodingKey::from_secret(secret.as_ref()), &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidToken)
}

/// SHA-256 hash of a scanner password (64 hex characters).
///
/// Matches how provisioning stores `password_hash` at rest.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scanner() -> Scanner {
        Scanner {
            id: Uuid::new_v4(),
            scanner_id: "front-desk-1".into(),
            name: "Front desk".into(),
            organization_id: Uuid::new_v4(),
            password_hash: hash_password("hunter2"),
            is_active: true,
            last_active_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let scanner = test_scanner();
        let (token, expires_at) = mint_token("secret", 24, &scanner, "Acme").expect("mint");

        let claims = verify_token("secret", &token).expect("verify");
        assert_eq!(claims.sub, scanner.id);
        assert_eq!(claims.scanner_id, "front-desk-1");
        assert_eq!(claims.organization_name, "Acme");
        assert_eq!(claims.exp, expires_at.timestamp());
        assert!(expires_at > Utc::now());
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let scanner = test_scanner();
        let (token, _) = mint_token("secret-a", 24, &scanner, "Acme").expect("mint");

        assert!(matches!(
            verify_token("secret-b", &token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn rejects_expired_token_despite_valid_signature() {
        let scanner = test_scanner();
        let now = Utc::now();
        let claims = ScannerClaims {
            sub: scanner.id,
            scanner_id: scanner.scanner_id.clone(),
            scanner_name: scanner.name.clone(),
            organization_id: scanner.organization_id,
            organization_name: "Acme".into(),
            // Well past the default validation leeway
            exp: (now - Duration::hours(2)).timestamp(),
            iat: (now - Duration::hours(26)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("secret".as_ref()),
        )
        .expect("encode");

        assert!(matches!(
            verify_token("secret", &token),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(matches!(
            verify_token("secret", "not-a-jwt"),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn password_hash_is_64_hex_chars() {
        let hash = hash_password("hunter2");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        // Deterministic: same input, same hash
        assert_eq!(hash, hash_password("hunter2"));
        assert_ne!(hash, hash_password("hunter3"));
    }
}
