//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params, etc.)
//! 2. Calls into the service layer
//! 3. Returns HTTP response (JSON, status code)

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::{middleware::auth::ScannerContext, services::scan_service::ScanContext};

/// Group scan session endpoints
pub mod group_scans;
/// Health check endpoint
pub mod health;
/// Profile-facing QR code generation
pub mod profiles;
/// Scanner-facing scan endpoint
pub mod qr_codes;
/// Scanner authentication endpoints
pub mod scanners;

/// Build the audit metadata recorded with a scan.
///
/// The source IP prefers the first `X-Forwarded-For` entry (set by the
/// reverse proxy) and falls back to the socket peer address.
pub(crate) fn scan_context(
    scanner: &ScannerContext,
    headers: &HeaderMap,
    peer: SocketAddr,
) -> ScanContext {
    let forwarded_for = headers
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    let user_agent = headers
        .get("User-Agent")
        .and_then(|h| h.to_str().ok())
        .map(|ua| ua.to_string());

    ScanContext {
        scanner_id: scanner.scanner_uuid,
        organization_id: scanner.organization_id,
        ip_address: forwarded_for.or_else(|| Some(peer.ip().to_string())),
        user_agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    fn test_scanner() -> ScannerContext {
        ScannerContext {
            scanner_uuid: Uuid::new_v4(),
            scanner_id: "front-desk-1".into(),
            scanner_name: "Front desk".into(),
            organization_id: Uuid::new_v4(),
            organization_name: "Acme".into(),
            expires_at: 0,
        }
    }

    #[test]
    fn prefers_forwarded_for_over_peer_address() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Forwarded-For",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("User-Agent", HeaderValue::from_static("kiosk/1.2"));

        let ctx = scan_context(&test_scanner(), &headers, "10.0.0.2:9999".parse().unwrap());
        assert_eq!(ctx.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(ctx.user_agent.as_deref(), Some("kiosk/1.2"));
    }

    #[test]
    fn falls_back_to_peer_address() {
        let ctx = scan_context(
            &test_scanner(),
            &HeaderMap::new(),
            "10.0.0.2:9999".parse().unwrap(),
        );
        assert_eq!(ctx.ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(ctx.user_agent, None);
    }
}
