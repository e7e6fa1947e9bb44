//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables,
//! plus the request/response types exposed over HTTP.

/// Group scan sessions, records, claims, and scan purposes
pub mod group_scan;
/// Member profile projections (with organization/department joined)
pub mod profile;
/// Profile QR codes and the usage ledger
pub mod qr_code;
/// Scanner device credentials
pub mod scanner;
