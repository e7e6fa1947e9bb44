//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They handle database transactions, validation, and the scan-engine
//! state machine.

pub mod blob_store;
pub mod group_scan_service;
pub mod qr_service;
pub mod scan_service;
pub mod session_service;
