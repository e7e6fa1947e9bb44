//! Shared application state.
//!
//! Built once in `main` and cloned into every handler via Axum's `State`
//! extractor. The QR registry (with its in-process coalescing map) lives
//! here with an explicit lifecycle instead of in a module-level global, so
//! tests can construct isolated instances.

use std::sync::Arc;

use crate::{config::Config, db::DbPool, services::qr_service::QrService};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<Config>,
    pub qr: Arc<QrService>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, qr: QrService) -> Self {
        Self {
            pool,
            config: Arc::new(config),
            qr: Arc::new(qr),
        }
    }
}
