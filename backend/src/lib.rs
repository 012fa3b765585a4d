//! Points-chart backend: child registry, per-child catalogs, daily records
//! and the points ledger, exposed over a small REST API.

pub mod domain;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use domain::{CatalogService, ChildService, ExportService, LedgerService};
use storage::DbConnection;

/// Application state shared across REST handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbConnection>,
    pub children: ChildService,
    pub catalogs: CatalogService,
    pub ledger: LedgerService,
    pub export: ExportService,
}

impl AppState {
    pub fn new(db: Arc<DbConnection>) -> Self {
        Self {
            children: ChildService::new(db.clone()),
            catalogs: CatalogService::new(db.clone()),
            ledger: LedgerService::new(db.clone()),
            export: ExportService::new(db.clone()),
            db,
        }
    }
}
