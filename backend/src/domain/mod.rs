pub mod catalog_service;
pub mod child_service;
pub mod errors;
pub mod export_service;
pub mod ledger_service;
pub mod templates;

pub use catalog_service::CatalogService;
pub use child_service::ChildService;
pub use errors::DomainError;
pub use export_service::ExportService;
pub use ledger_service::LedgerService;
