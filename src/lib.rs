// Public modules
pub mod config;
pub mod db_migration;
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;
pub mod validation;

pub use domains::content::{InMemoryContentStore, SqliteContentRepository};
pub use domains::export::{ExportService, FieldDiscoveryService, FileDelivery};
pub use errors::{ExportError, ExportResult};

// Entry point for initialization
/// Initialize logging, configuration, the database (with migrations) and the
/// export service. `database_url` overrides `POST_EXPORT_DATABASE_URL`.
/// This function must be called before any FFI export function.
pub fn initialize(database_url: Option<&str>) -> ffi::FFIResult<()> {
    globals::initialize(database_url)
}

/// Get a reference to the SQLite connection pool
/// This is primarily for internal use
pub fn get_db_pool() -> ffi::FFIResult<sqlx::SqlitePool> {
    globals::get_db_pool()
}
