use lazy_static::lazy_static;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::runtime::Runtime;

use crate::config::ExportConfig;
use crate::db_migration;
use crate::domains::content::SqliteContentRepository;
use crate::domains::export::delivery::FileDelivery;
use crate::domains::export::service::ExportService;
use crate::errors::DbError;
use crate::ffi::error::{FFIError, FFIResult};

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: Mutex<()> = Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref DB_POOL: Mutex<Option<SqlitePool>> = Mutex::new(None);
    static ref CONFIG: Mutex<Option<ExportConfig>> = Mutex::new(None);
    static ref EXPORT_SERVICE: Mutex<Option<Arc<ExportService>>> = Mutex::new(None);
}

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

/// Shared runtime for host entry points; created on first use.
pub fn runtime() -> FFIResult<&'static Runtime> {
    if let Some(rt) = RUNTIME.get() {
        return Ok(rt);
    }
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| FFIError::internal(format!("Failed to create Tokio runtime: {}", e)))?;
    Ok(RUNTIME.get_or_init(|| rt))
}

/// Run a future to completion on the shared runtime
pub fn block_on_async<F, T>(future: F) -> FFIResult<T>
where
    F: std::future::Future<Output = FFIResult<T>>,
{
    runtime()?.block_on(future)
}

/// Initialize logging, configuration, the database pool and the export
/// service. `database_url` overrides the configured one.
pub fn initialize(database_url: Option<&str>) -> FFIResult<()> {
    let _guard = INIT_MUTEX
        .lock()
        .map_err(|_| FFIError::internal("Initialization lock poisoned".to_string()))?;

    if INITIALIZED.load(Ordering::Acquire) {
        log::debug!("Already initialized");
        return Ok(());
    }

    block_on_async(initialize_internal(database_url))?;
    INITIALIZED.store(true, Ordering::Release);
    Ok(())
}

async fn initialize_internal(database_url: Option<&str>) -> FFIResult<()> {
    // Initialize logging first
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    log::info!("Starting internal initialization");

    let mut config = ExportConfig::from_env()?;
    if let Some(url) = database_url {
        config.database_url = Some(url.to_string());
    }
    let url = config.require_database_url()?.to_string();
    log::debug!("Database URL: {}", url);
    log::debug!("Output directory: {}", config.output_dir.display());

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&url)
        .await
        .map_err(|e| FFIError::from(DbError::ConnectionPool(format!("{}: {}", url, e))))?;

    db_migration::run_migrations(&pool).await?;

    let repository = Arc::new(SqliteContentRepository::new(pool.clone()));
    let service = Arc::new(ExportService::from_content(repository));

    set_global(&DB_POOL, pool)?;
    set_global(&CONFIG, config)?;
    set_global(&EXPORT_SERVICE, service)?;

    log::info!("Initialization complete");
    Ok(())
}

fn set_global<T>(slot: &Mutex<Option<T>>, value: T) -> FFIResult<()> {
    let mut guard = slot
        .lock()
        .map_err(|_| FFIError::internal("Global state lock poisoned".to_string()))?;
    *guard = Some(value);
    Ok(())
}

fn get_global<T: Clone>(slot: &Mutex<Option<T>>, what: &str) -> FFIResult<T> {
    slot.lock()
        .map_err(|_| FFIError::internal("Global state lock poisoned".to_string()))?
        .clone()
        .ok_or_else(|| FFIError::not_initialized(what))
}

/// Get a reference to the SQLite connection pool
pub fn get_db_pool() -> FFIResult<SqlitePool> {
    get_global(&DB_POOL, "database pool")
}

pub fn get_config() -> FFIResult<ExportConfig> {
    get_global(&CONFIG, "configuration")
}

pub fn get_export_service() -> FFIResult<Arc<ExportService>> {
    get_global(&EXPORT_SERVICE, "export service")
}

pub fn get_file_delivery() -> FFIResult<FileDelivery> {
    let config = get_config()?;
    Ok(FileDelivery::new(config.output_dir.clone(), config.csv_config()))
}
