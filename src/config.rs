use std::env;
use std::path::PathBuf;

use crate::domains::export::writers::CsvConfig;
use crate::errors::{ExportError, ExportResult};

pub const DATABASE_URL_VAR: &str = "POST_EXPORT_DATABASE_URL";
pub const OUTPUT_DIR_VAR: &str = "POST_EXPORT_OUTPUT_DIR";
pub const UTF8_BOM_VAR: &str = "POST_EXPORT_UTF8_BOM";
pub const MAX_CONNECTIONS_VAR: &str = "POST_EXPORT_MAX_CONNECTIONS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Runtime settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub database_url: Option<String>,
    pub output_dir: PathBuf,
    pub include_bom: bool,
    pub max_connections: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            output_dir: PathBuf::from("."),
            include_bom: false,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

impl ExportConfig {
    pub fn from_env() -> ExportResult<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ExportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let include_bom = match lookup(UTF8_BOM_VAR) {
            Some(raw) => parse_bool(UTF8_BOM_VAR, &raw)?,
            None => defaults.include_bom,
        };

        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ExportError::Configuration(format!(
                        "{} must be a positive integer, got '{}'",
                        MAX_CONNECTIONS_VAR, raw
                    ))
                })?,
            None => defaults.max_connections,
        };

        Ok(Self {
            database_url: lookup(DATABASE_URL_VAR).filter(|url| !url.trim().is_empty()),
            output_dir: lookup(OUTPUT_DIR_VAR)
                .filter(|dir| !dir.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            include_bom,
            max_connections,
        })
    }

    pub fn require_database_url(&self) -> ExportResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ExportError::Configuration(format!("{} is not set", DATABASE_URL_VAR)))
    }

    pub fn csv_config(&self) -> CsvConfig {
        CsvConfig {
            include_bom: self.include_bom,
            ..CsvConfig::default()
        }
    }
}

fn parse_bool(var: &str, raw: &str) -> ExportResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ExportError::Configuration(format!(
            "{} must be a boolean, got '{}'",
            var, raw
        ))),
    }
}
