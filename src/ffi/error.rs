use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{DbError, ExportError, ValidationError};

/// Error codes for FFI boundary
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Success (no error)
    Success = 0,

    // General errors (1-99)
    Unknown = 1,
    InvalidArgument = 2,
    NullPointer = 3,
    InvalidUtf8 = 4,
    InternalError = 6,
    NotInitialized = 7,

    // Database errors (100-199)
    DatabaseGeneral = 100,
    DatabaseConnection = 104,
    DatabaseMigration = 106,

    // Export errors (500-599)
    CollaboratorUnavailable = 500,
    ExportIo = 501,
    ExportSerialization = 502,
    ConfigurationError = 503,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, *self as i32)
    }
}

/// Error type for FFI boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FFIError {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (JSON string)
    pub details: Option<String>,
}

pub type FFIResult<T> = Result<T, FFIError>;

impl fmt::Display for FFIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for FFIError {}

impl FFIError {
    pub fn new(code: ErrorCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: &str, details: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
            details: Some(details.to_string()),
        }
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    pub fn internal(message: String) -> Self {
        Self::new(ErrorCode::InternalError, &message)
    }

    pub fn not_initialized(what: &str) -> Self {
        Self::new(
            ErrorCode::NotInitialized,
            &format!("{} not initialized; call export_initialize first", what),
        )
    }
}

impl From<DbError> for FFIError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(sqlx_err) => Self::new(ErrorCode::DatabaseGeneral, &sqlx_err.to_string()),
            DbError::ConnectionPool(msg) => Self::new(ErrorCode::DatabaseConnection, &msg),
            DbError::Migration(msg) => Self::new(ErrorCode::DatabaseMigration, &msg),
        }
    }
}

impl From<ValidationError> for FFIError {
    fn from(err: ValidationError) -> Self {
        Self::new(ErrorCode::InvalidArgument, &err.to_string())
    }
}

impl From<ExportError> for FFIError {
    fn from(err: ExportError) -> Self {
        match &err {
            ExportError::InvalidArgument(msg) => Self::new(ErrorCode::InvalidArgument, msg),
            ExportError::CollaboratorUnavailable { collaborator, .. } => Self::with_details(
                ErrorCode::CollaboratorUnavailable,
                &err.to_string(),
                &serde_json::json!({ "collaborator": collaborator }).to_string(),
            ),
            ExportError::Io(msg) => Self::new(ErrorCode::ExportIo, msg),
            ExportError::Serialization(msg) => Self::new(ErrorCode::ExportSerialization, msg),
            ExportError::Configuration(msg) => Self::new(ErrorCode::ConfigurationError, msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_errors_map_to_codes() {
        let err: FFIError = ExportError::InvalidArgument("record_type".into()).into();
        assert_eq!(err.code, ErrorCode::InvalidArgument);

        let err: FFIError = ExportError::collaborator("record store", "down").into();
        assert_eq!(err.code, ErrorCode::CollaboratorUnavailable);
        assert_eq!(err.details.as_deref(), Some(r#"{"collaborator":"record store"}"#));
    }

    #[test]
    fn test_pool_errors_map_to_connection_code() {
        let err: FFIError = DbError::ConnectionPool("sqlite://missing.db: unable to open".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseConnection);
        assert!(err.message.contains("missing.db"));
    }

    #[test]
    fn test_serializes_to_json() {
        let err = FFIError::invalid_argument("Null pointer(s) provided");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "InvalidArgument");
        assert_eq!(json["message"], "Null pointer(s) provided");
        assert!(json["details"].is_null());
    }
}
