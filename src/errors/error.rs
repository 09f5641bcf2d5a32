use std::fmt;
use serde::Serialize;
use thiserror::Error;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        let kind = match self {
            DbError::Sqlx(_) => "Sqlx",
            DbError::ConnectionPool(_) => "ConnectionPool",
            DbError::Migration(_) => "Migration",
        };
        state.serialize_field("type", kind)?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Validation errors
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }
}

/// Errors surfaced by field discovery and CSV export.
///
/// Every variant aborts the whole export: callers never see a partial document.
/// An empty result set and unknown selection keys are not errors.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum ExportError {
    /// Missing or empty record type (or another malformed request argument)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The record store, schema provider or a per-record provider failed
    #[error("{collaborator} unavailable: {reason}")]
    CollaboratorUnavailable {
        collaborator: String,
        reason: String,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ExportError {
    pub fn collaborator<E: fmt::Display>(collaborator: &str, reason: E) -> Self {
        Self::CollaboratorUnavailable {
            collaborator: collaborator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ExportError::InvalidArgument(_))
    }

    pub fn is_collaborator_unavailable(&self) -> bool {
        matches!(self, ExportError::CollaboratorUnavailable { .. })
    }
}

impl From<ValidationError> for ExportError {
    fn from(error: ValidationError) -> Self {
        ExportError::InvalidArgument(error.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(error: std::io::Error) -> Self {
        ExportError::Io(error.to_string())
    }
}

impl From<csv::Error> for ExportError {
    fn from(error: csv::Error) -> Self {
        ExportError::Serialization(error.to_string())
    }
}
