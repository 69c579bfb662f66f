//! Core error types for caffy-core.
//!
//! Calculation components never fail; errors come from validation of
//! caller input, missing users, storage and configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for caffy-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A user, profile or record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors, raised before any state is touched
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn user_not_found(user_id: i64) -> Self {
        CoreError::NotFound {
            entity: "user profile",
            id: user_id.to_string(),
        }
    }

    pub fn intake_not_found(intake_id: i64) -> Self {
        CoreError::NotFound {
            entity: "intake event",
            id: intake_id.to_string(),
        }
    }

    /// True for errors that mean "the thing you asked about does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded
    #[error("Corrupt value in column '{column}': {message}")]
    CorruptValue { column: &'static str, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    /// Perceived level outside the 1..=5 scale
    #[error("Perceived level must be between 1 and 5, got {0}")]
    PerceivedLevelOutOfRange(i64),

    /// Amount that must be strictly positive and finite
    #[error("Invalid amount for '{field}': {value} (must be a positive finite number)")]
    InvalidAmount { field: &'static str, value: f64 },

    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be after start ({start})")]
    InvalidTimeRange {
        start: chrono::DateTime<chrono::Utc>,
        end: chrono::DateTime<chrono::Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },
}

impl ValidationError {
    /// Checks that `value` is finite and strictly positive.
    pub fn check_positive(field: &'static str, value: f64) -> Result<f64, ValidationError> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(ValidationError::InvalidAmount { field, value })
        }
    }
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_positive_rejects_zero_negative_and_nan() {
        assert!(ValidationError::check_positive("amount", 0.0).is_err());
        assert!(ValidationError::check_positive("amount", -3.0).is_err());
        assert!(ValidationError::check_positive("amount", f64::NAN).is_err());
        assert!(ValidationError::check_positive("amount", f64::INFINITY).is_err());
        assert_eq!(ValidationError::check_positive("amount", 12.5), Ok(12.5));
    }

    #[test]
    fn not_found_message_names_entity() {
        let err = CoreError::user_not_found(42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "user profile not found: 42");
    }

    #[test]
    fn sqlite_errors_map_to_query_failed() {
        let err: DatabaseError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, DatabaseError::QueryFailed(_)));
    }
}
