//! Error types for the ontodb storage core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Could not open database: {0}")]
    Open(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Interrupted")]
    Interrupted,

    #[error("Constraint would be broken: {0}")]
    Constraint(String),

    #[error("No space left on device: {0}")]
    NoSpace(String),

    #[error("Database is corrupt: {0}")]
    Corrupt(String),

    #[error("Ontology error: {0}")]
    Ontology(String),

    #[error("FTS error: {0}")]
    Fts(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid date/time: {0}")]
    Time(String),

    #[error("Cursor error: {0}")]
    Cursor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Classify a SQLite failure into the error kinds this layer exposes.
    ///
    /// IOERR/CORRUPT/NOTADB are treated as fatal corruption; callers are not
    /// expected to recover from them.
    pub fn from_sqlite(err: rusqlite::Error) -> StoreError {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(ffi_err, msg) => {
                let text = msg.clone().unwrap_or_else(|| ffi_err.to_string());

                match ffi_err.code {
                    ErrorCode::OperationInterrupted => StoreError::Interrupted,
                    ErrorCode::ConstraintViolation => StoreError::Constraint(text),
                    ErrorCode::DiskFull => StoreError::NoSpace(text),
                    ErrorCode::DatabaseCorrupt
                    | ErrorCode::NotADatabase
                    | ErrorCode::SystemIoFailure => {
                        tracing::error!("fatal SQLite error: {}", text);
                        StoreError::Corrupt(text)
                    }
                    ErrorCode::CannotOpen => StoreError::Open(text),
                    _ => StoreError::Query(text),
                }
            }
            rusqlite::Error::QueryReturnedNoRows => {
                StoreError::Query("query returned no rows".to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::from_sqlite(err)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
