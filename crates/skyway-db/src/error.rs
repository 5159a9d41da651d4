//! database error types.

use thiserror::Error;

/// errors that can occur in database operations.
#[derive(Debug, Error)]
pub enum Error {
    /// failure connecting to the database.
    #[error("database connection error: {0}")]
    Connection(String),

    /// migration failure.
    #[error("migration error: {0}")]
    Migration(String),

    /// a query or transaction failed.
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    /// a stored value could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// a referenced row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// the operation violates a consistency rule.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<skyway_types::ParseError> for Error {
    fn from(err: skyway_types::ParseError) -> Self {
        Error::InvalidData(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidData(err.to_string())
    }
}
