//! protocol error types.

use thiserror::Error;

/// errors that can occur in protocol operations.
#[derive(Debug, Error)]
pub enum Error {
    /// the message body is not a recognized operation.
    #[error("unknown operation: {0}")]
    UnknownOp(String),

    /// the message carries an unsupported protocol version.
    #[error("unsupported protocol version: {0}")]
    BadVersion(u32),

    /// the message body could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// a request reply carried a non-success status.
    #[error("peer returned status {code}: {description}")]
    Status {
        /// the reply's status code.
        code: u16,
        /// the reply's human-readable description.
        description: String,
    },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Malformed(err.to_string())
    }
}
