//! controller error types.

use thiserror::Error;

/// errors that can occur in the controller.
#[derive(Debug, Error)]
pub enum Error {
    /// database failure.
    #[error(transparent)]
    Db(#[from] skyway_db::Error),

    /// protocol failure.
    #[error(transparent)]
    Proto(#[from] skyway_proto::Error),

    /// manifest rendering failure.
    #[error(transparent)]
    Render(#[from] skyway_render::Error),

    /// a request/reply exchange timed out.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// no receiver is attached to the destination address.
    #[error("no route to {0}")]
    NoRoute(String),

    /// a referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// the request is malformed or violates a rule.
    #[error("validation error: {0}")]
    Validation(String),

    /// the operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// cluster collaborator failure.
    #[error("cluster error: {0}")]
    Cluster(String),

    /// internal invariant failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;
