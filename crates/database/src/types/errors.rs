//! Error types for the database layer

use thiserror::Error;

/// Infrastructure fault raised by the data-access layer.
///
/// Expected business outcomes (duplicate username, wrong password, ...) are
/// never expressed through this type; they travel in the service layer's
/// response values. Anything surfacing here is unrecoverable from the
/// request's point of view.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    ConnectionError(String),

    #[error("database query error: {0}")]
    QueryError(String),

    #[error("database migration error: {0}")]
    MigrationError(String),
}
