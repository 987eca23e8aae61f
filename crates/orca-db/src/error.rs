//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A stored row that no longer matches the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The domain model refused the change (bad transition, invalid field).
    #[error(transparent)]
    Rejected(#[from] orca_core::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type DbResult<T> = std::result::Result<T, DbError>;

impl From<DbError> for orca_core::Error {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => orca_core::Error::NotFound(msg),
            DbError::Rejected(inner) => inner,
            other => orca_core::Error::Dependency(other.to_string()),
        }
    }
}
