//! Error types for Orca.

use thiserror::Error;

use crate::JobStatus;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An artifact path that would resolve outside its job prefix.
    #[error("invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// A backing service (store, queue, object store) failed.
    #[error("dependency failure: {0}")]
    Dependency(String),
}

impl Error {
    pub fn dependency(err: impl std::fmt::Display) -> Self {
        Error::Dependency(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
