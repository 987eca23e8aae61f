//! Job store trait and implementations.

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;

use async_trait::async_trait;
use orca_core::{Job, JobId, JobPatch};

use crate::DbResult;

/// Durable record of job identity, status and results.
///
/// Implementations must apply each `update` atomically: the patch is
/// validated against and written over the row as it exists at that instant.
/// Concurrent updates to one job resolve last-caller-wins.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: &Job) -> DbResult<()>;
    async fn get(&self, id: JobId) -> DbResult<Job>;
    /// Newest first, at most `limit` records.
    async fn list(&self, limit: usize) -> DbResult<Vec<Job>>;
    /// Apply a sparse patch, returning the record as stored afterwards.
    async fn update(&self, id: JobId, patch: JobPatch) -> DbResult<Job>;
    async fn delete(&self, id: JobId) -> DbResult<()>;

    /// Check that the backing database answers.
    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}
