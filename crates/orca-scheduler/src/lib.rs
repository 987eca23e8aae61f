//! Job orchestration for Orca.
//!
//! Hands queued jobs to competing workers, tracks their status through the
//! pipeline, and serves the artifacts they leave behind.

pub mod manager;
pub mod queue;
pub mod worker;

pub use manager::JobManager;
pub use queue::{MemoryWorkQueue, PgWorkQueue};
pub use worker::{JobOutput, JobProcessor, Progress, StatusReporter, Worker};
