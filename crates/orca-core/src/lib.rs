//! Core domain types and traits for the Orca job orchestrator.
//!
//! This crate contains:
//! - Job identifiers, records and the status state machine
//! - Sparse patch types used for worker progress reports
//! - The work queue contract and its wire message
//! - The artifact storage contract and path validation

pub mod artifact;
pub mod error;
pub mod id;
pub mod job;
pub mod patch;
pub mod queue;

pub use error::{Error, Result};
pub use id::JobId;
pub use job::{Job, JobMetadata, JobStatus, ResultRefs};
pub use patch::{FieldUpdate, JobPatch, StatusReport};
