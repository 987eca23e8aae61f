//! Artifact registry for Orca.
//!
//! Artifacts are discovered by listing the `jobs/{job_id}/` prefix of an
//! object store, so a job's artifact set is open-ended.

pub mod bundle;
pub mod object;

pub use bundle::{Bundle, bundle, collect_all};
pub use object::ObjectArtifactStore;
