//! Orca HTTP API.
//!
//! Exposes job creation, status reporting and artifact retrieval over JSON.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
