//! System configuration for Orca.
//!
//! Configuration comes from built-in defaults, an optional KDL file, and
//! finally environment variables, each layer overriding the previous one.

pub mod error;
pub mod system;

pub use error::{ConfigError, ConfigResult};
pub use system::{
    ArtifactBackend, ArtifactStoreConfig, QueueBackend, QueueConfig, StoreBackend, SystemConfig,
};
