// bps-common/src/lib.rs
pub mod catalog;
pub mod config;
pub mod dependency;
pub mod error;

// Re-export key types
pub use catalog::{BuildpackToml, CatalogParser};
pub use config::Config;
pub use dependency::Dependency;
pub use error::{BpsError, Result};
