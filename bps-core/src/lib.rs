// bps-core/src/lib.rs
//! Dependency resolution and delivery for buildpacks.

pub mod constraint;
pub mod delivery;
pub mod resolver;
pub mod service;

pub use constraint::Constraint;
pub use service::Service;
