// bps-net/src/lib.rs
pub mod bindings;
pub mod transport;
pub mod validation;

pub use bindings::{DependencyMappingResolver, MappingResolver};
pub use transport::{DefaultTransport, Transport};
pub use validation::ValidatedReader;
