// bps-core/src/service.rs
use std::path::Path;

use bps_common::catalog::{BuildpackToml, CatalogParser};
use bps_common::dependency::Dependency;
use bps_common::error::Result;
use bps_net::bindings::{DependencyMappingResolver, MappingResolver};
use bps_net::transport::Transport;
use tracing::debug;

use crate::resolver;

/// Resolves dependencies out of a catalog and delivers them into layers.
///
/// The transport is required; the catalog parser and the binding lookup
/// default to [`BuildpackToml`] and [`DependencyMappingResolver`].
pub struct Service {
    pub(crate) transport: Box<dyn Transport>,
    pub(crate) mapping_resolver: Box<dyn MappingResolver>,
    catalog_parser: Box<dyn CatalogParser>,
}

impl Service {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            mapping_resolver: Box::new(DependencyMappingResolver::new()),
            catalog_parser: Box::new(BuildpackToml),
        }
    }

    pub fn with_dependency_mapping_resolver(
        mut self,
        mapping_resolver: impl MappingResolver + 'static,
    ) -> Self {
        self.mapping_resolver = Box::new(mapping_resolver);
        self
    }

    pub fn with_catalog_parser(mut self, catalog_parser: impl CatalogParser + 'static) -> Self {
        self.catalog_parser = Box::new(catalog_parser);
        self
    }

    /// Finds the best entry for `id` in the catalog at `path`. See
    /// [`resolver::resolve`] for the selection rules.
    pub fn resolve(&self, path: &Path, id: &str, version: &str, stack: &str) -> Result<Dependency> {
        let (dependencies, default_version) = self.catalog_parser.parse(path, id)?;
        debug!(
            "Catalog {} lists {} dependencies (default for {}: {:?})",
            path.display(),
            dependencies.len(),
            id,
            default_version
        );
        resolver::resolve(
            &dependencies,
            default_version.as_deref(),
            id,
            version,
            stack,
        )
    }
}
