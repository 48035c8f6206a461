// bps-core/src/delivery.rs
// Fetch, verify and unpack a resolved dependency into a layer.

use std::path::Path;

use bps_aio::extract::{Archive, ArchiveFormat};
use bps_common::config::DEFAULT_PLATFORM_DIR;
use bps_common::dependency::Dependency;
use bps_common::error::{BpsError, Result};
use bps_net::validation::ValidatedReader;
use tracing::{debug, error};

use crate::service::Service;

impl Service {
    /// Downloads `dependency` and extracts it into `layer_path`.
    ///
    /// A `dependency-mapping` binding under `platform_path/bindings` may
    /// replace the download URI; the expected checksum always comes from the
    /// catalog. The checksum is verified after extraction, so a mismatch
    /// leaves the extracted files in place.
    pub fn deliver(
        &self,
        dependency: &Dependency,
        cnb_path: &Path,
        layer_path: &Path,
        platform_path: &Path,
    ) -> Result<()> {
        let uri = self.effective_uri(dependency, platform_path)?;
        let format = ArchiveFormat::from_uri(&uri)
            .or_else(|| ArchiveFormat::from_uri(&dependency.uri))
            .unwrap_or(ArchiveFormat::TarGzip);
        self.fetch_and_extract(dependency, &uri, format, cnb_path, layer_path)
    }

    /// Like [`deliver`](Self::deliver), with the archive format given
    /// instead of derived from the URI.
    pub fn deliver_with_format(
        &self,
        dependency: &Dependency,
        format: ArchiveFormat,
        cnb_path: &Path,
        layer_path: &Path,
        platform_path: &Path,
    ) -> Result<()> {
        let uri = self.effective_uri(dependency, platform_path)?;
        self.fetch_and_extract(dependency, &uri, format, cnb_path, layer_path)
    }

    /// [`deliver`](Self::deliver) with the platform directory fixed to
    /// `/platform`.
    #[deprecated(note = "use `deliver` and pass the platform directory")]
    pub fn install(&self, dependency: &Dependency, cnb_path: &Path, layer_path: &Path) -> Result<()> {
        self.deliver(
            dependency,
            cnb_path,
            layer_path,
            Path::new(DEFAULT_PLATFORM_DIR),
        )
    }

    fn effective_uri(&self, dependency: &Dependency, platform_path: &Path) -> Result<String> {
        let bindings = platform_path.join("bindings");
        let mapped = self
            .mapping_resolver
            .find_dependency_mapping(&dependency.sha256, &bindings)
            .map_err(|e| {
                error!("Binding lookup in {} failed: {}", bindings.display(), e);
                BpsError::BindingLookup(e.to_string())
            })?;

        match mapped {
            Some(uri) if !uri.is_empty() => {
                debug!(
                    "Dependency {} {} redirected to {}",
                    dependency.id, dependency.version, uri
                );
                Ok(uri)
            }
            _ => Ok(dependency.uri.clone()),
        }
    }

    fn fetch_and_extract(
        &self,
        dependency: &Dependency,
        uri: &str,
        format: ArchiveFormat,
        cnb_path: &Path,
        layer_path: &Path,
    ) -> Result<()> {
        debug!(
            "Delivering {} {} from {} as {:?} into {}",
            dependency.id,
            dependency.version,
            uri,
            format,
            layer_path.display()
        );
        let bundle = self
            .transport
            .fetch(cnb_path, uri)
            .map_err(|e| BpsError::Fetch(e.to_string()))?;

        let mut reader = ValidatedReader::new(bundle, dependency.sha256.as_str());
        Archive::new(format, &mut reader).decompress(layer_path)?;
        reader.validate()?;

        debug!(
            "Delivered {} {} ({} bytes)",
            dependency.id,
            dependency.version,
            reader.bytes_read()
        );
        Ok(())
    }
}
