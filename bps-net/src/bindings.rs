// bps-net/src/bindings.rs
// Platform bindings that redirect a dependency download to another URI.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bps_common::error::{BpsError, Result};
use tracing::debug;

/// Binding type that marks a dependency mapping.
pub const DEPENDENCY_MAPPING_TYPE: &str = "dependency-mapping";

/// Looks up a replacement download URI for the dependency with the given
/// SHA-256. `Ok(None)` means no binding applies.
pub trait MappingResolver: Send + Sync {
    fn find_dependency_mapping(&self, sha256: &str, bindings_dir: &Path) -> Result<Option<String>>;
}

/// Scans `<platform>/bindings/*`. A binding whose `type` file reads
/// `dependency-mapping` maps a digest to the URI stored in the file named
/// after that digest.
#[derive(Debug, Default, Clone, Copy)]
pub struct DependencyMappingResolver;

impl DependencyMappingResolver {
    pub fn new() -> Self {
        Self
    }
}

impl MappingResolver for DependencyMappingResolver {
    fn find_dependency_mapping(&self, sha256: &str, bindings_dir: &Path) -> Result<Option<String>> {
        if sha256.is_empty() || sha256.contains(['/', '\\']) || sha256 == ".." {
            debug!("No binding lookup for digest {:?}", sha256);
            return Ok(None);
        }

        let entries = match fs::read_dir(bindings_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No bindings directory at {}", bindings_dir.display());
                return Ok(None);
            }
            Err(e) => return Err(context(e, bindings_dir)),
        };

        let mut bindings = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<PathBuf>>>()
            .map_err(|e| context(e, bindings_dir))?;
        bindings.sort();

        for binding in bindings {
            if !binding.is_dir() {
                debug!("Skipping non-directory binding entry {}", binding.display());
                continue;
            }

            let type_path = binding.join("type");
            let binding_type = fs::read_to_string(&type_path).map_err(|e| {
                BpsError::Io(Arc::new(io::Error::new(
                    e.kind(),
                    format!("couldn't read binding type {}: {}", type_path.display(), e),
                )))
            })?;
            if binding_type.trim() != DEPENDENCY_MAPPING_TYPE {
                continue;
            }

            let mapping_path = binding.join(sha256);
            match fs::read_to_string(&mapping_path) {
                Ok(uri) => {
                    let uri = uri.trim();
                    if uri.is_empty() {
                        continue;
                    }
                    debug!(
                        "Binding {} maps {} to {}",
                        binding.display(),
                        sha256,
                        uri
                    );
                    return Ok(Some(uri.to_string()));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(context(e, &mapping_path)),
            }
        }

        Ok(None)
    }
}

fn context(e: io::Error, path: &Path) -> BpsError {
    BpsError::Io(Arc::new(io::Error::new(
        e.kind(),
        format!("{}: {}", path.display(), e),
    )))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn binding(root: &Path, name: &str, kind: &str, entries: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("type"), kind).unwrap();
        for (file, contents) in entries {
            fs::write(dir.join(file), contents).unwrap();
        }
    }

    #[test]
    fn finds_mapping_in_dependency_mapping_binding() {
        let bindings = TempDir::new().unwrap();
        binding(bindings.path(), "other", "ca-certificates", &[("some-sha", "wrong")]);
        binding(
            bindings.path(),
            "some-binding",
            "dependency-mapping\n",
            &[("some-sha", "dependency-mapping-entry.tgz\n")],
        );

        let uri = DependencyMappingResolver
            .find_dependency_mapping("some-sha", bindings.path())
            .unwrap();
        assert_eq!(uri.as_deref(), Some("dependency-mapping-entry.tgz"));
    }

    #[test]
    fn missing_bindings_dir_means_no_mapping() {
        let uri = DependencyMappingResolver
            .find_dependency_mapping("some-sha", Path::new("/no/such/platform/bindings"))
            .unwrap();
        assert!(uri.is_none());
    }

    #[test]
    fn unmapped_digest_means_no_mapping() {
        let bindings = TempDir::new().unwrap();
        binding(
            bindings.path(),
            "some-binding",
            "dependency-mapping",
            &[("other-sha", "elsewhere.tgz")],
        );
        let uri = DependencyMappingResolver
            .find_dependency_mapping("some-sha", bindings.path())
            .unwrap();
        assert!(uri.is_none());
    }

    #[test]
    fn plain_files_in_bindings_dir_are_skipped() {
        let bindings = TempDir::new().unwrap();
        fs::write(bindings.path().join("README"), "not a binding").unwrap();
        binding(
            bindings.path(),
            "some-binding",
            "dependency-mapping",
            &[("some-sha", "mapped.tgz")],
        );
        let uri = DependencyMappingResolver
            .find_dependency_mapping("some-sha", bindings.path())
            .unwrap();
        assert_eq!(uri.as_deref(), Some("mapped.tgz"));
    }

    #[test]
    fn binding_without_type_is_an_error() {
        let bindings = TempDir::new().unwrap();
        fs::create_dir(bindings.path().join("broken")).unwrap();
        let err = DependencyMappingResolver
            .find_dependency_mapping("some-sha", bindings.path())
            .unwrap_err();
        assert!(err.to_string().contains("couldn't read binding type"));
    }
}
