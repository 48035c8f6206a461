// bps-common/src/catalog.rs
// Reads dependency catalogs out of buildpack.toml files.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Deserialize;
use toml::value::Datetime;
use tracing::debug;

use crate::dependency::Dependency;
use crate::error::{BpsError, Result};

/// Produces the dependency records of a catalog together with the declared
/// default version for `id`, if the catalog declares one.
pub trait CatalogParser: Send + Sync {
    fn parse(&self, path: &Path, id: &str) -> Result<(Vec<Dependency>, Option<String>)>;
}

/// Catalog parser for the `[metadata]` section of a `buildpack.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuildpackToml;

#[derive(Debug, Default, Deserialize)]
struct BuildpackFile {
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    dependencies: Vec<CatalogEntry>,
    #[serde(default, rename = "default-versions")]
    default_versions: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogEntry {
    id: String,
    version: String,
    stacks: Vec<String>,
    uri: String,
    sha256: String,
    deprecation_date: Option<Datetime>,
}

impl CatalogEntry {
    fn into_dependency(self) -> Result<Dependency> {
        let deprecation_date = match &self.deprecation_date {
            Some(dt) => Some(to_utc(dt).ok_or_else(|| {
                BpsError::CatalogParse(format!(
                    "invalid deprecation_date '{}' for dependency '{}'",
                    dt, self.id
                ))
            })?),
            None => None,
        };
        Ok(Dependency {
            id: self.id,
            version: self.version,
            stacks: self.stacks,
            uri: self.uri,
            sha256: self.sha256,
            deprecation_date,
        })
    }
}

// TOML allows offset, local and date-only datetimes; local forms are read as UTC.
fn to_utc(dt: &Datetime) -> Option<DateTime<Utc>> {
    let raw = dt.to_string();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

impl CatalogParser for BuildpackToml {
    fn parse(&self, path: &Path, id: &str) -> Result<(Vec<Dependency>, Option<String>)> {
        debug!("Parsing dependency catalog {} for '{}'", path.display(), id);
        let raw = fs::read_to_string(path)
            .map_err(|e| BpsError::CatalogParse(format!("{}: {}", path.display(), e)))?;
        let file: BuildpackFile = toml::from_str(&raw)
            .map_err(|e| BpsError::CatalogParse(format!("{}: {}", path.display(), e)))?;

        let Metadata {
            dependencies,
            mut default_versions,
        } = file.metadata;

        let dependencies = dependencies
            .into_iter()
            .map(CatalogEntry::into_dependency)
            .collect::<Result<Vec<_>>>()?;
        let default_version = default_versions.remove(id).filter(|v| !v.is_empty());

        debug!(
            "Catalog {} holds {} dependencies, default version for '{}': {:?}",
            path.display(),
            dependencies.len(),
            id,
            default_version
        );
        Ok((dependencies, default_version))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_catalog(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_dependencies_and_default_version() {
        let file = write_catalog(
            r#"
[metadata]
[metadata.default-versions]
some-entry = "1.2.x"

[[metadata.dependencies]]
deprecation_date = 2022-04-01T00:00:00Z
id = "some-entry"
sha256 = "some-sha"
stacks = ["some-stack"]
uri = "some-uri"
version = "1.2.3"

[[metadata.dependencies]]
id = "some-other-entry"
sha256 = "some-other-sha"
stacks = ["some-stack", "other-stack"]
uri = "some-other-uri"
version = "1.2.4"
"#,
        );

        let (deps, default) = BuildpackToml.parse(file.path(), "some-entry").unwrap();
        assert_eq!(default.as_deref(), Some("1.2.x"));
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].id, "some-entry");
        assert_eq!(
            deps[0].deprecation_date.unwrap().to_rfc3339(),
            "2022-04-01T00:00:00+00:00"
        );
        assert_eq!(deps[1].stacks, vec!["some-stack", "other-stack"]);
        assert!(deps[1].deprecation_date.is_none());
    }

    #[test]
    fn default_version_is_per_id() {
        let file = write_catalog(
            r#"
[metadata.default-versions]
other = "2.0.0"
"#,
        );
        let (deps, default) = BuildpackToml.parse(file.path(), "some-entry").unwrap();
        assert!(deps.is_empty());
        assert!(default.is_none());
    }

    #[test]
    fn date_only_deprecation_is_midnight_utc() {
        let file = write_catalog(
            r#"
[[metadata.dependencies]]
id = "a"
version = "1.0.0"
deprecation_date = 2030-01-15
"#,
        );
        let (deps, _) = BuildpackToml.parse(file.path(), "a").unwrap();
        assert_eq!(
            deps[0].deprecation_date.unwrap().to_rfc3339(),
            "2030-01-15T00:00:00+00:00"
        );
    }

    #[test]
    fn malformed_toml_is_a_catalog_error() {
        let file = write_catalog("%%%");
        let err = BuildpackToml.parse(file.path(), "a").unwrap_err();
        assert!(matches!(err, BpsError::CatalogParse(_)));
        assert!(err.to_string().contains("failed to parse buildpack.toml"));
    }

    #[test]
    fn missing_file_is_a_catalog_error() {
        let err = BuildpackToml
            .parse(Path::new("/does/not/exist/buildpack.toml"), "a")
            .unwrap_err();
        assert!(matches!(err, BpsError::CatalogParse(_)));
    }
}
