// bps-core/src/resolver.rs
// Picks the catalog entry that satisfies a requested version.

use bps_common::dependency::Dependency;
use bps_common::error::{BpsError, Result};
use semver::Version;
use tracing::debug;

use crate::constraint::{parse_version_lenient, Constraint};

/// Resolves `version` for `id` on `stack` against a parsed catalog.
///
/// `""` and `"default"` select the catalog's declared default for `id`, or
/// any version when none is declared. A leading `~>` is rewritten to `~`
/// for three-part versions and `^` otherwise. Every record for `id` and
/// `stack` must carry a valid version, matching or not. Among compatible
/// records the highest version wins; the first one listed breaks ties.
pub fn resolve(
    dependencies: &[Dependency],
    default_version: Option<&str>,
    id: &str,
    version: &str,
    stack: &str,
) -> Result<Dependency> {
    let requested = normalize(version, default_version);
    let requested = rewrite_pessimistic(&requested);
    debug!(
        "Resolving {} for stack {} with constraint {:?}",
        id, stack, requested
    );
    let constraint = Constraint::parse(&requested)?;

    let mut supported = Vec::new();
    let mut best: Option<(Version, &Dependency)> = None;
    for dependency in dependencies
        .iter()
        .filter(|d| d.id == id && d.supports_stack(stack))
    {
        let parsed = parse_version_lenient(&dependency.version)?;
        supported.push(dependency.version.clone());
        if !constraint.matches(&parsed) {
            continue;
        }
        if best.as_ref().map_or(true, |(current, _)| parsed > *current) {
            best = Some((parsed, dependency));
        }
    }

    match best {
        Some((_, dependency)) => {
            debug!("Resolved {} to version {}", id, dependency.version);
            Ok(dependency.clone())
        }
        None => Err(BpsError::NoCompatibleVersion {
            id: id.to_string(),
            constraint: requested,
            supported,
        }),
    }
}

fn normalize(version: &str, default_version: Option<&str>) -> String {
    let version = if version.is_empty() { "default" } else { version };
    if version != "default" {
        return version.to_string();
    }
    match default_version {
        Some(default) if !default.is_empty() => default.to_string(),
        _ => "*".to_string(),
    }
}

/// Rewrites the pessimistic `~>` operator: `~> 1.2.3` becomes `~1.2.3`,
/// `~> 1.2` becomes `^1.2`.
pub fn rewrite_pessimistic(version: &str) -> String {
    let Some(rest) = version.trim().strip_prefix("~>") else {
        return version.to_string();
    };
    let rest = rest.trim();
    if rest.split('.').count() == 3 {
        format!("~{rest}")
    } else {
        format!("^{rest}")
    }
}
