// bps-common/src/dependency.rs
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A single entry of a buildpack dependency catalog.
///
/// Several entries may share an `id`; they differ by version and/or stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub id: String,
    pub version: String,
    pub stacks: Vec<String>,
    pub uri: String,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation_date: Option<DateTime<Utc>>,
}

impl Dependency {
    pub fn supports_stack(&self, stack: &str) -> bool {
        self.stacks.iter().any(|s| s == stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_membership_is_exact() {
        let dep = Dependency {
            id: "node".to_string(),
            version: "18.0.0".to_string(),
            stacks: vec!["io.buildpacks.stacks.jammy".to_string()],
            uri: "https://example.com/node.tgz".to_string(),
            sha256: "abc".to_string(),
            deprecation_date: None,
        };
        assert!(dep.supports_stack("io.buildpacks.stacks.jammy"));
        assert!(!dep.supports_stack("io.buildpacks.stacks"));
    }
}
