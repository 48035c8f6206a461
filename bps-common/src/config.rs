// bps-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{BpsError, Result};

/// Well-known platform root used when the lifecycle does not say otherwise.
pub const DEFAULT_PLATFORM_DIR: &str = "/platform";

const PLATFORM_DIR_ENV: &str = "CNB_PLATFORM_DIR";
const CHECKSUM_WORKERS_ENV: &str = "BPS_CHECKSUM_WORKERS";

#[derive(Debug, Clone)]
pub struct Config {
    pub platform_dir: PathBuf,
    pub checksum_workers: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading bps configuration");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup; `load` uses the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let platform_dir = lookup(PLATFORM_DIR_ENV)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                debug!(
                    "{} not set or empty, falling back to default: {}",
                    PLATFORM_DIR_ENV, DEFAULT_PLATFORM_DIR
                );
                PathBuf::from(DEFAULT_PLATFORM_DIR)
            });

        let checksum_workers = match lookup(CHECKSUM_WORKERS_ENV).filter(|s| !s.is_empty()) {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(BpsError::Config(format!(
                        "{CHECKSUM_WORKERS_ENV} must be a positive integer, got '{raw}'"
                    )))
                }
            },
            None => num_cpus::get(),
        };

        debug!(
            "Effective platform dir: {}, checksum workers: {}",
            platform_dir.display(),
            checksum_workers
        );
        Ok(Self {
            platform_dir,
            checksum_workers,
        })
    }

    pub fn platform_dir(&self) -> &Path {
        &self.platform_dir
    }

    pub fn bindings_dir(&self) -> PathBuf {
        self.platform_dir.join("bindings")
    }
}
