use std::path::PathBuf;

use bps_common::config::Config;
use bps_common::error::Result;
use bps_core::Service;
use bps_net::transport::DefaultTransport;
use clap::Args;
use tracing::debug;

#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct Resolve {
    /// Path to the buildpack.toml holding the dependency catalog
    pub catalog: PathBuf,
    /// Dependency id to resolve
    pub id: String,
    /// Version constraint; empty or "default" uses the catalog default
    #[arg(long, default_value = "default")]
    pub version: String,
    /// Stack the dependency must support
    #[arg(long)]
    pub stack: String,
}

impl Resolve {
    pub fn run(&self, _config: &Config) -> Result<()> {
        debug!(
            "Resolving {} {} for stack {} from {}",
            self.id,
            self.version,
            self.stack,
            self.catalog.display()
        );
        let dependency = Service::new(DefaultTransport::new()).resolve(
            &self.catalog,
            &self.id,
            &self.version,
            &self.stack,
        )?;
        println!("{}", serde_json::to_string_pretty(&dependency)?);
        Ok(())
    }
}
