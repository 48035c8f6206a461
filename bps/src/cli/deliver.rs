use std::path::{Path, PathBuf};

use bps_aio::extract::ArchiveFormat;
use bps_common::config::Config;
use bps_common::error::Result;
use bps_core::Service;
use bps_net::transport::DefaultTransport;
use clap::{Args, ValueEnum};
use tracing::{debug, info};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum FormatArg {
    Tar,
    Tgz,
    Txz,
    Zip,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Tar => ArchiveFormat::Tar,
            FormatArg::Tgz => ArchiveFormat::TarGzip,
            FormatArg::Txz => ArchiveFormat::TarXz,
            FormatArg::Zip => ArchiveFormat::Zip,
        }
    }
}

#[derive(Args, Debug)]
#[command(disable_version_flag = true)]
pub struct Deliver {
    /// Path to the buildpack.toml holding the dependency catalog
    pub catalog: PathBuf,
    /// Dependency id to deliver
    pub id: String,
    /// Layer directory to extract into
    #[arg(long)]
    pub layer: PathBuf,
    /// Version constraint; empty or "default" uses the catalog default
    #[arg(long, default_value = "default")]
    pub version: String,
    /// Stack the dependency must support
    #[arg(long)]
    pub stack: String,
    /// Buildpack root for local URIs (defaults to the catalog's directory)
    #[arg(long)]
    pub cnb_path: Option<PathBuf>,
    /// Platform directory holding bindings (defaults to $CNB_PLATFORM_DIR)
    #[arg(long)]
    pub platform: Option<PathBuf>,
    /// Archive format; derived from the URI when omitted
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
}

impl Deliver {
    pub fn run(&self, config: &Config) -> Result<()> {
        let service = Service::new(DefaultTransport::new());
        let dependency = service.resolve(&self.catalog, &self.id, &self.version, &self.stack)?;

        let cnb_path = self.cnb_path.clone().unwrap_or_else(|| {
            self.catalog
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        });
        let platform = self
            .platform
            .as_deref()
            .unwrap_or_else(|| config.platform_dir());
        debug!(
            "Delivering with cnb path {} and platform {}",
            cnb_path.display(),
            platform.display()
        );

        match self.format {
            Some(format) => service.deliver_with_format(
                &dependency,
                format.into(),
                &cnb_path,
                &self.layer,
                platform,
            )?,
            None => service.deliver(&dependency, &cnb_path, &self.layer, platform)?,
        }

        info!(
            "Installed {} {} into {}",
            dependency.id,
            dependency.version,
            self.layer.display()
        );
        Ok(())
    }
}
