use std::path::PathBuf;

use bps_aio::checksum::ChecksumCalculator;
use bps_common::config::Config;
use bps_common::error::Result;
use clap::Args;
use tracing::debug;

#[derive(Args, Debug)]
pub struct Checksum {
    /// Files or directories to hash; several inputs are hashed together
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

impl Checksum {
    pub fn run(&self, config: &Config) -> Result<()> {
        let calculator = ChecksumCalculator::with_workers(config.checksum_workers);
        debug!(
            "Hashing {} input(s) with {} workers",
            self.paths.len(),
            calculator.workers()
        );
        let sum = match self.paths.as_slice() {
            [single] => calculator.sum(single)?,
            many => calculator.sum_multiple(many)?,
        };
        println!("{sum}");
        Ok(())
    }
}
