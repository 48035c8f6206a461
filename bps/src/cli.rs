// bps/src/cli.rs
//! Defines the command-line argument structure using clap.
use bps_common::config::Config;
use bps_common::error::Result;
use clap::{ArgAction, Parser, Subcommand};

pub mod checksum;
pub mod deliver;
pub mod resolve;

use crate::cli::checksum::Checksum;
use crate::cli::deliver::Deliver;
use crate::cli::resolve::Resolve;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, name = "bps", bin_name = "bps")]
#[command(propagate_version = true)]
pub struct CliArgs {
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Resolve(Resolve),
    Deliver(Deliver),
    Checksum(Checksum),
}

impl Command {
    pub fn run(&self, config: &Config) -> Result<()> {
        match self {
            Self::Resolve(command) => command.run(config),
            Self::Deliver(command) => command.run(config),
            Self::Checksum(command) => command.run(config),
        }
    }
}
