// tezpack/src/cli.rs
use clap::{Parser, Subcommand};
use tezpack_common::config::Config;
use tezpack_common::error::Result;

pub mod info;
pub mod init;
pub mod install;
pub mod list;

#[derive(Parser, Debug)]
#[command(name = "tezpack", version, about = "Installer for Octez binaries")]
pub struct CliArgs {
    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install one or more formulas
    Install(install::InstallArgs),
    /// List installed formulas
    List(list::ListArgs),
    /// Show a formula's record
    Info(info::InfoArgs),
    /// Create the installation prefix layout
    Init(init::InitArgs),
}

impl Command {
    pub async fn run(&self, config: &Config) -> Result<()> {
        match self {
            Command::Install(args) => args.run(config).await,
            Command::List(args) => args.run(config),
            Command::Info(args) => args.run(config),
            Command::Init(args) => args.run(config),
        }
    }
}
