// tezpack/src/cli/list.rs
use clap::Args;
use colored::Colorize;
use tezpack_common::config::Config;
use tezpack_common::error::Result;
use tezpack_core::receipt;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Also list the binaries each formula installed
    #[arg(long)]
    binaries: bool,
}

impl ListArgs {
    pub fn run(&self, config: &Config) -> Result<()> {
        let receipts = receipt::list_receipts(config)?;
        if receipts.is_empty() {
            println!("No formulas installed under {}.", config.prefix().display());
            return Ok(());
        }

        for receipt in receipts {
            let origin = if receipt.built_from_source {
                "built from source"
            } else {
                "bottle"
            };
            println!(
                "{} {} ({origin})",
                receipt.name.bold(),
                receipt.version
            );
            if self.binaries {
                for binary in &receipt.binaries {
                    println!("    {binary}");
                }
                for alias in &receipt.aliases {
                    println!("    {} -> {}", alias.alias, alias.target);
                }
            }
        }
        Ok(())
    }
}
