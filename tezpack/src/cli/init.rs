// tezpack/src/cli/init.rs
use std::fs;

use clap::Args;
use colored::Colorize;
use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tracing::debug;

#[derive(Debug, Args)]
pub struct InitArgs {}

impl InitArgs {
    /// Creates the prefix skeleton. Idempotent; existing directories are left
    /// alone.
    pub fn run(&self, config: &Config) -> Result<()> {
        let dirs = [
            config.bin_dir(),
            config.cache_dir(),
            config.log_dir(),
            config.services_dir(),
            config.receipts_dir(),
        ];
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|e| {
                TezpackError::Config(format!(
                    "Failed to create {}: {} (try re-running with sudo)",
                    dir.display(),
                    e
                ))
            })?;
            debug!("Ensured directory {}", dir.display());
        }
        println!(
            "{}{}",
            "==> ".bold().blue(),
            format!("Initialized tezpack prefix at {}", config.prefix().display()).bold()
        );
        Ok(())
    }
}
