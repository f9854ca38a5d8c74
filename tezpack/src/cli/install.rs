// tezpack/src/cli/install.rs
use clap::Args;
use colored::Colorize;
use tezpack_common::config::Config;
use tezpack_common::error::Result;
use tezpack_common::Formulary;
use tezpack_core::installer::{install_formula, InstallOptions};
use tezpack_core::{InstallationRecord, SystemRunner};
use tracing::instrument;

#[derive(Debug, Args)]
pub struct InstallArgs {
    #[arg(required = true)]
    names: Vec<String>,

    #[arg(
        long,
        help = "Force building the formula from source, even if a bottle is available"
    )]
    build_from_source: bool,

    #[arg(long, help = "Reinstall even when the same version is already present")]
    force: bool,
}

impl InstallArgs {
    #[instrument(skip(self, config), fields(targets = ?self.names))]
    pub async fn run(&self, config: &Config) -> Result<()> {
        let formulary = Formulary::new();
        let runner = SystemRunner;
        let options = InstallOptions {
            build_from_source: self.build_from_source,
            force: self.force,
        };

        // One record for the whole run, threaded through every formula so a
        // name collision between two requested formulas is caught up front.
        let mut record = InstallationRecord::new();
        for name in &self.names {
            let formula = formulary.load_formula(name)?;
            println!(
                "{}{}",
                "==> ".bold().blue(),
                format!("Installing {} {}", formula.name, formula.version_str_full()).bold()
            );

            let (next_record, receipt) =
                install_formula(&formula, config, &runner, options, record).await?;
            record = next_record;

            match receipt {
                Some(receipt) => {
                    for binary in &receipt.binaries {
                        println!("    {binary}");
                    }
                    println!(
                        "{}{}",
                        "==> ".bold().blue(),
                        format!("Installed {} {}", receipt.name, receipt.version).bold()
                    );
                }
                None => {
                    println!(
                        "{} {} is already installed.",
                        formula.name,
                        formula.version_str_full()
                    );
                }
            }
        }
        Ok(())
    }
}
