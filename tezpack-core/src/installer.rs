// tezpack-core/src/installer.rs
// The full install sequence for one formula, strictly sequential: every step
// depends on the filesystem side effects of the previous one.
use chrono::Utc;
use tezpack_common::config::Config;
use tezpack_common::error::Result;
use tezpack_common::model::Formula;
use tracing::info;

use crate::build::env::{BuildEnvironment, HostArch};
use crate::build::{executor, source, toolchain};
use crate::command::CommandRunner;
use crate::install::{self, bottle, InstallationRecord};
use crate::receipt::{self, Receipt};
use crate::service;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Build from source even when a matching bottle is published.
    pub build_from_source: bool,
    /// Reinstall even when the same version is already present.
    pub force: bool,
}

/// Installs one formula. The record accumulates installed names across
/// formulas of the same run and is returned updated. The first failure aborts
/// with no retry and no rollback; a failed install writes no receipt and
/// registers no service, and re-running the sequence is the prescribed
/// recovery.
pub async fn install_formula(
    formula: &Formula,
    config: &Config,
    runner: &dyn CommandRunner,
    options: InstallOptions,
    mut record: InstallationRecord,
) -> Result<(InstallationRecord, Option<Receipt>)> {
    formula.validate()?;
    let version_full = formula.version_str_full();

    if !options.force {
        if let Some(existing) = receipt::load_receipt(&formula.name, config)? {
            if existing.version == version_full {
                info!(
                    "{} {} is already installed, nothing to do.",
                    formula.name, version_full
                );
                return Ok((record, None));
            }
        }
    }

    let arch = HostArch::detect()?;
    let mut built_from_source = false;
    // The record may already hold names from earlier formulas in this run;
    // the receipt only covers what this formula adds.
    let names_before = record.installed_names().len();
    let aliases_before = record.aliases().len();

    let bottle_choice = if options.build_from_source {
        None
    } else {
        let tag = bottle::current_platform_tag(arch);
        formula
            .bottle_for_platform(tag)
            .map(|sha| (tag, sha.to_string()))
    };

    match bottle_choice {
        Some((tag, sha256)) => {
            info!(
                "Installing {} {} from the {} bottle",
                formula.name, version_full, tag
            );
            record = bottle::install_from_bottle(formula, tag, &sha256, config, record).await?;
        }
        None => {
            info!("Building {} {} from source", formula.name, version_full);
            built_from_source = true;
            let source_dir = source::fetch_source(formula, config)?;
            let base_env = BuildEnvironment::new(config, &source_dir)?;
            let build_env = toolchain::bootstrap(formula, &base_env, runner, &source_dir).await?;
            for target in &formula.targets {
                let staged = executor::build_target(target, &build_env, &source_dir, runner)?;
                record = install::install_target(target, &staged, config, record)?;
            }
        }
    }

    let service_descriptor = match &formula.service {
        Some(definition) => Some(service::register_service(
            formula, definition, config, &record,
        )?),
        None => None,
    };

    install::post_install(formula, config)?;

    let receipt = Receipt {
        name: formula.name.clone(),
        version: version_full,
        binaries: record.installed_names()[names_before..].to_vec(),
        aliases: record.aliases()[aliases_before..].to_vec(),
        service_descriptor: service_descriptor.map(|d| d.descriptor_path),
        built_from_source,
        installed_at: Utc::now(),
    };
    receipt::write_receipt(&receipt, config)?;

    Ok((record, Some(receipt)))
}
