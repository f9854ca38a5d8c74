// ===== tezpack-core/src/install/mod.rs =====
use std::fs;
use std::os::unix::fs as unix_fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::{BuildTarget, Formula};
use tracing::debug;

pub mod bottle;

/// Brand-alias link created next to an installed binary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AliasEntry {
    pub alias: String,
    pub target: String,
}

/// The names installed so far in the current run. Passed by value through the
/// install mapper and returned updated, so nothing outlives the run and the
/// mapper stays pure with respect to its inputs.
#[derive(Debug, Clone, Default)]
pub struct InstallationRecord {
    installed: Vec<String>,
    aliases: Vec<AliasEntry>,
}

impl InstallationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a binary name for this run. Colliding names are a configuration
    /// error, detected before any file is copied.
    pub fn register(&mut self, name: &str) -> Result<()> {
        if self.installed.iter().any(|n| n == name) {
            return Err(TezpackError::ValidationError(format!(
                "Binary name '{name}' was already installed in this run"
            )));
        }
        self.installed.push(name.to_string());
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.installed.iter().any(|n| n == name)
    }

    pub fn installed_names(&self) -> &[String] {
        &self.installed
    }

    pub fn aliases(&self) -> &[AliasEntry] {
        &self.aliases
    }
}

/// Derives the alternate brand spelling of an installed name by swapping the
/// vendor token ("octez" -> "tezos"). A name without the token aliases to
/// itself; callers treat that as "no alias to create".
pub fn brand_alias(name: &str) -> String {
    name.replace("octez", "tezos")
}

/// Moves one staged binary into the installation bin directory and links its
/// brand alias. The name is registered before the move so a collision never
/// clobbers an existing file.
pub fn install_binary(
    installed_name: &str,
    staged_path: &Path,
    config: &Config,
    mut record: InstallationRecord,
) -> Result<InstallationRecord> {
    let bin_dir = config.bin_dir();
    fs::create_dir_all(&bin_dir)?;

    record.register(installed_name)?;

    let dest = bin_dir.join(installed_name);
    move_file(staged_path, &dest)?;
    let mut perms = fs::metadata(&dest)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&dest, perms)?;
    debug!(
        "Installed {} -> {}",
        staged_path.display(),
        dest.display()
    );

    let alias = brand_alias(installed_name);
    if alias != installed_name {
        let link = bin_dir.join(&alias);
        remove_existing_link_target(&link)?;
        unix_fs::symlink(&dest, &link)?;
        debug!("  Linked alias: {} -> {}", link.display(), dest.display());
        record.aliases.push(AliasEntry {
            alias,
            target: installed_name.to_string(),
        });
    }

    Ok(record)
}

pub fn install_target(
    target: &BuildTarget,
    staged_path: &Path,
    config: &Config,
    record: InstallationRecord,
) -> Result<InstallationRecord> {
    install_binary(&target.installed_name, staged_path, config, record)
}

/// Post-install hook: the state directories the installed binaries expect on
/// first run. Idempotent; existing state is never touched.
pub fn post_install(formula: &Formula, config: &Config) -> Result<()> {
    for dir in &formula.post_install {
        let path = config.prefix().join(dir);
        debug!("Ensuring state directory {}", path.display());
        fs::create_dir_all(&path)?;
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Cross-device move (cache and prefix on different filesystems).
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)?;
            Ok(())
        }
    }
}

fn remove_existing_link_target(path: &Path) -> Result<()> {
    if fs::symlink_metadata(path).is_ok() {
        fs::remove_file(path)?;
    }
    Ok(())
}
