// tezpack-core/src/build/source.rs
// Fetches a formula's source tree: a full clone of the pinned tag.
use std::fs;
use std::path::PathBuf;

use git2::Repository;
use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::Formula;
use tracing::{debug, error};

/// Clones the formula's source repository at its pinned tag, or reuses an
/// existing checkout. The clone is never shallow: the upstream build derives
/// version information from repository tags.
pub fn fetch_source(formula: &Formula, config: &Config) -> Result<PathBuf> {
    let dest = config.source_checkout_path(&formula.name, &formula.source.tag);
    if dest.join(".git").exists() {
        debug!("Reusing existing source checkout at {}", dest.display());
        return Ok(dest);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    debug!(
        "Cloning {} (tag {}) into {}",
        formula.source.url,
        formula.source.tag,
        dest.display()
    );
    let repo = Repository::clone(&formula.source.url, &dest).map_err(|e| {
        error!("Failed to clone {}: {}", formula.source.url, e);
        TezpackError::Git(format!(
            "Failed to clone {}: {}",
            formula.source.url, e
        ))
    })?;

    let object = repo.revparse_single(&formula.source.tag).map_err(|e| {
        TezpackError::Git(format!(
            "Tag '{}' not found in {}: {}",
            formula.source.tag, formula.source.url, e
        ))
    })?;
    let commit = object.peel_to_commit().map_err(|e| {
        TezpackError::Git(format!(
            "Tag '{}' does not point at a commit: {}",
            formula.source.tag, e
        ))
    })?;

    repo.checkout_tree(&object, Some(git2::build::CheckoutBuilder::default().force()))
        .map_err(|e| {
            TezpackError::Git(format!(
                "Failed to check out tag '{}': {}",
                formula.source.tag, e
            ))
        })?;
    repo.set_head_detached(commit.id()).map_err(|e| {
        TezpackError::Git(format!(
            "Failed to detach HEAD at tag '{}': {}",
            formula.source.tag, e
        ))
    })?;

    debug!("Checked out {} at {}", formula.source.tag, commit.id());
    Ok(dest)
}
