// tezpack-core/src/receipt.rs
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tezpack_common::config::Config;
use tezpack_common::error::Result;
use tracing::{debug, warn};

use crate::install::AliasEntry;

/// What a successful install left behind. A failed install writes no receipt,
/// so re-running the whole sequence is the recovery path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub name: String,
    /// Full version string including the packaging revision.
    pub version: String,
    pub binaries: Vec<String>,
    pub aliases: Vec<AliasEntry>,
    pub service_descriptor: Option<PathBuf>,
    pub built_from_source: bool,
    pub installed_at: DateTime<Utc>,
}

pub fn write_receipt(receipt: &Receipt, config: &Config) -> Result<()> {
    fs::create_dir_all(config.receipts_dir())?;
    let path = config.receipt_path(&receipt.name);
    let json = serde_json::to_string_pretty(receipt)?;
    fs::write(&path, json)?;
    debug!("Wrote install receipt {}", path.display());
    Ok(())
}

pub fn load_receipt(name: &str, config: &Config) -> Result<Option<Receipt>> {
    let path = config.receipt_path(name);
    if !path.is_file() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&raw)?))
}

pub fn list_receipts(config: &Config) -> Result<Vec<Receipt>> {
    let dir = config.receipts_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut receipts = Vec::new();
    for entry in fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let raw = fs::read_to_string(&path)?;
        match serde_json::from_str::<Receipt>(&raw) {
            Ok(receipt) => receipts.push(receipt),
            Err(e) => warn!("Skipping unreadable receipt {}: {}", path.display(), e),
        }
    }
    receipts.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> Receipt {
        Receipt {
            name: name.to_string(),
            version: "v17.3-1".to_string(),
            binaries: vec!["octez-accuser-PtNairob".to_string()],
            aliases: vec![AliasEntry {
                alias: "tezos-accuser-PtNairob".to_string(),
                target: "octez-accuser-PtNairob".to_string(),
            }],
            service_descriptor: None,
            built_from_source: true,
            installed_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().to_path_buf(),
        };
        write_receipt(&sample("tezos-accuser-PtNairob"), &config).unwrap();

        let loaded = load_receipt("tezos-accuser-PtNairob", &config)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version, "v17.3-1");
        assert_eq!(loaded.binaries, ["octez-accuser-PtNairob"]);
    }

    #[test]
    fn missing_receipt_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().to_path_buf(),
        };
        assert!(load_receipt("tezos-dal-node", &config).unwrap().is_none());
    }

    #[test]
    fn listing_sorts_by_name_and_skips_junk() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config {
            prefix: tmp.path().to_path_buf(),
        };
        write_receipt(&sample("tezos-dal-node"), &config).unwrap();
        write_receipt(&sample("tezos-accuser-PtNairob"), &config).unwrap();
        fs::write(config.receipts_dir().join("broken.json"), b"not json").unwrap();

        let names: Vec<String> = list_receipts(&config)
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, ["tezos-accuser-PtNairob", "tezos-dal-node"]);
    }
}
