// tezpack-common/src/config.rs
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::Result;

// Fallback if TEZPACK_PREFIX is not set or is empty.
const DEFAULT_FALLBACK_PREFIX: &str = "/opt/tezpack";

#[derive(Debug, Clone)]
pub struct Config {
    pub prefix: PathBuf, // Public for direct construction in tests and `init`
}

impl Config {
    pub fn load() -> Result<Self> {
        debug!("Loading tezpack configuration");

        let prefix_str = env::var("TEZPACK_PREFIX")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                debug!(
                    "TEZPACK_PREFIX environment variable not set or empty, falling back to default: {}",
                    DEFAULT_FALLBACK_PREFIX
                );
                DEFAULT_FALLBACK_PREFIX.to_string()
            });

        let prefix = PathBuf::from(&prefix_str);
        debug!("Effective prefix set to: {}", prefix.display());

        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// The installation binary directory: one file per installed binary plus
    /// its brand-alias symlink.
    pub fn bin_dir(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.prefix.join("lib")
    }

    pub fn var_dir(&self) -> PathBuf {
        self.prefix.join("var")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.var_dir().join("log")
    }

    /// Emitted service descriptors live here, one plist per registered service.
    pub fn services_dir(&self) -> PathBuf {
        self.var_dir().join("services")
    }

    /// Persistent client state shared by the installed daemons.
    pub fn client_state_dir(&self) -> PathBuf {
        self.var_dir().join("lib/tezos/client")
    }

    pub fn receipts_dir(&self) -> PathBuf {
        self.var_dir().join("tezpack/receipts")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.prefix.join("cache")
    }

    pub fn bottle_cache_dir(&self) -> PathBuf {
        self.cache_dir().join("bottles")
    }

    /// Per-formula source checkout. Keyed by tag so a version bump gets a
    /// fresh tree while re-runs of the same install reuse the old one.
    pub fn source_checkout_path(&self, formula_name: &str, tag: &str) -> PathBuf {
        self.cache_dir().join("src").join(format!("{formula_name}-{tag}"))
    }

    pub fn receipt_path(&self, formula_name: &str) -> PathBuf {
        self.receipts_dir().join(format!("{formula_name}.json"))
    }

    pub fn service_plist_path(&self, formula_name: &str) -> PathBuf {
        self.services_dir()
            .join(format!("tezpack.{formula_name}.plist"))
    }
}

pub fn load_config() -> Result<Config> {
    Config::load()
}
