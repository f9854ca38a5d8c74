// tezpack-core/src/build/env.rs
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tracing::debug;

/// Host build architecture. Resolution fails fast rather than guessing; a
/// wrong guess here would fetch the wrong toolchain installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostArch {
    Arm64,
    X86_64,
}

impl HostArch {
    pub fn detect() -> Result<Self> {
        match env::consts::ARCH {
            "aarch64" => Ok(Self::Arm64),
            "x86_64" => Ok(Self::X86_64),
            other => Err(TezpackError::BuildEnvError(format!(
                "Unsupported build host architecture '{other}'"
            ))),
        }
    }

    /// Label used in architecture-specific download URLs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Arm64 => "arm64",
            Self::X86_64 => "x86_64",
        }
    }
}

/// Immutable environment overlay for the bootstrap and build steps. The
/// ambient process environment is never mutated; every external command gets
/// the overlay applied to its own invocation only, so concurrent installs in
/// separate processes (or, one day, in one) cannot interfere.
#[derive(Debug, Clone)]
pub struct BuildEnvironment {
    vars: HashMap<String, String>,
    path_prepends: Vec<PathBuf>,
    arch: HostArch,
}

impl BuildEnvironment {
    pub fn new(config: &Config, source_dir: &Path) -> Result<Self> {
        let arch = HostArch::detect()?;
        debug!(
            "Preparing build environment for checkout {} ({})",
            source_dir.display(),
            arch.label()
        );

        let mut vars = HashMap::new();
        // The upstream build does not tolerate high build parallelism; trade
        // wall-clock time for reproducibility and bounded memory.
        vars.insert("MAKEFLAGS".to_string(), "-j1".to_string());
        // Toolchain state is confined to the checkout so concurrent formula
        // builds on the same host never touch shared global state.
        vars.insert(
            "CARGO_HOME".to_string(),
            source_dir.join(".cargo").to_string_lossy().to_string(),
        );
        vars.insert(
            "RUSTUP_HOME".to_string(),
            source_dir.join(".rustup").to_string_lossy().to_string(),
        );
        vars.insert(
            "OPAMROOT".to_string(),
            source_dir.join(".opam").to_string_lossy().to_string(),
        );
        // Keep bls12-381 off the ADX extension so produced binaries run on
        // older CPUs than the build host.
        vars.insert("BLST_PORTABLE".to_string(), "yes".to_string());
        // Prefer libraries from the installation prefix over system copies.
        vars.insert(
            "LDFLAGS".to_string(),
            format!("-L{}", config.lib_dir().display()),
        );

        Ok(Self {
            vars,
            path_prepends: Vec::new(),
            arch,
        })
    }

    pub fn arch(&self) -> HostArch {
        self.arch
    }

    /// Returns a copy with `dir` placed first on the search path. The
    /// receiver is left untouched.
    pub fn with_path_prepended(&self, dir: &Path) -> Self {
        let mut next = self.clone();
        next.path_prepends.insert(0, dir.to_path_buf());
        next
    }

    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The search path visible to commands run under this environment.
    pub fn path_string(&self) -> String {
        let ambient = env::var("PATH").unwrap_or_default();
        if self.path_prepends.is_empty() {
            return ambient;
        }
        let mut parts: Vec<PathBuf> = self.path_prepends.clone();
        parts.extend(env::split_paths(&ambient));
        env::join_paths(parts)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or(ambient)
    }

    /// Final overlay to apply to a command: the pinned variables plus a
    /// recomputed PATH when any directory was prepended.
    pub fn env_overlay(&self) -> HashMap<String, String> {
        let mut overlay = self.vars.clone();
        if !self.path_prepends.is_empty() {
            overlay.insert("PATH".to_string(), self.path_string());
        }
        overlay
    }
}
