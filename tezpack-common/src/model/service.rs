use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Shape of the generated startup wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WrapperKind {
    /// Self-configuring daemon: `config init` on first run, `config update`
    /// afterwards, then exec the binary's `run` subcommand.
    Daemon,
    /// Rollup node: re-initialize the rollup config on every start
    /// (`init <mode> config ... --force`), then exec `run <mode> for <alias>`.
    Rollup,
}

/// Declarative service block of a formula. The Service Registrar turns this
/// into a wrapper script plus a supervisor descriptor after the binaries are
/// in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub wrapper: WrapperKind,
    /// The installed binary the wrapper drives. Must name one of the
    /// formula's build targets.
    pub run: String,
    /// Default environment for the supervised process. Values starting with
    /// `var/` are resolved against the installation prefix at registration
    /// time.
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(default)]
    pub keep_alive: bool,
    #[serde(default)]
    pub require_root: bool,
    pub log_path: String,
    pub error_log_path: String,
}
