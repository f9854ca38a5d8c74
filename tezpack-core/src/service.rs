// tezpack-core/src/service.rs
// Service registration: generated startup wrappers plus the supervisor
// descriptor (a launchd property list).
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use tezpack_common::config::Config;
use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::{Formula, ServiceDefinition, WrapperKind};
use tracing::debug;

use crate::install::{brand_alias, InstallationRecord};

/// The registered service as handed to the external supervisor.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub run_command: PathBuf,
    pub environment: BTreeMap<String, String>,
    pub keep_alive: bool,
    pub requires_root: bool,
    pub log_path: PathBuf,
    pub error_log_path: PathBuf,
    /// Where the rendered plist was written.
    pub descriptor_path: PathBuf,
}

/// Wrapper script file name: the brand-alias spelling plus `-start`.
pub fn wrapper_name(run_target: &str) -> String {
    format!("{}-start", brand_alias(run_target))
}

/// Renders the startup wrapper. Both shapes run under strict mode, perform
/// their idempotent self-configuration, and end by replacing themselves with
/// the real binary so the supervisor tracks the daemon, not a shell. A failed
/// config step exits non-zero and leaves restarting to the supervisor.
pub fn render_wrapper(definition: &ServiceDefinition, bin_dir: &Path) -> String {
    let binary = bin_dir.join(&definition.run);
    match definition.wrapper {
        WrapperKind::Daemon => format!(
            r#"#!/usr/bin/env bash

set -euo pipefail

daemon="{binary}"

daemon_config="$TEZOS_CLIENT_DIR/config"
mkdir -p "$TEZOS_CLIENT_DIR"

if [ ! -f "$daemon_config" ]; then
    "$daemon" --endpoint "$NODE_RPC_SCHEME://$NODE_RPC_ADDR" \
              config init --output "$daemon_config" >/dev/null 2>&1
else
    "$daemon" --endpoint "$NODE_RPC_SCHEME://$NODE_RPC_ADDR" \
              config update >/dev/null 2>&1
fi

exec "$daemon" --endpoint "$NODE_RPC_SCHEME://$NODE_RPC_ADDR" run
"#,
            binary = binary.display()
        ),
        WrapperKind::Rollup => format!(
            r#"#!/usr/bin/env bash

set -euo pipefail

node="{binary}"

"$node" init "$ROLLUP_MODE" config \
    for "$ROLLUP_ALIAS" \
    --rpc-addr "$ROLLUP_NODE_RPC_ENDPOINT" \
    --force

exec "$node" --endpoint "$NODE_RPC_SCHEME://$NODE_RPC_ADDR" \
    run "$ROLLUP_MODE" for "$ROLLUP_ALIAS"
"#,
            binary = binary.display()
        ),
    }
}

/// Registers a formula's service. Must run strictly after the install mapper:
/// the wrapper refuses to reference a binary this run did not place.
pub fn register_service(
    formula: &Formula,
    definition: &ServiceDefinition,
    config: &Config,
    record: &InstallationRecord,
) -> Result<ServiceDescriptor> {
    if !record.contains(&definition.run) {
        return Err(TezpackError::Service(format!(
            "Service for '{}' runs '{}', but that binary was not installed in this run",
            formula.name, definition.run
        )));
    }

    let bin_dir = config.bin_dir();
    let wrapper_path = bin_dir.join(wrapper_name(&definition.run));
    fs::write(&wrapper_path, render_wrapper(definition, &bin_dir))?;
    let mut perms = fs::metadata(&wrapper_path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&wrapper_path, perms)?;
    debug!("Installed service wrapper {}", wrapper_path.display());

    let environment: BTreeMap<String, String> = definition
        .environment_variables
        .iter()
        .map(|(key, value)| (key.clone(), resolve_env_value(value, config)))
        .collect();

    let log_path = config.prefix().join(&definition.log_path);
    let error_log_path = config.prefix().join(&definition.error_log_path);
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::create_dir_all(config.services_dir())?;

    let descriptor_path = config.service_plist_path(&formula.name);
    let mut dict = Dictionary::new();
    dict.insert(
        "Label".to_string(),
        Value::String(format!("tezpack.{}", formula.name)),
    );
    dict.insert(
        "ProgramArguments".to_string(),
        Value::Array(vec![Value::String(wrapper_path.display().to_string())]),
    );
    dict.insert("RunAtLoad".to_string(), Value::Boolean(true));
    dict.insert("KeepAlive".to_string(), Value::Boolean(definition.keep_alive));
    if definition.require_root {
        dict.insert("UserName".to_string(), Value::String("root".to_string()));
    }
    let mut env_dict = Dictionary::new();
    for (key, value) in &environment {
        env_dict.insert(key.clone(), Value::String(value.clone()));
    }
    dict.insert(
        "EnvironmentVariables".to_string(),
        Value::Dictionary(env_dict),
    );
    dict.insert(
        "StandardOutPath".to_string(),
        Value::String(log_path.display().to_string()),
    );
    dict.insert(
        "StandardErrorPath".to_string(),
        Value::String(error_log_path.display().to_string()),
    );

    Value::Dictionary(dict)
        .to_file_xml(&descriptor_path)
        .map_err(|e| {
            TezpackError::Service(format!(
                "Failed to write service descriptor {}: {}",
                descriptor_path.display(),
                e
            ))
        })?;
    debug!("Registered service descriptor {}", descriptor_path.display());

    Ok(ServiceDescriptor {
        run_command: wrapper_path,
        environment,
        keep_alive: definition.keep_alive,
        requires_root: definition.require_root,
        log_path,
        error_log_path,
        descriptor_path,
    })
}

/// Default values beginning with `var/` are relative to the installation
/// prefix; everything else is literal.
fn resolve_env_value(value: &str, config: &Config) -> String {
    if value.starts_with("var/") {
        config.prefix().join(value).to_string_lossy().to_string()
    } else {
        value.to_string()
    }
}
