// tezpack-core/src/build/executor.rs
use std::path::{Path, PathBuf};

use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::BuildTarget;
use tracing::debug;

use crate::build::env::BuildEnvironment;
use crate::command::{run_checked, CommandRunner, CommandSpec};

/// Builds one target and stages the produced binary at the checkout root
/// under its installed name. Activation of the opam environment does not
/// persist across processes, so activate + build + stage share one shell.
pub fn build_target(
    target: &BuildTarget,
    env: &BuildEnvironment,
    source_dir: &Path,
    runner: &dyn CommandRunner,
) -> Result<PathBuf> {
    debug!(
        "Building target {} ({})",
        target.installed_name, target.build_path
    );

    let script = format!(
        "eval $(opam env) && dune build {} && cp {} {}",
        target.build_path, target.artifact_path, target.installed_name
    );
    run_checked(
        runner,
        &CommandSpec::shell(script)
            .current_dir(source_dir)
            .envs(env.env_overlay()),
        &format!("build of {}", target.installed_name),
    )?;

    let staged = source_dir.join(&target.installed_name);
    if !staged.is_file() {
        // The build tool reported success but did not produce the artifact;
        // that is a broken contract, not a user error.
        return Err(TezpackError::InstallError(format!(
            "Build of '{}' reported success but staged artifact {} is missing",
            target.installed_name,
            staged.display()
        )));
    }

    debug!("Staged artifact at {}", staged.display());
    Ok(staged)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::Mutex;

    use super::*;
    use crate::command::CommandOutput;

    struct ScriptedRunner {
        stage_artifact: bool,
        status: i32,
        seen: Mutex<Vec<CommandSpec>>,
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            self.seen.lock().unwrap().push(spec.clone());
            if self.stage_artifact {
                let cwd = spec.cwd.clone().unwrap();
                fs::write(cwd.join("octez-dal-node"), b"binary").unwrap();
            }
            Ok(CommandOutput {
                status: Some(self.status),
                stdout: String::new(),
                stderr: "dune: fatal error".to_string(),
            })
        }
    }

    fn target() -> BuildTarget {
        BuildTarget {
            build_path: "src/bin_dal_node/main.exe".to_string(),
            artifact_path: "_build/default/src/bin_dal_node/main.exe".to_string(),
            installed_name: "octez-dal-node".to_string(),
        }
    }

    fn env(dir: &Path) -> BuildEnvironment {
        let config = tezpack_common::Config {
            prefix: dir.to_path_buf(),
        };
        BuildEnvironment::new(&config, dir).unwrap()
    }

    #[test]
    fn compound_command_activates_builds_and_stages() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            stage_artifact: true,
            status: 0,
            seen: Mutex::new(Vec::new()),
        };
        let staged = build_target(&target(), &env(tmp.path()), tmp.path(), &runner).unwrap();
        assert_eq!(staged, tmp.path().join("octez-dal-node"));

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let script = &seen[0].args[1];
        assert!(script.starts_with("eval $(opam env) && "));
        assert!(script.contains("dune build src/bin_dal_node/main.exe"));
        assert!(script.ends_with("cp _build/default/src/bin_dal_node/main.exe octez-dal-node"));
    }

    #[test]
    fn nonzero_exit_aborts_with_tool_diagnostics() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            stage_artifact: false,
            status: 1,
            seen: Mutex::new(Vec::new()),
        };
        let err = build_target(&target(), &env(tmp.path()), tmp.path(), &runner).unwrap_err();
        assert!(err.to_string().contains("dune: fatal error"));
        assert!(!tmp.path().join("octez-dal-node").exists());
    }

    #[test]
    fn missing_staged_artifact_is_a_broken_contract() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner {
            stage_artifact: false,
            status: 0,
            seen: Mutex::new(Vec::new()),
        };
        let err = build_target(&target(), &env(tmp.path()), tmp.path(), &runner).unwrap_err();
        assert!(matches!(err, TezpackError::InstallError(_)));
    }
}
