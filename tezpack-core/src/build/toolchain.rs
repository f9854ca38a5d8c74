// tezpack-core/src/build/toolchain.rs
// Idempotent bootstrap of the two pinned toolchains: rust (via rustup) and
// opam. The opam pin to an old major is a hard compatibility constraint; the
// upstream build breaks against opam >= 2.1.
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tezpack_common::error::{Result, TezpackError};
use tezpack_common::model::Formula;
use tracing::debug;

use crate::build::env::BuildEnvironment;
use crate::command::{run_checked, CommandRunner, CommandSpec};

/// Directory inside the checkout holding the pinned opam binary, isolated
/// from any opam the host may already have.
pub const OPAM_BIN_DIR: &str = ".opam-bin";

/// Ensures both pinned toolchains are present and initialized. Safe to run
/// again on an already-bootstrapped checkout: the opam download is
/// skip-if-present and the init steps are re-initializations the external
/// tools treat as no-ops. Any step failing aborts the whole chain.
pub async fn bootstrap(
    formula: &Formula,
    env: &BuildEnvironment,
    runner: &dyn CommandRunner,
    source_dir: &Path,
) -> Result<BuildEnvironment> {
    let opam_dir = source_dir.join(OPAM_BIN_DIR);
    let opam_bin = opam_dir.join("opam");

    if opam_bin.is_file() {
        debug!(
            "opam {} already present at {}, skipping download",
            formula.toolchain.opam,
            opam_bin.display()
        );
    } else {
        tezpack_net::fetch_opam_installer(
            &formula.toolchain.opam,
            env.arch().label(),
            &opam_dir,
        )
        .await?;
        let mut perms = fs::metadata(&opam_bin)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&opam_bin, perms)?;
        debug!("Installed opam {} at {}", formula.toolchain.opam, opam_bin.display());
    }

    // Every later step must see the pinned opam first on the search path.
    // The overlay keeps that scoped to this install run.
    let env = env.with_path_prepended(&opam_dir);
    let overlay = env.env_overlay();

    which::which_in("rustup-init", Some(env.path_string()), source_dir).map_err(|_| {
        TezpackError::BuildEnvError(
            "rustup-init not found in the build environment PATH (is the rustup-init build dependency installed?)"
                .to_string(),
        )
    })?;

    run_checked(
        runner,
        &CommandSpec::new("rustup-init")
            .arg("--default-toolchain")
            .arg(formula.toolchain.rust.as_str())
            .arg("-y")
            .arg("--no-modify-path")
            .current_dir(source_dir)
            .envs(overlay.clone()),
        "rustup-init",
    )?;

    // --disable-sandboxing: the build already runs inside a sandboxed
    // packaging environment, and opam's own sandbox nests badly there.
    run_checked(
        runner,
        &CommandSpec::new("opam")
            .arg("init")
            .arg("--bare")
            .arg("--debug")
            .arg("--auto-setup")
            .arg("--disable-sandboxing")
            .current_dir(source_dir)
            .envs(overlay.clone()),
        "opam init",
    )?;

    // The project's own build-dependency entry point, run with both
    // toolchains activated in a single shell.
    run_checked(
        runner,
        &CommandSpec::shell("source .cargo/env && make build-deps")
            .current_dir(source_dir)
            .envs(overlay),
        "make build-deps",
    )?;

    Ok(env)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tezpack_common::Formulary;

    use super::*;
    use crate::command::CommandOutput;

    /// Records invocations; optionally fails the first command whose rendered
    /// form contains a needle.
    struct RecordingRunner {
        calls: Mutex<Vec<String>>,
        fail_matching: Option<&'static str>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_matching: None,
            }
        }

        fn failing_on(needle: &'static str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_matching: Some(needle),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
            let rendered = spec.display();
            self.calls.lock().unwrap().push(rendered.clone());
            if let Some(needle) = self.fail_matching {
                if rendered.contains(needle) {
                    return Ok(CommandOutput {
                        status: Some(1),
                        stdout: String::new(),
                        stderr: format!("simulated failure: {needle}"),
                    });
                }
            }
            Ok(CommandOutput {
                status: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            })
        }
    }

    fn write_executable(path: &Path) {
        fs::write(path, "#!/bin/sh\n").unwrap();
        let mut perms = fs::metadata(path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).unwrap();
    }

    /// A checkout with the pinned opam (and a stand-in rustup-init) already
    /// in place, so bootstrap never needs the network.
    fn seeded_checkout(dir: &Path) {
        let opam_dir = dir.join(OPAM_BIN_DIR);
        fs::create_dir_all(&opam_dir).unwrap();
        write_executable(&opam_dir.join("opam"));
        write_executable(&opam_dir.join("rustup-init"));
    }

    fn accuser() -> tezpack_common::Formula {
        Formulary::new().load_formula("tezos-accuser-PtNairob").unwrap()
    }

    fn test_env(prefix: &Path, source_dir: &Path) -> BuildEnvironment {
        let config = tezpack_common::Config {
            prefix: prefix.to_path_buf(),
        };
        BuildEnvironment::new(&config, source_dir).unwrap()
    }

    #[tokio::test]
    async fn runs_the_pinned_sequence_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        seeded_checkout(&src);

        let runner = RecordingRunner::new();
        let env = test_env(tmp.path(), &src);
        bootstrap(&accuser(), &env, &runner, &src).await.unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("rustup-init --default-toolchain 1.60.0 -y"));
        assert!(calls[1].starts_with("opam init --bare --debug --auto-setup --disable-sandboxing"));
        assert!(calls[2].contains("source .cargo/env && make build-deps"));
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        seeded_checkout(&src);

        let runner = RecordingRunner::new();
        let env = test_env(tmp.path(), &src);
        bootstrap(&accuser(), &env, &runner, &src).await.unwrap();
        bootstrap(&accuser(), &env, &runner, &src).await.unwrap();

        // Same sequence both times; the opam binary was not re-fetched.
        let calls = runner.calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[0], calls[3]);
        assert!(src.join(OPAM_BIN_DIR).join("opam").is_file());
    }

    #[tokio::test]
    async fn a_failing_step_aborts_the_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        seeded_checkout(&src);

        let runner = RecordingRunner::failing_on("opam init");
        let env = test_env(tmp.path(), &src);
        let err = bootstrap(&accuser(), &env, &runner, &src).await.unwrap_err();

        assert!(matches!(err, TezpackError::CommandExecError(_)));
        assert!(err.to_string().contains("simulated failure"));
        // make build-deps never ran.
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn opam_bin_dir_lands_first_on_path() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        seeded_checkout(&src);

        let runner = RecordingRunner::new();
        let env = test_env(tmp.path(), &src);
        let bootstrapped = bootstrap(&accuser(), &env, &runner, &src).await.unwrap();

        let path = bootstrapped.path_string();
        assert!(path.starts_with(&*src.join(OPAM_BIN_DIR).to_string_lossy()));
    }
}
