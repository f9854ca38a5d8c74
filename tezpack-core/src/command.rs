// tezpack-core/src/command.rs
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Command as StdCommand, Stdio};
use std::sync::Arc;

use tezpack_common::error::{Result, TezpackError};
use tracing::{debug, error};

/// One fully described external tool invocation: program, arguments, working
/// directory and environment overlay. The bootstrap and build steps only ever
/// talk to external tools through these, so tests can substitute a fake
/// runner and observe the exact command sequence.
#[derive(Debug, Clone, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Applied on top of the ambient process environment.
    pub env: HashMap<String, String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// A compound shell step (`a && b && c`). Environment activation does not
    /// survive process boundaries, so dependent steps must share one shell.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs(mut self, envs: HashMap<String, String>) -> Self {
        self.env.extend(envs);
        self
    }

    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, or None when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub trait CommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Default runner backed by std::process.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        debug!(
            "Running command: {} (cwd: {:?}, env overrides: {:?})",
            spec.display(),
            spec.cwd,
            spec.env.keys().collect::<Vec<_>>()
        );

        let mut cmd = StdCommand::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(&spec.env);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        match cmd.output() {
            Ok(output) => {
                let result = CommandOutput {
                    status: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };
                if !result.success() {
                    debug!("Command failed with status: {}", output.status);
                    if !result.stdout.trim().is_empty() {
                        debug!("Stdout:\n{}", result.stdout.trim());
                    }
                    if !result.stderr.trim().is_empty() {
                        debug!("Stderr:\n{}", result.stderr.trim());
                    }
                }
                Ok(result)
            }
            Err(e) => {
                error!("Failed to execute command '{}': {}", spec.display(), e);
                Err(TezpackError::Io(Arc::new(e)))
            }
        }
    }
}

/// Runs a command and turns a non-zero exit into a hard error that carries
/// the tool's own diagnostics verbatim. No retries anywhere in this engine.
pub fn run_checked(
    runner: &dyn CommandRunner,
    spec: &CommandSpec,
    context: &str,
) -> Result<CommandOutput> {
    let output = runner.run(spec)?;
    if output.success() {
        return Ok(output);
    }
    let status = output
        .status
        .map_or_else(|| "signal".to_string(), |code| code.to_string());
    Err(TezpackError::CommandExecError(format!(
        "{context}: `{}` exited with status {status}: {}",
        spec.display(),
        output.stderr.trim()
    )))
}
