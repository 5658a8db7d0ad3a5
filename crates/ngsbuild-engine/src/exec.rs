//! External process execution.
//!
//! Every toolchain, translator and provider invocation goes through a
//! [`CommandRunner`], so the build steps never spawn processes themselves.

use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::error::{BuildError, Result};

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Runs argument vectors as external processes.
///
/// Object-safe so runners can be shared as `Arc<dyn CommandRunner>` across
/// worker threads.
pub trait CommandRunner: fmt::Debug + Send + Sync {
    /// Run `argv` (program followed by arguments) in `cwd` to completion.
    fn run(&self, argv: &[String], cwd: &Path) -> std::io::Result<CommandOutput>;

    /// Whether `program` can be found, either as a path or on `PATH`.
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], cwd: &Path) -> std::io::Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line")
        })?;
        let output = Command::new(program).args(args).current_dir(cwd).output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Run `argv` and turn spawn failures and non-zero exits into errors.
pub fn run_checked(runner: &dyn CommandRunner, argv: &[String], cwd: &Path) -> Result<CommandOutput> {
    let program = argv.first().cloned().unwrap_or_default();
    log::debug!("{}", argv.join(" "));
    let output = runner
        .run(argv, cwd)
        .map_err(|source| BuildError::Spawn {
            program: program.clone(),
            source,
        })?;
    if !output.success {
        return Err(BuildError::CommandFailed {
            program,
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}
