//! Native binding metadata providers.
//!
//! A provider tells the build where the public headers of the vendored
//! library live and which extra native sources must be compiled with it.
//! Providers are resolved once when an invocation starts; an invocation
//! without one cannot build either the native library or the extensions.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::exec::CommandRunner;

/// Source of include directories and extra sources for the native library.
pub trait BindingProvider: fmt::Debug + Send + Sync {
    /// Include directories required to compile against the public headers.
    fn include_dirs(&self) -> Vec<PathBuf>;

    /// Additional native sources to compile into the library.
    fn extra_sources(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A provider backed by fixed lists, typically read from the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticBindings {
    pub include_dirs: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
}

impl StaticBindings {
    pub fn new(include_dirs: Vec<PathBuf>, sources: Vec<PathBuf>) -> Self {
        Self {
            include_dirs,
            sources,
        }
    }
}

impl BindingProvider for StaticBindings {
    fn include_dirs(&self) -> Vec<PathBuf> {
        self.include_dirs.clone()
    }

    fn extra_sources(&self) -> Vec<PathBuf> {
        self.sources.clone()
    }
}

/// Resolve a provider by running `argv` in `cwd`, which prints one include
/// directory per line.
///
/// Returns `None` when the command cannot be run, fails, or prints nothing:
/// the provider is then considered absent.
pub fn resolve_command_bindings(
    runner: &dyn CommandRunner,
    argv: &[String],
    cwd: &Path,
    sources: Vec<PathBuf>,
) -> Option<StaticBindings> {
    let output = match runner.run(argv, cwd) {
        Ok(output) if output.success => output,
        Ok(output) => {
            log::warn!(
                "binding provider command failed: {}",
                output.stderr.trim()
            );
            return None;
        }
        Err(e) => {
            log::warn!("failed to run binding provider command: {e}");
            return None;
        }
    };
    let include_dirs: Vec<PathBuf> = output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(PathBuf::from)
        .collect();
    if include_dirs.is_empty() {
        log::warn!("binding provider command printed no include directories");
        return None;
    }
    Some(StaticBindings::new(include_dirs, sources))
}
