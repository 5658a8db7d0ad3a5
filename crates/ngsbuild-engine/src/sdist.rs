//! Source distribution packaging.
//!
//! The packaging descriptor is generated from the package metadata right
//! before the packager runs, so the archive always carries the current
//! build requirements.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::exec::{run_checked, CommandRunner};

/// File name of the generated descriptor.
pub const DESCRIPTOR_FILE: &str = "pyproject.toml";
/// Build backend used when the package does not name one.
pub const DEFAULT_BUILD_BACKEND: &str = "setuptools.build_meta";

/// Build requirements of the package: what to install before building it,
/// and which backend drives the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSystemDescriptor {
    pub requires: Vec<String>,
    pub build_backend: String,
}

impl BuildSystemDescriptor {
    pub fn new(requires: Vec<String>, build_backend: Option<String>) -> Self {
        Self {
            requires,
            build_backend: build_backend.unwrap_or_else(|| DEFAULT_BUILD_BACKEND.to_string()),
        }
    }

    /// Render as a `[build-system]` table.
    pub fn to_toml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            #[serde(rename = "build-system")]
            build_system: &'a BuildSystemDescriptor,
        }
        Ok(toml::to_string(&Document { build_system: self })?)
    }
}

/// Write the descriptor into `root`, replacing any previous one.
pub fn write_descriptor(root: &Path, descriptor: &BuildSystemDescriptor) -> Result<PathBuf> {
    let path = root.join(DESCRIPTOR_FILE);
    let content = descriptor.to_toml()?;
    log::info!("writing {}", path.display());
    fs::write(&path, content).map_err(|e| BuildError::io(&path, e))?;
    Ok(path)
}

/// Write the descriptor, then run `packager` (if any) in `root`.
///
/// Returns the path of the descriptor.
pub fn package(
    root: &Path,
    descriptor: &BuildSystemDescriptor,
    packager: Option<&[String]>,
    runner: &dyn CommandRunner,
) -> Result<PathBuf> {
    let path = write_descriptor(root, descriptor)?;
    match packager {
        Some(argv) if !argv.is_empty() => {
            log::info!("running packager {}", argv[0]);
            run_checked(runner, argv, root)?;
        }
        _ => log::debug!("no packager configured"),
    }
    Ok(path)
}
