//! Clean step: remove generated files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::BuildLayout;
use crate::error::{BuildError, Result};

/// Extensions of generated documentation, removed by every clean.
const SHALLOW_EXTENSIONS: &[&str] = &["html"];
/// Extensions of translated sources, their stamps and compiled modules,
/// removed by deep clean.
const DEEP_EXTENSIONS: &[&str] = &["so", "c", "cpp", "stamp"];

/// What a clean removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub removed: Vec<PathBuf>,
}

/// Remove generated files directly under `source_dir` and the build
/// directories of `layout`.
///
/// Annotation reports and the build-temp directory are always removed; with
/// `deep`, translated sources, compiled modules and the build-lib directory
/// go too. Paths that are already gone are skipped silently.
pub fn clean(source_dir: &Path, layout: &BuildLayout, deep: bool) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    let entries = match fs::read_dir(source_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} does not exist", source_dir.display());
            return remove_build_dirs(layout, deep, report);
        }
        Err(e) => return Err(BuildError::io(source_dir, e)),
    };

    let mut targets = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BuildError::io(source_dir, e))?.path();
        if path.is_file() && is_generated(&path, deep) {
            targets.push(path);
        }
    }
    targets.sort();
    for path in targets {
        remove(&path, false, &mut report)?;
    }

    remove_build_dirs(layout, deep, report)
}

fn is_generated(path: &Path, deep: bool) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    SHALLOW_EXTENSIONS.contains(&ext) || (deep && DEEP_EXTENSIONS.contains(&ext))
}

fn remove_build_dirs(layout: &BuildLayout, deep: bool, mut report: CleanReport) -> Result<CleanReport> {
    remove(&layout.build_temp, true, &mut report)?;
    if deep {
        remove(&layout.build_lib, true, &mut report)?;
    }
    Ok(report)
}

fn remove(path: &Path, dir: bool, report: &mut CleanReport) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    log::info!("removing {}", path.display());
    let result = if dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => {
            report.removed.push(path.to_path_buf());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BuildError::io(path, e)),
    }
}
