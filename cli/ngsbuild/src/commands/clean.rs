//! `ngsbuild clean`: remove generated files.

use std::path::Path;

use anyhow::{Context, Result};
use ngsbuild_engine::CleanReport;

use super::BuildOptions;
use crate::manifest::NgsbuildManifest;

/// Remove generated files; `all` also removes translated sources and modules.
pub fn run(project_dir: &Path, manifest: &NgsbuildManifest, opts: &BuildOptions, all: bool) -> Result<CleanReport> {
    let source_dir = project_dir.join(manifest.source_dir());
    let layout = super::layout(project_dir, &opts.platform_tag(), opts);
    let report = ngsbuild_engine::clean(&source_dir, &layout, all)
        .with_context(|| format!("cleaning {}", project_dir.display()))?;
    if report.removed.is_empty() {
        println!("Already clean");
    } else {
        println!("Removed {} path(s)", report.removed.len());
    }
    Ok(report)
}
