//! `ngsbuild build-clib`: build the vendored native library.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use ngsbuild_engine::{build_native_library, BuildReport, CommandRunner};

use super::BuildOptions;
use crate::manifest::NgsbuildManifest;

pub fn run(
    project_dir: &Path,
    manifest: &NgsbuildManifest,
    opts: &BuildOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<BuildReport> {
    let started = Instant::now();
    let mut ctx = super::context(project_dir, manifest, opts, runner)?;
    build_native_library(&mut ctx, &manifest.native)
        .with_context(|| format!("building native library '{}'", manifest.native.name))?;
    let elapsed = super::elapsed_millis(started);
    Ok(BuildReport::new(&ctx, Vec::new(), elapsed))
}
