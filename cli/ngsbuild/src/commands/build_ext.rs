//! `ngsbuild build-ext`: translate, compile and link the extension modules.
//!
//! The native library is built first with the same options, so a single
//! `build-ext` produces a complete, linkable tree.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use ngsbuild_engine::{compile_extensions, BuildReport, CommandRunner, SourceTranslator};

use super::BuildOptions;
use crate::manifest::NgsbuildManifest;

pub fn run(
    project_dir: &Path,
    manifest: &NgsbuildManifest,
    opts: &BuildOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<BuildReport> {
    let started = Instant::now();
    let translator = super::translator(project_dir, manifest, runner.clone());
    let mut ctx = super::context(project_dir, manifest, opts, runner)?;
    let artifacts = compile_extensions(
        &mut ctx,
        &manifest.native,
        &manifest.extensions,
        translator.as_ref().map(|t| t as &dyn SourceTranslator),
    )?;
    let elapsed = super::elapsed_millis(started);
    Ok(BuildReport::new(&ctx, artifacts, elapsed))
}
