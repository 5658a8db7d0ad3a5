//! `ngsbuild init`: write a starting `ngsbuild.toml`.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::manifest::{NgsbuildManifest, MANIFEST_FILE};

pub fn run(project_dir: &Path, name: &str) -> Result<()> {
    let path = project_dir.join(MANIFEST_FILE);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    fs::write(&path, NgsbuildManifest::template(name))
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}
