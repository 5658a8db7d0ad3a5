//! `ngsbuild sdist`: generate the packaging descriptor and run the packager.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ngsbuild_engine::{sdist, BuildSystemDescriptor, CommandRunner};

use crate::manifest::NgsbuildManifest;

pub fn run(project_dir: &Path, manifest: &NgsbuildManifest, runner: &dyn CommandRunner) -> Result<PathBuf> {
    let descriptor = BuildSystemDescriptor::new(
        manifest.package.build_requires.clone(),
        manifest.package.build_backend.clone(),
    );
    let path = sdist::package(project_dir, &descriptor, manifest.sdist.packager.as_deref(), runner)
        .with_context(|| format!("packaging {} {}", manifest.package.name, manifest.package.version))?;
    println!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::RecordingRunner;

    #[test]
    fn writes_descriptor_and_runs_packager() {
        let dir = tempfile::tempdir().unwrap();
        let manifest: NgsbuildManifest = toml::from_str(
            r#"
[package]
name = "ngsreads"
build-requires = ["setuptools", "cython"]

[native]
name = "bwa"
sources = []

[sdist]
packager = ["python", "-m", "build", "--sdist"]
"#,
        )
        .unwrap();
        let runner = RecordingRunner::default();

        let path = run(dir.path(), &manifest, &runner).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("[build-system]"));
        assert!(text.contains("setuptools.build_meta"));
        assert_eq!(runner.programs(), vec!["python"]);
    }
}
