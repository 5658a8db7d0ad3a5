//! `ngsbuild.toml` manifest parsing and project configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ngsbuild_engine::{ExtensionUnit, NativeLibrarySpec, RuntimeIdentity};
use serde::{Deserialize, Serialize};

/// File name of the project manifest.
pub const MANIFEST_FILE: &str = "ngsbuild.toml";

/// The top-level manifest structure of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgsbuildManifest {
    pub package: PackageConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
    /// Binding metadata provider; absent means no provider.
    #[serde(default)]
    pub bindings: Option<BindingsConfig>,
    /// The vendored native library.
    pub native: NativeLibrarySpec,
    #[serde(default, rename = "extension")]
    pub extensions: Vec<ExtensionUnit>,
    #[serde(default)]
    pub sdist: SdistConfig,
}

/// Package metadata section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Directory holding the extension sources; defaults to the package name.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
    /// Packages required at build time.
    #[serde(default)]
    pub build_requires: Vec<String>,
    #[serde(default)]
    pub build_backend: Option<String>,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Interpreter runtime the extensions target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_runtime_name")]
    pub name: String,
    #[serde(default = "default_runtime_version")]
    pub version: semver::Version,
}

fn default_runtime_name() -> String {
    RuntimeIdentity::PRIMARY.to_string()
}

fn default_runtime_version() -> semver::Version {
    semver::Version::new(3, 12, 0)
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            name: default_runtime_name(),
            version: default_runtime_version(),
        }
    }
}

impl RuntimeConfig {
    pub fn identity(&self) -> RuntimeIdentity {
        RuntimeIdentity::new(self.name.clone(), self.version.clone())
    }
}

/// Toolchain overrides. Unset commands keep the family defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Compiler family (`unix`, `mingw32`, `msvc`).
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub cc: Option<Vec<String>>,
    #[serde(default)]
    pub cxx: Option<Vec<String>>,
    #[serde(default)]
    pub ldshared: Option<Vec<String>>,
    #[serde(default)]
    pub ar: Option<Vec<String>>,
}

/// Source translator section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default = "default_translator")]
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_translator() -> String {
    "cython".to_string()
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            program: default_translator(),
            args: Vec::new(),
        }
    }
}

impl TranslatorConfig {
    /// Program followed by its fixed arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

/// Binding metadata provider section: either fixed lists or a command
/// printing include directories.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BindingsConfig {
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub command: Option<Vec<String>>,
}

/// Source distribution section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdistConfig {
    /// Packager run after the descriptor is written.
    #[serde(default)]
    pub packager: Option<Vec<String>>,
}

impl NgsbuildManifest {
    /// Search upward from `start_dir` for an `ngsbuild.toml` file, parse and
    /// return it along with the directory it was found in.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(MANIFEST_FILE);
            if candidate.is_file() {
                let content = std::fs::read_to_string(&candidate)
                    .with_context(|| format!("reading {}", candidate.display()))?;
                let manifest: NgsbuildManifest = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", candidate.display()))?;
                return Ok(Some((manifest, dir)));
            }
            if !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing ngsbuild.toml")
    }

    /// Directory holding the extension sources, relative to the project root.
    pub fn source_dir(&self) -> PathBuf {
        self.package
            .source_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.package.name))
    }

    /// A starting manifest for a package called `name`.
    pub fn template(name: &str) -> String {
        format!(
            r#"[package]
name = "{name}"
version = "0.1.0"
build-requires = ["setuptools >=46.4", "cython ~=3.0"]

[bindings]
include-dirs = ["vendor/include"]

[native]
name = "{name}"
sources = ["vendor/src/lib.c"]
include-dirs = ["vendor/include"]

[[extension]]
name = "{name}.lib"
language = "c"
sources = ["{name}/lib.pyx"]
"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ngsbuild_engine::Language;

    #[test]
    fn parse_full_manifest() {
        let toml_str = r#"
[package]
name = "ngsreads"
version = "0.4.1"
source-dir = "src/ngsreads"
build-requires = ["setuptools", "cython"]
build-backend = "setuptools.build_meta"

[runtime]
name = "pypy"
version = "7.3.15"

[toolchain]
family = "unix"
cc = ["clang"]
ar = ["llvm-ar", "rcs"]

[translator]
program = "cython"
args = ["-3"]

[bindings]
command = ["python", "-c", "import ngsreads.lib; print(ngsreads.lib.get_include())"]

[native]
name = "bwa"
sources = ["vendor/bwa/bwt.c", "vendor/bwa/bntseq.c"]
include-dirs = ["vendor/bwa"]
macros = [{ name = "USE_MALLOC_WRAPPERS" }]

[[extension]]
name = "ngsreads.align.bwa"
language = "c++"
sources = ["src/ngsreads/align/bwa.pyx"]
libraries = ["z"]

[[extension]]
name = "ngsreads.io.fastq"
sources = ["src/ngsreads/io/fastq.pyx"]

[sdist]
packager = ["python", "-m", "build", "--sdist"]
"#;
        let manifest = NgsbuildManifest::from_str(toml_str).unwrap();
        assert_eq!(manifest.package.version, "0.4.1");
        assert_eq!(manifest.source_dir(), PathBuf::from("src/ngsreads"));
        assert_eq!(manifest.runtime.identity().name, "pypy");
        assert_eq!(manifest.toolchain.ar.as_deref().map(|a| a.len()), Some(2));
        assert_eq!(manifest.translator.argv(), vec!["cython".to_string(), "-3".into()]);
        assert!(manifest.bindings.as_ref().unwrap().command.is_some());
        assert_eq!(manifest.native.macros[0].name, "USE_MALLOC_WRAPPERS");
        assert_eq!(manifest.extensions.len(), 2);
        assert_eq!(manifest.extensions[0].language, Language::Cxx);
        assert_eq!(manifest.extensions[1].language, Language::C);
        assert!(manifest.sdist.packager.is_some());
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = NgsbuildManifest::from_str(
            r#"
[package]
name = "ngsreads"

[native]
name = "bwa"
sources = ["vendor/bwa/bwt.c"]
"#,
        )
        .unwrap();
        assert_eq!(manifest.package.version, "0.1.0");
        assert_eq!(manifest.source_dir(), PathBuf::from("ngsreads"));
        assert_eq!(manifest.runtime.name, "cpython");
        assert_eq!(manifest.translator.program, "cython");
        assert!(manifest.bindings.is_none());
        assert!(manifest.extensions.is_empty());
    }

    #[test]
    fn template_parses() {
        let manifest = NgsbuildManifest::from_str(&NgsbuildManifest::template("demo")).unwrap();
        assert_eq!(manifest.package.name, "demo");
        assert_eq!(manifest.extensions[0].name, "demo.lib");
    }

    #[test]
    fn find_searches_upward() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), NgsbuildManifest::template("demo")).unwrap();
        let nested = dir.path().join("demo/sub");
        std::fs::create_dir_all(&nested).unwrap();

        let (manifest, found) = NgsbuildManifest::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(manifest.package.name, "demo");
        assert_eq!(found, dir.path());
    }
}
