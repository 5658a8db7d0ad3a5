//! Compile configuration shared by the build steps.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::mode::ModeFlags;

/// A preprocessor macro definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Macro {
    pub name: String,
    /// `None` defines the macro without a value.
    #[serde(default)]
    pub value: Option<String>,
}

impl Macro {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for Macro {
    type Err = BuildError;

    /// Parse `NAME` or `NAME=VALUE`.
    fn from_str(s: &str) -> Result<Self> {
        let (name, value) = match s.split_once('=') {
            Some((name, value)) => (name, Some(value.to_string())),
            None => (s, None),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(BuildError::InvalidConfig(format!(
                "macro definition '{s}' has no name"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            value,
        })
    }
}

/// Resolve a requested worker count, where 0 means every logical core.
pub fn resolve_parallelism(requested: usize) -> NonZeroUsize {
    NonZeroUsize::new(requested).unwrap_or_else(|| {
        std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
    })
}

/// Build a worker pool with exactly `workers` threads.
pub fn worker_pool(workers: NonZeroUsize) -> Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.get())
        .thread_name(|i| format!("ngsbuild-worker-{i}"))
        .build()?;
    Ok(pool)
}

/// Configuration applied to every native compilation of an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileConfig {
    /// Macro definitions, in definition order.
    pub macros: Vec<Macro>,
    /// Extra compiler arguments, in the toolchain's syntax.
    pub extra_args: Vec<String>,
    /// Include search path; the first match wins.
    pub include_dirs: Vec<PathBuf>,
    /// Resolved worker count.
    pub parallelism: NonZeroUsize,
}

impl CompileConfig {
    /// An empty configuration using `requested` workers (0 = all cores).
    pub fn new(requested: usize) -> Self {
        Self {
            macros: Vec::new(),
            extra_args: Vec::new(),
            include_dirs: Vec::new(),
            parallelism: resolve_parallelism(requested),
        }
    }

    pub fn define(&mut self, m: Macro) {
        self.macros.push(m);
    }

    pub fn include(&mut self, dir: impl Into<PathBuf>) {
        self.include_dirs.push(dir.into());
    }

    /// Append the macros and compiler arguments of a build mode.
    pub fn apply_mode(&mut self, flags: &ModeFlags) {
        self.macros.extend(flags.macros.iter().cloned());
        self.extra_args.extend(flags.extra_compile_args.iter().cloned());
    }
}

/// Where a build reads and writes files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildLayout {
    /// Repository root; relative paths in the configuration resolve against it.
    pub root: PathBuf,
    /// Directory for objects and the static library.
    pub build_temp: PathBuf,
    /// Directory receiving the linked extension modules.
    pub build_lib: PathBuf,
}

impl BuildLayout {
    /// The conventional layout: `build/temp.<tag>` and `build/lib.<tag>`.
    pub fn for_platform(root: impl Into<PathBuf>, platform_tag: &str) -> Self {
        let root = root.into();
        let build = root.join("build");
        Self {
            build_temp: build.join(format!("temp.{platform_tag}")),
            build_lib: build.join(format!("lib.{platform_tag}")),
            root,
        }
    }

    /// Resolve a configured path against the repository root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_resolves_to_available_cores() {
        let resolved = resolve_parallelism(0);
        assert!(resolved.get() >= 1);
    }

    #[test]
    fn explicit_parallelism_is_kept() {
        assert_eq!(resolve_parallelism(3).get(), 3);
        assert_eq!(CompileConfig::new(1).parallelism.get(), 1);
    }

    #[test]
    fn worker_pool_has_requested_threads() {
        let pool = worker_pool(resolve_parallelism(2)).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn macro_parsing() {
        assert_eq!("FOO".parse::<Macro>().unwrap(), Macro::new("FOO"));
        assert_eq!(
            "FOO=1".parse::<Macro>().unwrap(),
            Macro::with_value("FOO", "1")
        );
        assert_eq!(
            "A=b=c".parse::<Macro>().unwrap(),
            Macro::with_value("A", "b=c")
        );
        assert!("=1".parse::<Macro>().is_err());
    }

    #[test]
    fn macro_display() {
        assert_eq!(Macro::with_value("X", "2").to_string(), "X=2");
        assert_eq!(Macro::new("Y").to_string(), "Y");
    }

    #[test]
    fn layout_resolution() {
        let layout = BuildLayout::for_platform("/repo", "linux-x86_64");
        assert_eq!(layout.build_temp, PathBuf::from("/repo/build/temp.linux-x86_64"));
        assert_eq!(layout.build_lib, PathBuf::from("/repo/build/lib.linux-x86_64"));
        assert_eq!(layout.resolve(Path::new("vendor/a.c")), PathBuf::from("/repo/vendor/a.c"));
        assert_eq!(layout.resolve(Path::new("/abs/a.c")), PathBuf::from("/abs/a.c"));
    }
}
