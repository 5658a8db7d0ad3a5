//! Build mode to macro, compiler flag and translator directive mapping.

use std::collections::BTreeMap;
use std::fmt;

use ngsbuild_targets::ToolchainFamily;
use serde::{Deserialize, Serialize};

use crate::config::Macro;

/// Defined in debug builds of both the native library and the extensions.
pub const DEBUG_MACRO: &str = "NGSR_DEBUG";
/// Enables line tracing in translated code, for profiling and coverage.
pub const TRACE_MACRO: &str = "CYTHON_TRACE_NOGIL";
/// Compiles assertions out of translated code.
pub const WITHOUT_ASSERTIONS_MACRO: &str = "CYTHON_WITHOUT_ASSERTIONS";

/// Build mode controlling optimization, assertions and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
    #[default]
    Release,
    Debug,
}

impl BuildMode {
    /// Select the mode from a `--debug` flag.
    pub fn from_debug_flag(debug: bool) -> Self {
        if debug {
            BuildMode::Debug
        } else {
            BuildMode::Release
        }
    }

    pub fn is_debug(&self) -> bool {
        matches!(self, BuildMode::Debug)
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildMode::Release => "release",
            BuildMode::Debug => "debug",
        })
    }
}

/// The interpreter runtime the extensions are built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeIdentity {
    /// Implementation name (e.g. "cpython", "pypy").
    pub name: String,
    /// Implementation version.
    pub version: semver::Version,
}

impl RuntimeIdentity {
    /// The runtime whose tracing hooks the translated code supports.
    pub const PRIMARY: &'static str = "cpython";

    pub fn new(name: impl Into<String>, version: semver::Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.name == Self::PRIMARY
    }
}

/// Source translator directives, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directives(BTreeMap<String, bool>);

impl Directives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: bool) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a build mode contributes to a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFlags {
    /// Preprocessor macros for native compilation.
    pub macros: Vec<Macro>,
    /// Extra native compiler arguments, in the toolchain's syntax.
    pub extra_compile_args: Vec<String>,
    /// Source translator directives.
    pub directives: Directives,
    /// Whether the translator emits annotated HTML next to its output.
    pub annotate: bool,
}

const DEBUG_WARNINGS: [&str; 7] = [
    "warn.undeclared",
    "warn.unreachable",
    "warn.maybe_uninitialized",
    "warn.unused",
    "warn.unused_arg",
    "warn.unused_result",
    "warn.multiple_declarators",
];

/// Derive macros, flags and directives for a build mode.
pub fn derive(mode: BuildMode, family: ToolchainFamily, runtime: &RuntimeIdentity) -> ModeFlags {
    let mut macros = Vec::new();
    let mut extra_compile_args = Vec::new();
    let mut directives = Directives::new();

    // Integer division follows the hardware: callers guarantee non-zero divisors.
    directives.set("cdivision", true);
    directives.set("nonecheck", false);

    match mode {
        BuildMode::Debug => {
            macros.push(Macro::with_value(DEBUG_MACRO, "1"));
            extra_compile_args.push(match family {
                ToolchainFamily::Msvc => "/Z7".to_string(),
                ToolchainFamily::UnixLike | ToolchainFamily::Mingw => "-g".to_string(),
            });
            if runtime.is_primary() {
                macros.push(Macro::with_value(TRACE_MACRO, "1"));
            }
            directives.set("cdivision_warnings", true);
            for warning in DEBUG_WARNINGS {
                directives.set(warning, true);
            }
        }
        BuildMode::Release => {
            macros.push(Macro::with_value(WITHOUT_ASSERTIONS_MACRO, "1"));
            directives.set("boundscheck", false);
            directives.set("wraparound", false);
        }
    }

    ModeFlags {
        macros,
        extra_compile_args,
        directives,
        annotate: mode.is_debug(),
    }
}
