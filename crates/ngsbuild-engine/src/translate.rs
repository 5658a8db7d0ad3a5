//! Translation of intermediate extension sources into native sources.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ngsbuild_targets::TargetTriple;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::worker_pool;
use crate::error::{BuildError, Result};
use crate::exec::{run_checked, CommandRunner};
use crate::extension::{ExtensionUnit, Language};
use crate::fingerprint;
use crate::mode::{Directives, RuntimeIdentity};

/// Default I/O buffer size exposed to translated code.
pub const DEFAULT_BUFFER_SIZE: i64 = 8192;

/// File extension of intermediate sources.
pub const INTERMEDIATE_EXTENSION: &str = "pyx";

/// Value of a compile-time constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileTimeValue {
    Str(String),
    Int(i64),
    /// The constant is defined but carries no value (e.g. an unknown CPU family).
    Absent,
}

impl fmt::Display for CompileTimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileTimeValue::Str(s) => f.write_str(s),
            CompileTimeValue::Int(i) => write!(f, "{i}"),
            CompileTimeValue::Absent => f.write_str("None"),
        }
    }
}

/// Compile-time constants describing the runtime and the target.
pub fn compile_time_env(runtime: &RuntimeIdentity, triple: &TargetTriple) -> Vec<(String, CompileTimeValue)> {
    let family = |known: bool, name: &str| {
        if known {
            CompileTimeValue::Str(name.to_string())
        } else {
            CompileTimeValue::Absent
        }
    };
    let version = |part: u64| CompileTimeValue::Int(i64::try_from(part).unwrap_or(i64::MAX));
    vec![
        ("SYS_IMPLEMENTATION_NAME".into(), CompileTimeValue::Str(runtime.name.clone())),
        ("SYS_VERSION_INFO_MAJOR".into(), version(runtime.version.major)),
        ("SYS_VERSION_INFO_MINOR".into(), version(runtime.version.minor)),
        ("SYS_VERSION_INFO_MICRO".into(), version(runtime.version.patch)),
        (
            "TARGET_CPU".into(),
            family(triple.cpu_family.is_known(), triple.cpu_family.as_str()),
        ),
        (
            "TARGET_SYSTEM".into(),
            family(triple.os_family.is_known(), triple.os_family.as_str()),
        ),
        ("DEFAULT_BUFFER_SIZE".into(), CompileTimeValue::Int(DEFAULT_BUFFER_SIZE)),
    ]
}

/// Settings shared by every unit translated in one invocation.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Shared include path, searched before each unit's own include directories.
    pub include_path: Vec<PathBuf>,
    /// Number of units translated concurrently.
    pub workers: NonZeroUsize,
    pub directives: Directives,
    pub compile_time_env: Vec<(String, CompileTimeValue)>,
    /// Translate even when the output is newer than its source.
    pub force: bool,
    /// Emit an annotated HTML report next to each output.
    pub annotate: bool,
}

/// Turns intermediate sources into native sources.
///
/// Object-safe so translators can be stored as `Box<dyn SourceTranslator>`.
pub trait SourceTranslator: fmt::Debug + Send + Sync {
    /// Human-readable name of the translator.
    fn name(&self) -> &str;

    /// Translate one unit, returning it with native sources in place of
    /// intermediate ones.
    fn translate(&self, unit: &ExtensionUnit, config: &TranslationConfig) -> Result<ExtensionUnit>;
}

/// Translate `units` on a pool of `config.workers` threads.
///
/// Units are independent: workers only read `config`. The first failure
/// fails the whole batch.
pub fn translate_all(
    translator: &dyn SourceTranslator,
    units: &[ExtensionUnit],
    config: &TranslationConfig,
) -> Result<Vec<ExtensionUnit>> {
    let pool = worker_pool(config.workers)?;
    pool.install(|| {
        units
            .par_iter()
            .map(|unit| translator.translate(unit, config))
            .collect()
    })
}

fn is_intermediate(source: &Path) -> bool {
    source.extension().and_then(|e| e.to_str()) == Some(INTERMEDIATE_EXTENSION)
}

/// Everything besides the source text that shapes a translated output.
#[derive(Serialize)]
struct TranslationInputs<'a> {
    program: &'a [String],
    language: Language,
    include_path: Vec<&'a Path>,
    directives: Vec<(&'a str, bool)>,
    compile_time_env: Vec<(&'a str, String)>,
    annotate: bool,
}

impl<'a> TranslationInputs<'a> {
    fn new(program: &'a [String], unit: &'a ExtensionUnit, config: &'a TranslationConfig) -> Self {
        Self {
            program,
            language: unit.language,
            include_path: config
                .include_path
                .iter()
                .chain(&unit.include_dirs)
                .map(PathBuf::as_path)
                .collect(),
            directives: config.directives.iter().collect(),
            compile_time_env: config
                .compile_time_env
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect(),
            annotate: config.annotate,
        }
    }
}

/// Translator driven through an external command line such as `cython`.
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    /// Program followed by its fixed arguments.
    program: Vec<String>,
    runner: Arc<dyn CommandRunner>,
    /// Directory commands run in; relative sources resolve against it.
    cwd: PathBuf,
}

impl CommandTranslator {
    pub fn new(program: Vec<String>, runner: Arc<dyn CommandRunner>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program,
            runner,
            cwd: cwd.into(),
        }
    }

    /// Locate the translator program, returning `None` when it is not installed.
    pub fn locate(program: Vec<String>, runner: Arc<dyn CommandRunner>, cwd: impl Into<PathBuf>) -> Option<Self> {
        let name = program.first()?;
        if !runner.is_available(name) {
            log::debug!("source translator '{name}' not found");
            return None;
        }
        Some(Self::new(program, runner, cwd))
    }

    /// Command line translating `source` into `output` for `unit`.
    pub fn argv(&self, unit: &ExtensionUnit, source: &Path, output: &Path, config: &TranslationConfig) -> Vec<String> {
        let mut argv = self.program.clone();
        if unit.language == Language::Cxx {
            argv.push("--cplus".into());
        }
        for dir in config.include_path.iter().chain(&unit.include_dirs) {
            argv.push("-I".into());
            argv.push(dir.to_string_lossy().into_owned());
        }
        for (name, value) in config.directives.iter() {
            argv.push("-X".into());
            argv.push(format!("{name}={}", if value { "True" } else { "False" }));
        }
        for (name, value) in &config.compile_time_env {
            argv.push("-E".into());
            argv.push(format!("{name}={value}"));
        }
        if config.annotate {
            argv.push("-a".into());
        }
        if config.force {
            argv.push("-f".into());
        }
        argv.push("-o".into());
        argv.push(output.to_string_lossy().into_owned());
        argv.push(source.to_string_lossy().into_owned());
        argv
    }
}

impl SourceTranslator for CommandTranslator {
    fn name(&self) -> &str {
        self.program.first().map_or("translator", String::as_str)
    }

    fn translate(&self, unit: &ExtensionUnit, config: &TranslationConfig) -> Result<ExtensionUnit> {
        let mut translated = unit.clone();
        translated.sources.clear();
        for source in &unit.sources {
            if !is_intermediate(source) {
                translated.sources.push(source.clone());
                continue;
            }
            let output = source.with_extension(unit.language.native_extension());
            let abs_output = self.cwd.join(&output);
            let inputs = TranslationInputs::new(&self.program, unit, config);
            let digest = fingerprint::digest(&inputs, &[self.cwd.join(source)]);
            let fresh = digest
                .as_deref()
                .is_some_and(|d| fingerprint::is_fresh(&abs_output, d));
            if !config.force && fresh {
                log::debug!("{} is up to date", output.display());
            } else {
                log::info!("translating {}", source.display());
                let argv = self.argv(unit, source, &output, config);
                run_checked(self.runner.as_ref(), &argv, &self.cwd).map_err(|e| {
                    BuildError::TranslationFailed {
                        unit: unit.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                if let Some(digest) = &digest {
                    fingerprint::write_stamp(&abs_output, digest)?;
                }
            }
            translated.sources.push(output);
        }
        Ok(translated)
    }
}
