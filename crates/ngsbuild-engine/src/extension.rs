//! Extension compile step: translate, compile and link extension units.

use std::fs;
use std::path::PathBuf;

use ngsbuild_targets::OsFamily;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::command::{compile_argv, driver_for, link_argv, object_path, CompileInvocation, LinkInvocation};
use crate::config::{worker_pool, Macro};
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::exec::run_checked;
use crate::native::{build_native_library, NativeLibraryArtifact, NativeLibrarySpec};
use crate::translate::{compile_time_env, translate_all, SourceTranslator, TranslationConfig};

/// Native language an extension unit is translated into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++")]
    Cxx,
}

impl Language {
    /// Extension of translated sources.
    pub fn native_extension(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "cpp",
        }
    }
}

/// One extension module to build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtensionUnit {
    /// Dotted module name, e.g. `ngsreads.align.bwa`.
    pub name: String,
    #[serde(default)]
    pub language: Language,
    /// Intermediate (`.pyx`) and native sources, relative to the repository root.
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub macros: Vec<Macro>,
    #[serde(default)]
    pub extra_compile_args: Vec<String>,
    /// Libraries linked by name.
    #[serde(default)]
    pub libraries: Vec<String>,
}

impl ExtensionUnit {
    /// Path of the linked module relative to the build-lib directory.
    pub fn module_path(&self, os: OsFamily) -> PathBuf {
        let suffix = match os {
            OsFamily::Windows => "pyd",
            _ => "so",
        };
        PathBuf::from(format!("{}.{suffix}", self.name.replace('.', "/")))
    }
}

/// A linked extension module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledArtifact {
    pub name: String,
    pub path: PathBuf,
    pub objects: Vec<PathBuf>,
}

/// Build every extension unit, building the native library first unless this
/// invocation already did.
///
/// Fails before any work when the translator or the binding provider is
/// missing. Units are compiled concurrently on the configured number of
/// workers; the first unit failure fails the whole step.
pub fn compile_extensions(
    ctx: &mut BuildContext,
    native: &NativeLibrarySpec,
    units: &[ExtensionUnit],
    translator: Option<&dyn SourceTranslator>,
) -> Result<Vec<CompiledArtifact>> {
    let translator = translator.ok_or(BuildError::MissingTranslator)?;
    ctx.provider()?;

    let library = build_native_library(ctx, native)?;
    let ctx: &BuildContext = ctx;
    log::info!(
        "building {} extension(s) for {} with {} compiler",
        units.len(),
        ctx.platform_tag(),
        ctx.family()
    );

    let layout = ctx.layout();
    let mut include_path = ctx.provider()?.include_dirs();
    include_path.push(layout.root.join("include"));
    include_path.push(layout.root.clone());
    let translation = TranslationConfig {
        include_path,
        workers: ctx.config().parallelism,
        directives: ctx.mode_flags().directives.clone(),
        compile_time_env: compile_time_env(ctx.runtime(), ctx.triple()),
        force: ctx.force(),
        annotate: ctx.mode_flags().annotate,
    };
    log::debug!("translating with {} on {} workers", translator.name(), translation.workers);
    let translated = translate_all(translator, units, &translation)?;

    let pool = worker_pool(ctx.config().parallelism)?;
    pool.install(|| {
        translated
            .par_iter()
            .map(|unit| compile_unit(ctx, &library, unit).map_err(|e| BuildError::unit(&unit.name, e)))
            .collect()
    })
}

fn compile_unit(ctx: &BuildContext, library: &NativeLibraryArtifact, unit: &ExtensionUnit) -> Result<CompiledArtifact> {
    log::info!(
        "building '{}' for {} with {} compiler",
        unit.name,
        ctx.platform_tag(),
        ctx.family()
    );
    let family = ctx.family();
    let commands = ctx.commands();
    let layout = ctx.layout();
    let cxx = unit.language == Language::Cxx;

    let mut include_dirs = library.include_dirs.clone();
    include_dirs.extend(unit.include_dirs.iter().cloned());
    include_dirs.extend(ctx.config().include_dirs.iter().cloned());
    let mut macros = ctx.config().macros.clone();
    macros.extend(unit.macros.iter().cloned());
    let mut extra_args = ctx.config().extra_args.clone();
    extra_args.extend(unit.extra_compile_args.iter().cloned());

    let compiler = driver_for(family, &commands.compiler_so, &commands.compiler_cxx, cxx);
    let object_dir = layout.build_temp.join(&unit.name);
    let mut objects = Vec::with_capacity(unit.sources.len());
    for source in &unit.sources {
        let object = object_path(&object_dir, &layout.root, &layout.resolve(source), family.object_extension());
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let argv = compile_argv(
            family,
            &compiler,
            &CompileInvocation {
                source,
                object: &object,
                include_dirs: &include_dirs,
                macros: &macros,
                extra_args: &extra_args,
            },
        );
        run_checked(ctx.runner(), &argv, &layout.root)?;
        objects.push(object);
    }

    let output = layout.build_lib.join(unit.module_path(ctx.triple().os_family));
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    let linker = driver_for(family, &commands.linker_so, &commands.compiler_cxx, cxx);
    let argv = link_argv(
        family,
        &linker,
        &LinkInvocation {
            objects: &objects,
            static_libs: std::slice::from_ref(&library.path),
            libraries: &unit.libraries,
            output: &output,
        },
    );
    run_checked(ctx.runner(), &argv, &layout.root)?;

    Ok(CompiledArtifact {
        name: unit.name.clone(),
        path: output,
        objects,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::context::BuildSettings;
    use crate::exec::{CommandOutput, CommandRunner};
    use crate::mode::RuntimeIdentity;
    use crate::provider::{BindingProvider, StaticBindings};

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for Recorder {
        fn run(&self, argv: &[String], _cwd: &Path) -> std::io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            let failed = self.fail_on.is_some_and(|needle| argv.iter().any(|a| a.contains(needle)));
            Ok(CommandOutput {
                success: !failed,
                status: Some(i32::from(failed)),
                stdout: String::new(),
                stderr: if failed { "error: boom".into() } else { String::new() },
            })
        }

        fn is_available(&self, _program: &str) -> bool {
            true
        }
    }

    #[derive(Debug, Default)]
    struct Renamer {
        calls: AtomicUsize,
    }

    impl SourceTranslator for Renamer {
        fn name(&self) -> &str {
            "renamer"
        }

        fn translate(&self, unit: &ExtensionUnit, _config: &TranslationConfig) -> Result<ExtensionUnit> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut out = unit.clone();
            for source in &mut out.sources {
                if source.extension().is_some_and(|e| e == "pyx") {
                    source.set_extension(unit.language.native_extension());
                }
            }
            Ok(out)
        }
    }

    fn native() -> NativeLibrarySpec {
        NativeLibrarySpec {
            name: "bwa".into(),
            sources: vec![PathBuf::from("vendor/bwa/bwt.c")],
            include_dirs: vec![PathBuf::from("vendor/bwa")],
            macros: vec![],
        }
    }

    fn unit(name: &str, language: Language) -> ExtensionUnit {
        let path = PathBuf::from(format!("{}.pyx", name.replace('.', "/")));
        ExtensionUnit {
            name: name.into(),
            language,
            sources: vec![path],
            ..ExtensionUnit::default()
        }
    }

    fn context(root: &Path, tag: &str, runner: Arc<Recorder>) -> BuildContext {
        let runtime = RuntimeIdentity::new("cpython", semver::Version::new(3, 12, 0));
        let provider: Arc<dyn BindingProvider> =
            Arc::new(StaticBindings::new(vec![PathBuf::from("/site/include")], vec![]));
        BuildContext::new(BuildSettings::new(tag, root, runtime), Some(provider), runner).unwrap()
    }

    #[test]
    fn module_paths_follow_os_convention() {
        let u = unit("ngsreads.align.bwa", Language::C);
        assert_eq!(u.module_path(OsFamily::LinuxOrAndroid), PathBuf::from("ngsreads/align/bwa.so"));
        assert_eq!(u.module_path(OsFamily::Windows), PathBuf::from("ngsreads/align/bwa.pyd"));
        assert_eq!(u.module_path(OsFamily::Unknown), PathBuf::from("ngsreads/align/bwa.so"));
    }

    #[test]
    fn language_names() {
        assert_eq!(serde_json::to_string(&Language::Cxx).unwrap(), "\"c++\"");
        assert_eq!(serde_json::from_str::<Language>("\"c\"").unwrap(), Language::C);
        assert_eq!(Language::Cxx.native_extension(), "cpp");
    }

    #[test]
    fn compiles_and_links_each_unit() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), "linux-x86_64", runner.clone());
        let translator = Renamer::default();
        let units = vec![
            unit("ngsreads.io.fastq", Language::C),
            unit("ngsreads.align.bwa", Language::Cxx),
        ];

        let artifacts = compile_extensions(&mut ctx, &native(), &units, Some(&translator)).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
        let bwa = artifacts.iter().find(|a| a.name == "ngsreads.align.bwa").unwrap();
        assert_eq!(bwa.path, ctx.layout().build_lib.join("ngsreads/align/bwa.so"));

        let calls = runner.calls.lock().unwrap();
        let cxx_compile = calls
            .iter()
            .find(|c| c.iter().any(|a| a == "ngsreads/align/bwa.cpp"))
            .unwrap();
        assert_eq!(cxx_compile[0], "c++");
        assert!(cxx_compile.contains(&"-fPIC".to_string()));
        // Native library headers come before the unit's own.
        let first_include = cxx_compile.iter().position(|a| a.starts_with("-I")).unwrap();
        assert_eq!(cxx_compile[first_include], "-I/site/include");

        let library = ctx.native_library().unwrap().path.to_string_lossy().into_owned();
        let links: Vec<_> = calls.iter().filter(|c| c.contains(&library) && c.contains(&"-shared".to_string())).collect();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn missing_translator_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), "linux-x86_64", runner.clone());
        let err = compile_extensions(&mut ctx, &native(), &[unit("m", Language::C)], None).unwrap_err();
        assert!(matches!(err, BuildError::MissingTranslator));
        assert!(runner.calls.lock().unwrap().is_empty());
        assert_eq!(ctx.native_builds(), 0);
    }

    #[test]
    fn one_failing_unit_fails_the_step() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Recorder {
            fail_on: Some("broken.c"),
            ..Recorder::default()
        });
        let mut ctx = context(dir.path(), "linux-x86_64", runner);
        let units = vec![unit("good", Language::C), unit("broken", Language::C)];
        match compile_extensions(&mut ctx, &native(), &units, Some(&Renamer::default())) {
            Err(BuildError::Unit { unit, source }) => {
                assert_eq!(unit, "broken");
                assert!(matches!(*source, BuildError::CommandFailed { .. }));
            }
            other => panic!("expected a unit failure, got {other:?}"),
        }
    }

    #[test]
    fn windows_targets_use_msvc_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), "win-amd64", runner.clone());
        let artifacts =
            compile_extensions(&mut ctx, &native(), &[unit("pkg.m", Language::C)], Some(&Renamer::default())).unwrap();
        assert_eq!(artifacts[0].path, ctx.layout().build_lib.join("pkg/m.pyd"));
        let calls = runner.calls.lock().unwrap();
        assert!(calls.iter().any(|c| c[0] == "lib.exe"));
        assert!(calls.iter().any(|c| c[0] == "link.exe" && c.iter().any(|a| a.ends_with("bwa.lib"))));
    }
}
