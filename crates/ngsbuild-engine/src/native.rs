//! Native library build step.
//!
//! Compiles the vendored sources into one static library that every
//! extension links against. Within one invocation the library is built at
//! most once: the artifact is recorded in the [`BuildContext`] and returned
//! as-is on later calls.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::command::{archive_argv, compile_argv, object_path, CompileInvocation};
use crate::config::Macro;
use crate::context::BuildContext;
use crate::error::{BuildError, Result};
use crate::exec::run_checked;
use crate::fingerprint;

/// The vendored native library to build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NativeLibrarySpec {
    /// Library name; `bwa` produces `libbwa.a` (or `bwa.lib`).
    pub name: String,
    /// Vendored sources, relative to the repository root.
    pub sources: Vec<PathBuf>,
    /// Public header directories, also exposed to the extensions.
    #[serde(default)]
    pub include_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub macros: Vec<Macro>,
}

/// The static library produced by [`build_native_library`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativeLibraryArtifact {
    pub name: String,
    /// Path of the archive.
    pub path: PathBuf,
    /// Include directories extensions compile against, searched first.
    pub include_dirs: Vec<PathBuf>,
    /// Whether the toolchain was skipped because the archive was up to date.
    pub up_to_date: bool,
}

#[derive(Serialize)]
struct NativeInputs<'a> {
    family: String,
    compiler: &'a [String],
    archiver: &'a [String],
    sources: &'a [PathBuf],
    include_dirs: &'a [PathBuf],
    macros: &'a [Macro],
    extra_args: &'a [String],
}

/// Build the native static library, or return the one already built by
/// this invocation.
pub fn build_native_library(ctx: &mut BuildContext, library: &NativeLibrarySpec) -> Result<NativeLibraryArtifact> {
    if let Some(artifact) = ctx.native_library() {
        log::debug!("reusing native library {}", artifact.path.display());
        return Ok(artifact.clone());
    }

    let artifact = run_native_build(ctx, library)?;
    ctx.record_native(artifact.clone());
    Ok(artifact)
}

fn run_native_build(ctx: &BuildContext, library: &NativeLibrarySpec) -> Result<NativeLibraryArtifact> {
    let provider = ctx.provider()?;
    let family = ctx.family();
    let commands = ctx.commands();
    for program in [&commands.compiler_so[0], &commands.archiver[0]] {
        if !ctx.runner().is_available(program) {
            return Err(BuildError::MissingCompiler {
                program: program.clone(),
            });
        }
    }
    if library.name.is_empty() {
        return Err(BuildError::InvalidConfig("native library has no name".into()));
    }

    let layout = ctx.layout();
    let sources: Vec<PathBuf> = library
        .sources
        .iter()
        .cloned()
        .chain(provider.extra_sources())
        .collect();
    if sources.is_empty() {
        return Err(BuildError::InvalidConfig(format!(
            "native library '{}' has no sources",
            library.name
        )));
    }

    let mut include_dirs = provider.include_dirs();
    include_dirs.extend(library.include_dirs.iter().cloned());
    let mut compile_includes = ctx.config().include_dirs.clone();
    compile_includes.extend(include_dirs.iter().cloned());
    let mut macros = ctx.config().macros.clone();
    macros.extend(library.macros.iter().cloned());
    let extra_args = &ctx.config().extra_args;

    let path = layout.build_temp.join(family.static_lib_name(&library.name));
    let inputs = NativeInputs {
        family: family.to_string(),
        compiler: &commands.compiler_so,
        archiver: &commands.archiver,
        sources: &sources,
        include_dirs: &compile_includes,
        macros: &macros,
        extra_args,
    };
    let header_dirs: Vec<PathBuf> = include_dirs.iter().map(|d| layout.resolve(d)).collect();
    let files: Vec<PathBuf> = sources
        .iter()
        .map(|s| layout.resolve(s))
        .chain(fingerprint::headers_under(&header_dirs))
        .collect();
    let digest = fingerprint::digest(&inputs, &files);

    if !ctx.force() {
        if let Some(digest) = &digest {
            if fingerprint::is_fresh(&path, digest) {
                log::info!("native library {} is up to date", path.display());
                return Ok(NativeLibraryArtifact {
                    name: library.name.clone(),
                    path,
                    include_dirs,
                    up_to_date: true,
                });
            }
        }
    }

    log::info!(
        "building native library '{}' for {} with {family} compiler",
        library.name,
        ctx.platform_tag()
    );
    let object_dir = layout.build_temp.join(&library.name);
    let mut objects = Vec::with_capacity(sources.len());
    for source in &sources {
        let object = object_path(&object_dir, &layout.root, &layout.resolve(source), family.object_extension());
        if let Some(parent) = object.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let argv = compile_argv(
            family,
            &commands.compiler_so,
            &CompileInvocation {
                source,
                object: &object,
                include_dirs: &compile_includes,
                macros: &macros,
                extra_args,
            },
        );
        run_checked(ctx.runner(), &argv, &layout.root)?;
        objects.push(object);
    }

    let argv = archive_argv(family, &commands.archiver, &objects, &path);
    run_checked(ctx.runner(), &argv, &layout.root)?;
    if let Some(digest) = &digest {
        fingerprint::write_stamp(&path, digest)?;
    }

    Ok(NativeLibraryArtifact {
        name: library.name.clone(),
        path,
        include_dirs,
        up_to_date: false,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::context::BuildSettings;
    use crate::exec::{CommandOutput, CommandRunner};
    use crate::mode::{BuildMode, RuntimeIdentity};
    use crate::provider::{BindingProvider, StaticBindings};

    #[derive(Debug, Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<String>>>,
        missing: AtomicBool,
    }

    impl Recorder {
        fn programs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c[0].clone()).collect()
        }
    }

    impl CommandRunner for Recorder {
        fn run(&self, argv: &[String], _cwd: &Path) -> std::io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            Ok(CommandOutput {
                success: true,
                status: Some(0),
                ..CommandOutput::default()
            })
        }

        fn is_available(&self, _program: &str) -> bool {
            !self.missing.load(Ordering::SeqCst)
        }
    }

    fn bwa() -> NativeLibrarySpec {
        NativeLibrarySpec {
            name: "bwa".into(),
            sources: vec![
                PathBuf::from("vendor/bwa/bntseq.c"),
                PathBuf::from("vendor/bwa/bwt.c"),
                PathBuf::from("vendor/bwa/utils.c"),
            ],
            include_dirs: vec![PathBuf::from("vendor/bwa")],
            macros: vec![],
        }
    }

    fn context(root: &Path, provider: bool, recorder: Arc<Recorder>) -> BuildContext {
        let runtime = RuntimeIdentity::new("cpython", semver::Version::new(3, 12, 0));
        let mut settings = BuildSettings::new("linux-x86_64", root, runtime);
        settings.mode = BuildMode::Debug;
        let provider: Option<Arc<dyn BindingProvider>> = provider.then(|| {
            Arc::new(StaticBindings::new(
                vec![PathBuf::from("/site/ngsreads/include")],
                vec![PathBuf::from("vendor/extra.c")],
            )) as Arc<dyn BindingProvider>
        });
        BuildContext::new(settings, provider, recorder).unwrap()
    }

    #[test]
    fn compiles_each_source_then_archives() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), true, recorder.clone());

        let artifact = build_native_library(&mut ctx, &bwa()).unwrap();
        assert_eq!(artifact.path, ctx.layout().build_temp.join("libbwa.a"));
        assert!(!artifact.up_to_date);
        assert_eq!(
            artifact.include_dirs,
            vec![PathBuf::from("/site/ngsreads/include"), PathBuf::from("vendor/bwa")]
        );
        // Three vendored sources plus the provider's extra source, then `ar`.
        assert_eq!(recorder.programs(), vec!["cc", "cc", "cc", "cc", "ar"]);

        let calls = recorder.calls.lock().unwrap();
        let first = &calls[0];
        assert!(first.contains(&"-DNGSR_DEBUG=1".to_string()));
        assert!(first.contains(&"-I/site/ngsreads/include".to_string()));
        assert!(first.contains(&"-g".to_string()));
        assert!(first.contains(&"vendor/bwa/bntseq.c".to_string()));
    }

    #[test]
    fn second_call_reuses_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), true, recorder.clone());

        let first = build_native_library(&mut ctx, &bwa()).unwrap();
        let calls = recorder.calls.lock().unwrap().len();
        let second = build_native_library(&mut ctx, &bwa()).unwrap();

        assert_eq!(first, second);
        assert_eq!(recorder.calls.lock().unwrap().len(), calls);
        assert_eq!(ctx.native_builds(), 1);
    }

    #[test]
    fn missing_provider_fails_before_compiling() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), false, recorder.clone());

        let err = build_native_library(&mut ctx, &bwa()).unwrap_err();
        assert!(matches!(err, BuildError::MissingBindingProvider));
        assert!(recorder.calls.lock().unwrap().is_empty());
        assert!(ctx.native_library().is_none());
    }

    #[test]
    fn missing_compiler_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        recorder.missing.store(true, Ordering::SeqCst);
        let mut ctx = context(dir.path(), true, recorder.clone());

        let err = build_native_library(&mut ctx, &bwa()).unwrap_err();
        assert!(matches!(err, BuildError::MissingCompiler { ref program } if program == "cc"));
        assert!(recorder.calls.lock().unwrap().is_empty());
    }

    fn vendored_tree(root: &Path) {
        let vendor = root.join("vendor/bwa");
        fs::create_dir_all(&vendor).unwrap();
        for name in ["bntseq.c", "bwt.c", "utils.c"] {
            fs::write(vendor.join(name), format!("/* {name} */")).unwrap();
        }
        fs::write(vendor.join("bwt.h"), "#define OCC_INTERVAL 0x80\n").unwrap();
        fs::write(root.join("vendor/extra.c"), "/* extra */").unwrap();
    }

    /// Build once in a fresh context, creating the archive the recorder never writes.
    fn build_fresh(root: &Path) -> (NativeLibraryArtifact, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut ctx = context(root, true, recorder.clone());
        let artifact = build_native_library(&mut ctx, &bwa()).unwrap();
        fs::write(&artifact.path, b"!<arch>").unwrap();
        (artifact, recorder)
    }

    #[test]
    fn fresh_stamp_skips_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        vendored_tree(dir.path());
        build_fresh(dir.path());

        let again = Arc::new(Recorder::default());
        let mut ctx = context(dir.path(), true, again.clone());
        let reused = build_native_library(&mut ctx, &bwa()).unwrap();
        assert!(reused.up_to_date);
        assert!(again.calls.lock().unwrap().is_empty());
        assert_eq!(ctx.native_builds(), 1);
    }

    #[test]
    fn header_edit_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        vendored_tree(dir.path());
        build_fresh(dir.path());
        let (unchanged, _) = build_fresh(dir.path());
        assert!(unchanged.up_to_date);

        fs::write(dir.path().join("vendor/bwa/bwt.h"), "#define OCC_INTERVAL 0x40\n").unwrap();
        let (rebuilt, recorder) = build_fresh(dir.path());
        assert!(!rebuilt.up_to_date);
        assert_eq!(recorder.programs().last().map(String::as_str), Some("ar"));
    }
}
