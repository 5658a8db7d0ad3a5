//! CLI command implementations.

pub mod build_clib;
pub mod build_ext;
pub mod clean;
pub mod doctor;
pub mod init;
pub mod sdist;
pub mod target;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use ngsbuild_engine::{
    resolve_command_bindings, BindingProvider, BuildContext, BuildLayout, BuildMode, BuildReport, BuildSettings,
    CommandRunner, CommandTranslator, Macro, StaticBindings,
};
use ngsbuild_targets::{classify, host_platform_tag, ToolchainCommands, ToolchainFamily};

use crate::manifest::{NgsbuildManifest, ToolchainConfig};

/// Options shared by the build commands.
#[derive(Debug, Clone, Args)]
pub struct BuildOptions {
    /// Target platform tag (e.g. linux-x86_64, macosx-11.0-arm64, win-amd64)
    #[arg(long = "plat-name")]
    pub plat_name: Option<String>,
    /// Build with debug information and assertions enabled
    #[arg(long, short = 'g')]
    pub debug: bool,
    /// Rebuild even when outputs look up to date
    #[arg(long, short = 'f')]
    pub force: bool,
    /// Number of parallel workers (0 = all cores)
    #[arg(long, short = 'j', default_value_t = 1)]
    pub parallel: usize,
    /// Compiler family (unix, mingw32, msvc)
    #[arg(long, short = 'c')]
    pub compiler: Option<String>,
    /// Preprocessor macro, as NAME or NAME=VALUE
    #[arg(long = "define", short = 'D')]
    pub defines: Vec<String>,
    /// Extra include directory
    #[arg(long = "include-dir", short = 'I')]
    pub include_dirs: Vec<PathBuf>,
    /// Directory for objects and the static library
    #[arg(long)]
    pub build_temp: Option<PathBuf>,
    /// Directory receiving the extension modules
    #[arg(long)]
    pub build_lib: Option<PathBuf>,
    /// Report format (human, json)
    #[arg(long)]
    pub report: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            plat_name: None,
            debug: false,
            force: false,
            parallel: 1,
            compiler: None,
            defines: Vec::new(),
            include_dirs: Vec::new(),
            build_temp: None,
            build_lib: None,
            report: None,
        }
    }
}

impl BuildOptions {
    /// The platform tag to build for, defaulting to the host's.
    pub fn platform_tag(&self) -> String {
        self.plat_name.clone().unwrap_or_else(host_platform_tag)
    }
}

/// Load the manifest, failing if there is none.
pub fn require_manifest(cwd: &Path) -> Result<(NgsbuildManifest, PathBuf)> {
    match NgsbuildManifest::find_and_load(cwd)? {
        Some(found) => Ok(found),
        None => bail!("no ngsbuild.toml found (run `ngsbuild init` first)"),
    }
}

fn resolve_against(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Build layout for `tag`, honoring directory overrides.
pub fn layout(project_dir: &Path, tag: &str, opts: &BuildOptions) -> BuildLayout {
    let mut layout = BuildLayout::for_platform(project_dir, tag);
    if let Some(temp) = &opts.build_temp {
        layout.build_temp = resolve_against(project_dir, temp);
    }
    if let Some(lib) = &opts.build_lib {
        layout.build_lib = resolve_against(project_dir, lib);
    }
    layout
}

/// Replace programs with the manifest's `[toolchain]` entries.
///
/// A `cc` entry replaces the program of both C compiler streams; the flags
/// already attached to each stream (defaults and `CFLAGS`) are kept.
fn apply_manifest_toolchain(mut commands: ToolchainCommands, toolchain: &ToolchainConfig) -> ToolchainCommands {
    let with_program = |program: &[String], current: &[String]| -> Vec<String> {
        program.iter().chain(current.iter().skip(1)).cloned().collect()
    };
    if let Some(cc) = &toolchain.cc {
        commands.compiler = with_program(cc, &commands.compiler);
        commands.compiler_so = with_program(cc, &commands.compiler_so);
    }
    if let Some(cxx) = &toolchain.cxx {
        commands.compiler_cxx = cxx.clone();
    }
    if let Some(ldshared) = &toolchain.ldshared {
        commands.linker_so = ldshared.clone();
    }
    if let Some(ar) = &toolchain.ar {
        commands.archiver = ar.clone();
    }
    commands
}

/// Combine manifest, environment and command-line settings.
pub fn settings(project_dir: &Path, manifest: &NgsbuildManifest, opts: &BuildOptions) -> Result<BuildSettings> {
    let tag = opts.platform_tag();
    let triple = classify(&tag);

    let family = match opts.compiler.as_deref().or(manifest.toolchain.family.as_deref()) {
        Some(name) => name.parse::<ToolchainFamily>()?,
        None => ToolchainFamily::default_for(triple.os_family),
    };
    let commands = apply_manifest_toolchain(
        ToolchainCommands::for_target(family, triple.os_family).with_env_overrides(|key| std::env::var(key).ok()),
        &manifest.toolchain,
    );

    let mut settings = BuildSettings::new(tag.clone(), project_dir, manifest.runtime.identity());
    settings.mode = BuildMode::from_debug_flag(opts.debug);
    settings.force = opts.force;
    settings.parallelism = opts.parallel;
    settings.family = Some(family);
    settings.commands = Some(commands);
    settings.layout = layout(project_dir, &tag, opts);
    settings.defines = opts
        .defines
        .iter()
        .map(|d| d.parse::<Macro>())
        .collect::<Result<_, _>>()?;
    settings.include_dirs = opts.include_dirs.clone();
    Ok(settings)
}

/// Resolve the binding metadata provider named by the manifest, if any.
pub fn provider(
    project_dir: &Path,
    manifest: &NgsbuildManifest,
    runner: &dyn CommandRunner,
) -> Option<Arc<dyn BindingProvider>> {
    let bindings = manifest.bindings.as_ref()?;
    let sources = bindings.sources.clone();
    let resolved = match &bindings.command {
        Some(argv) => resolve_command_bindings(runner, argv, project_dir, sources)?,
        None => StaticBindings::new(
            bindings
                .include_dirs
                .iter()
                .map(|d| resolve_against(project_dir, d))
                .collect(),
            sources,
        ),
    };
    let provider: Arc<dyn BindingProvider> = Arc::new(resolved);
    Some(provider)
}

/// Set up the context of one build invocation.
pub fn context(
    project_dir: &Path,
    manifest: &NgsbuildManifest,
    opts: &BuildOptions,
    runner: Arc<dyn CommandRunner>,
) -> Result<BuildContext> {
    let settings = settings(project_dir, manifest, opts)?;
    let provider = provider(project_dir, manifest, runner.as_ref());
    let ctx = BuildContext::new(settings, provider, runner).context("configuring build")?;
    Ok(ctx)
}

/// Locate the translator named by the manifest.
pub fn translator(
    project_dir: &Path,
    manifest: &NgsbuildManifest,
    runner: Arc<dyn CommandRunner>,
) -> Option<CommandTranslator> {
    CommandTranslator::locate(manifest.translator.argv(), runner, project_dir)
}

/// Milliseconds since `started`, saturating at `u64::MAX`.
pub fn elapsed_millis(started: Instant) -> u64 {
    duration_millis(started.elapsed())
}

fn duration_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Print a build report in the requested format.
pub fn print_report(report: &BuildReport, format: Option<&str>) -> Result<()> {
    match format {
        None | Some("human") => print!("{report}"),
        Some("json") => println!("{}", serde_json::to_string_pretty(report)?),
        Some(other) => bail!("unknown report format: '{other}' (expected human or json)"),
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Mutex;

    use ngsbuild_engine::{CommandOutput, CommandRunner};

    /// Records every command and reports success.
    #[derive(Debug, Default)]
    pub struct RecordingRunner {
        pub calls: Mutex<Vec<Vec<String>>>,
    }

    impl RecordingRunner {
        pub fn programs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|c| c[0].clone()).collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, argv: &[String], _cwd: &Path) -> std::io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            Ok(CommandOutput {
                success: true,
                status: Some(0),
                stdout: "/site/ngsreads/include\n".into(),
                stderr: String::new(),
            })
        }

        fn is_available(&self, _program: &str) -> bool {
            true
        }
    }
}
