//! Per-invocation build context.
//!
//! Everything derived from the invocation inputs (target triple, toolchain
//! commands, build-mode flags, compile configuration) is computed once here
//! and read-only afterwards. The only mutable state is the native library
//! artifact, recorded the first time a step builds it so later steps of the
//! same invocation reuse it.

use std::path::PathBuf;
use std::sync::Arc;

use ngsbuild_targets::{
    classify, sanitize_arch_flags, OsFamily, TargetTriple, ToolchainCommands, ToolchainFamily,
};

use crate::config::{BuildLayout, CompileConfig, Macro};
use crate::error::{BuildError, Result};
use crate::exec::CommandRunner;
use crate::mode::{derive, BuildMode, ModeFlags, RuntimeIdentity};
use crate::native::NativeLibraryArtifact;
use crate::provider::BindingProvider;

/// Inputs of a build invocation.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Platform tag of the target (e.g. "linux-x86_64").
    pub platform_tag: String,
    pub mode: BuildMode,
    /// Rebuild even when outputs look up to date.
    pub force: bool,
    /// Requested worker count; 0 means every logical core.
    pub parallelism: usize,
    /// Toolchain family; defaults to the target OS convention.
    pub family: Option<ToolchainFamily>,
    /// Toolchain commands; default to the family's commands.
    pub commands: Option<ToolchainCommands>,
    pub runtime: RuntimeIdentity,
    pub layout: BuildLayout,
    /// Extra macros applied to every compilation.
    pub defines: Vec<Macro>,
    /// Extra include directories applied to every compilation.
    pub include_dirs: Vec<PathBuf>,
}

impl BuildSettings {
    /// Settings for `platform_tag` with the conventional layout under `root`.
    pub fn new(platform_tag: impl Into<String>, root: impl Into<PathBuf>, runtime: RuntimeIdentity) -> Self {
        let platform_tag = platform_tag.into();
        let layout = BuildLayout::for_platform(root, &platform_tag);
        Self {
            platform_tag,
            mode: BuildMode::Release,
            force: false,
            parallelism: 1,
            family: None,
            commands: None,
            runtime,
            layout,
            defines: Vec::new(),
            include_dirs: Vec::new(),
        }
    }
}

/// State of one build invocation.
#[derive(Debug)]
pub struct BuildContext {
    platform_tag: String,
    triple: TargetTriple,
    family: ToolchainFamily,
    commands: ToolchainCommands,
    mode: BuildMode,
    force: bool,
    runtime: RuntimeIdentity,
    layout: BuildLayout,
    config: CompileConfig,
    mode_flags: ModeFlags,
    provider: Option<Arc<dyn BindingProvider>>,
    runner: Arc<dyn CommandRunner>,
    native: Option<NativeLibraryArtifact>,
    native_builds: usize,
}

impl BuildContext {
    /// Classify the target and derive the invocation's configuration.
    ///
    /// `provider` is the binding metadata provider resolved at startup, if any;
    /// steps that need it fail when it is `None`.
    pub fn new(
        settings: BuildSettings,
        provider: Option<Arc<dyn BindingProvider>>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let triple = classify(&settings.platform_tag);
        if !triple.cpu_family.is_known() || !triple.os_family.is_known() {
            log::warn!(
                "platform '{}' only partially recognized: {triple}",
                settings.platform_tag
            );
        }

        let family = settings
            .family
            .unwrap_or_else(|| ToolchainFamily::default_for(triple.os_family));
        let mut commands = settings
            .commands
            .unwrap_or_else(|| ToolchainCommands::for_target(family, triple.os_family));
        commands.validate()?;
        if triple.os_family == OsFamily::Macos {
            sanitize_arch_flags(&mut commands, &triple.machine);
        }

        let mode_flags = derive(settings.mode, family, &settings.runtime);
        let mut config = CompileConfig::new(settings.parallelism);
        for m in settings.defines {
            config.define(m);
        }
        for dir in settings.include_dirs {
            config.include(dir);
        }
        config.apply_mode(&mode_flags);
        log::debug!(
            "configured {} build for {triple} ({family} toolchain, {} workers)",
            settings.mode,
            config.parallelism
        );

        Ok(Self {
            platform_tag: settings.platform_tag,
            triple,
            family,
            commands,
            mode: settings.mode,
            force: settings.force,
            runtime: settings.runtime,
            layout: settings.layout,
            config,
            mode_flags,
            provider,
            runner,
            native: None,
            native_builds: 0,
        })
    }

    pub fn platform_tag(&self) -> &str {
        &self.platform_tag
    }

    pub fn triple(&self) -> &TargetTriple {
        &self.triple
    }

    pub fn family(&self) -> ToolchainFamily {
        self.family
    }

    /// Toolchain commands, already repaired for the target machine.
    pub fn commands(&self) -> &ToolchainCommands {
        &self.commands
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn runtime(&self) -> &RuntimeIdentity {
        &self.runtime
    }

    pub fn layout(&self) -> &BuildLayout {
        &self.layout
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    pub fn mode_flags(&self) -> &ModeFlags {
        &self.mode_flags
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// The binding metadata provider, or the fatal error for its absence.
    pub fn provider(&self) -> Result<&dyn BindingProvider> {
        self.provider
            .as_deref()
            .ok_or(BuildError::MissingBindingProvider)
    }

    /// The native library built earlier in this invocation, if any.
    pub fn native_library(&self) -> Option<&NativeLibraryArtifact> {
        self.native.as_ref()
    }

    /// How many times the native library step actually ran.
    pub fn native_builds(&self) -> usize {
        self.native_builds
    }

    pub(crate) fn record_native(&mut self, artifact: NativeLibraryArtifact) {
        self.native_builds += 1;
        self.native = Some(artifact);
    }
}
