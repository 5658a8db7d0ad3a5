//! Summary of a build invocation.

use std::fmt;

use ngsbuild_targets::TargetTriple;
use serde::Serialize;

use crate::context::BuildContext;
use crate::extension::CompiledArtifact;
use crate::mode::BuildMode;
use crate::native::NativeLibraryArtifact;

/// What a build step produced, printed after each build command.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub platform_tag: String,
    pub triple: TargetTriple,
    pub toolchain: String,
    pub mode: BuildMode,
    pub parallelism: usize,
    pub native_library: Option<NativeLibraryArtifact>,
    pub extensions: Vec<CompiledArtifact>,
    pub duration_ms: u64,
}

impl BuildReport {
    /// Snapshot the outcome recorded in `ctx`.
    pub fn new(ctx: &BuildContext, extensions: Vec<CompiledArtifact>, duration_ms: u64) -> Self {
        Self {
            platform_tag: ctx.platform_tag().to_string(),
            triple: ctx.triple().clone(),
            toolchain: ctx.family().to_string(),
            mode: ctx.mode(),
            parallelism: ctx.config().parallelism.get(),
            native_library: ctx.native_library().cloned(),
            extensions,
            duration_ms,
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Build Report ===")?;
        writeln!(f, "Platform: {} ({})", self.platform_tag, self.triple)?;
        writeln!(f, "Toolchain: {}", self.toolchain)?;
        writeln!(f, "Mode: {}", self.mode)?;
        writeln!(f, "Workers: {}", self.parallelism)?;
        writeln!(f, "Duration: {} ms", self.duration_ms)?;

        if let Some(lib) = &self.native_library {
            writeln!(f)?;
            writeln!(f, "--- Native Library ---")?;
            writeln!(
                f,
                "  {}: {}{}",
                lib.name,
                lib.path.display(),
                if lib.up_to_date { " (up to date)" } else { "" }
            )?;
        }

        if !self.extensions.is_empty() {
            writeln!(f)?;
            writeln!(f, "--- Extensions ({}) ---", self.extensions.len())?;
            for ext in &self.extensions {
                writeln!(f, "  {}: {}", ext.name, ext.path.display())?;
            }
        }

        Ok(())
    }
}
