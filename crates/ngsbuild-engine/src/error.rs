//! Build engine errors.

use std::path::PathBuf;

use ngsbuild_targets::TargetError;
use thiserror::Error;

/// Result type for build operations.
pub type Result<T> = std::result::Result<T, BuildError>;

/// Errors that abort a build step.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("a source translator is required to compile extensions (is `cython` installed?)")]
    MissingTranslator,

    #[error("failed to resolve the native binding metadata provider (check the [bindings] section)")]
    MissingBindingProvider,

    #[error("native toolchain program not found: {program}")]
    MissingCompiler { program: String },

    #[error("failed to invoke {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {}: {stderr}", exit_status(status))]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to translate extension '{unit}': {message}")]
    TranslationFailed { unit: String, message: String },

    #[error("failed to build extension '{unit}': {source}")]
    Unit {
        unit: String,
        #[source]
        source: Box<BuildError>,
    },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize packaging descriptor: {0}")]
    Descriptor(#[from] toml::ser::Error),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Target(#[from] TargetError),
}

fn exit_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

impl BuildError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap an error as the failure of one extension unit.
    pub fn unit(unit: impl Into<String>, source: BuildError) -> Self {
        Self::Unit {
            unit: unit.into(),
            source: Box::new(source),
        }
    }
}
