//! Error types for target platform operations.

/// Errors that can occur while resolving a target toolchain.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// The requested compiler family is not one ngsbuild knows how to drive.
    #[error("unknown compiler family: '{name}' (expected unix, cygwin, mingw32 or msvc)")]
    UnknownFamily {
        /// The name that failed to parse.
        name: String,
    },

    /// A toolchain command vector was empty.
    #[error("empty command for toolchain tool '{tool}'")]
    EmptyCommand {
        /// The tool whose command is empty (e.g. "cc", "ar").
        tool: &'static str,
    },
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;
