//! Target platform classification and toolchain models for ngsbuild.
//!
//! A build starts from an opaque platform tag (e.g. `linux-x86_64`,
//! `macosx-11.0-arm64`, `win32`) and derives from it:
//! - **Target triple:** machine name, CPU family and OS family
//! - **Toolchain family:** unix-like, MinGW or MSVC command conventions
//! - **Toolchain commands:** the argv prefixes used to compile, link and archive

pub mod error;
pub mod platform;
pub mod toolchain;

pub use error::{Result, TargetError};
pub use platform::{classify, host_platform_tag, CpuFamily, OsFamily, TargetTriple};
pub use toolchain::{sanitize_arch_flags, ToolchainCommands, ToolchainFamily};
