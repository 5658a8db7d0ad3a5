//! Build engine for packages pairing a vendored native library with
//! extension modules translated from an intermediate source form.
//!
//! A build invocation runs through a [`BuildContext`]:
//! classification of the platform tag, derivation of build-mode macros and
//! flags, repair of the toolchain commands, then one of the steps:
//! - [`build_native_library`]: compile the vendored sources into a static library
//! - [`compile_extensions`]: translate, compile and link every extension unit,
//!   building the native library first if this invocation has not yet done so
//! - [`clean()`]: remove generated files
//! - [`sdist`]: write the packaging descriptor and hand off to a packager

pub mod clean;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod extension;
pub mod fingerprint;
pub mod mode;
pub mod native;
pub mod provider;
pub mod report;
pub mod sdist;
pub mod translate;

pub use clean::{clean, CleanReport};
pub use config::{resolve_parallelism, BuildLayout, CompileConfig, Macro};
pub use context::{BuildContext, BuildSettings};
pub use error::{BuildError, Result};
pub use exec::{CommandOutput, CommandRunner, SystemRunner};
pub use extension::{compile_extensions, CompiledArtifact, ExtensionUnit, Language};
pub use mode::{derive, BuildMode, Directives, ModeFlags, RuntimeIdentity};
pub use native::{build_native_library, NativeLibraryArtifact, NativeLibrarySpec};
pub use provider::{resolve_command_bindings, BindingProvider, StaticBindings};
pub use report::BuildReport;
pub use sdist::BuildSystemDescriptor;
pub use translate::{CommandTranslator, CompileTimeValue, SourceTranslator, TranslationConfig};
