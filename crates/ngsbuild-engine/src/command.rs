//! Argument vector assembly for compiling, archiving and linking.
//!
//! GCC-style drivers (unix-like and MinGW) and MSVC tools spell the same
//! operations differently; these builders hide the difference from the steps.

use std::path::{Component, Path, PathBuf};

use ngsbuild_targets::ToolchainFamily;

use crate::config::Macro;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn is_cxx_source(source: &Path) -> bool {
    matches!(
        source.extension().and_then(|e| e.to_str()),
        Some("cpp" | "cc" | "cxx" | "C")
    )
}

/// One source file compiled to one object file.
#[derive(Debug, Clone, Copy)]
pub struct CompileInvocation<'a> {
    pub source: &'a Path,
    pub object: &'a Path,
    pub include_dirs: &'a [PathBuf],
    pub macros: &'a [Macro],
    /// Appended after the source, so they can override earlier flags.
    pub extra_args: &'a [String],
}

/// Command line compiling a single source file with the `base` compiler command.
pub fn compile_argv(family: ToolchainFamily, base: &[String], inv: &CompileInvocation<'_>) -> Vec<String> {
    let mut argv = base.to_vec();
    match family {
        ToolchainFamily::UnixLike | ToolchainFamily::Mingw => {
            argv.extend(inv.macros.iter().map(|m| format!("-D{m}")));
            argv.extend(inv.include_dirs.iter().map(|d| format!("-I{}", d.display())));
            argv.push("-c".into());
            argv.push(path_arg(inv.source));
            argv.push("-o".into());
            argv.push(path_arg(inv.object));
        }
        ToolchainFamily::Msvc => {
            argv.push("/c".into());
            argv.extend(inv.macros.iter().map(|m| format!("/D{m}")));
            argv.extend(inv.include_dirs.iter().map(|d| format!("/I{}", d.display())));
            let lang = if is_cxx_source(inv.source) { "/Tp" } else { "/Tc" };
            argv.push(format!("{lang}{}", inv.source.display()));
            argv.push(format!("/Fo{}", inv.object.display()));
        }
    }
    argv.extend(inv.extra_args.iter().cloned());
    argv
}

/// Command line archiving `objects` into the static library `output`.
pub fn archive_argv(
    family: ToolchainFamily,
    base: &[String],
    objects: &[PathBuf],
    output: &Path,
) -> Vec<String> {
    let mut argv = base.to_vec();
    match family {
        ToolchainFamily::Msvc => argv.push(format!("/OUT:{}", output.display())),
        ToolchainFamily::UnixLike | ToolchainFamily::Mingw => argv.push(path_arg(output)),
    }
    argv.extend(objects.iter().map(|o| path_arg(o)));
    argv
}

/// Inputs of a shared-module link.
#[derive(Debug, Clone, Copy)]
pub struct LinkInvocation<'a> {
    pub objects: &'a [PathBuf],
    /// Static libraries linked in by path.
    pub static_libs: &'a [PathBuf],
    /// Additional libraries linked by name.
    pub libraries: &'a [String],
    pub output: &'a Path,
}

/// Command line linking objects into a shared module with the `base` linker command.
pub fn link_argv(family: ToolchainFamily, base: &[String], inv: &LinkInvocation<'_>) -> Vec<String> {
    let mut argv = base.to_vec();
    argv.extend(inv.objects.iter().map(|o| path_arg(o)));
    argv.extend(inv.static_libs.iter().map(|l| path_arg(l)));
    match family {
        ToolchainFamily::UnixLike | ToolchainFamily::Mingw => {
            argv.extend(inv.libraries.iter().map(|l| format!("-l{l}")));
            argv.push("-o".into());
            argv.push(path_arg(inv.output));
        }
        ToolchainFamily::Msvc => {
            argv.extend(inv.libraries.iter().map(|l| format!("{l}.lib")));
            argv.push(format!("/OUT:{}", inv.output.display()));
        }
    }
    argv
}

/// Compile or link command for a unit. GCC-style drivers are swapped for the
/// C++ driver on C++ units, keeping the remaining flags of `base`.
pub fn driver_for(family: ToolchainFamily, base: &[String], compiler_cxx: &[String], cxx: bool) -> Vec<String> {
    let mut argv = base.to_vec();
    if cxx && family.is_gcc_like() {
        if let (Some(first), Some(driver)) = (argv.first_mut(), compiler_cxx.first()) {
            *first = driver.clone();
        }
    }
    argv
}

/// Object file path for `source` under `object_dir`, mirroring its location
/// relative to `root` so same-named sources in different directories do not clash.
pub fn object_path(object_dir: &Path, root: &Path, source: &Path, extension: &str) -> PathBuf {
    let relative = source.strip_prefix(root).unwrap_or(source);
    let mut out = object_dir.to_path_buf();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            out.push(part);
        }
    }
    out.set_extension(extension);
    out
}
