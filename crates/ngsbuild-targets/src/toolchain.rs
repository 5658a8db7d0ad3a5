//! Toolchain families and the command vectors used to drive them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};
use crate::platform::OsFamily;

/// Command-line conventions of a native toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolchainFamily {
    /// GCC/Clang style drivers (`unix` and `cygwin` compilers).
    UnixLike,
    /// GCC targeting Windows.
    Mingw,
    /// Microsoft Visual C++ (`cl.exe`, `link.exe`, `lib.exe`).
    Msvc,
}

impl ToolchainFamily {
    /// The family used when none is requested explicitly.
    pub fn default_for(os: OsFamily) -> Self {
        match os {
            OsFamily::Windows => ToolchainFamily::Msvc,
            _ => ToolchainFamily::UnixLike,
        }
    }

    /// Whether the toolchain accepts GCC-style flags (`-g`, `-I`, `-D`).
    pub fn is_gcc_like(&self) -> bool {
        matches!(self, ToolchainFamily::UnixLike | ToolchainFamily::Mingw)
    }

    /// File extension of object files.
    pub fn object_extension(&self) -> &'static str {
        match self {
            ToolchainFamily::Msvc => "obj",
            _ => "o",
        }
    }

    /// File name of a static library called `name`.
    pub fn static_lib_name(&self, name: &str) -> String {
        match self {
            ToolchainFamily::Msvc => format!("{name}.lib"),
            _ => format!("lib{name}.a"),
        }
    }
}

impl fmt::Display for ToolchainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolchainFamily::UnixLike => "unix",
            ToolchainFamily::Mingw => "mingw32",
            ToolchainFamily::Msvc => "msvc",
        })
    }
}

impl FromStr for ToolchainFamily {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unix" | "cygwin" | "unix-like" => Ok(ToolchainFamily::UnixLike),
            "mingw32" | "mingw" => Ok(ToolchainFamily::Mingw),
            "msvc" => Ok(ToolchainFamily::Msvc),
            other => Err(TargetError::UnknownFamily {
                name: other.to_string(),
            }),
        }
    }
}

/// Argument vectors (program followed by its default flags) for each tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ToolchainCommands {
    /// Plain compiler invocation. No build step runs it; it is kept in step
    /// with `compiler_so` (overrides, `CFLAGS`, `-arch` sanitizing) so the
    /// commands describe the whole toolchain.
    pub compiler: Vec<String>,
    /// Compiler invocation for position-independent objects.
    pub compiler_so: Vec<String>,
    /// Compiler driver used to link C++ objects.
    pub compiler_cxx: Vec<String>,
    /// Linker invocation for shared objects.
    pub linker_so: Vec<String>,
    /// Static library archiver.
    pub archiver: Vec<String>,
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn split_words(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

impl ToolchainCommands {
    /// Default commands for a toolchain family.
    pub fn defaults(family: ToolchainFamily) -> Self {
        match family {
            ToolchainFamily::UnixLike => Self {
                compiler: argv(&["cc"]),
                compiler_so: argv(&["cc", "-fPIC"]),
                compiler_cxx: argv(&["c++"]),
                linker_so: argv(&["cc", "-shared"]),
                archiver: argv(&["ar", "rcs"]),
            },
            ToolchainFamily::Mingw => Self {
                compiler: argv(&["gcc", "-O", "-Wall"]),
                compiler_so: argv(&["gcc", "-O", "-Wall"]),
                compiler_cxx: argv(&["g++", "-O", "-Wall"]),
                linker_so: argv(&["gcc", "-shared"]),
                archiver: argv(&["ar", "rcs"]),
            },
            ToolchainFamily::Msvc => Self {
                compiler: argv(&["cl.exe", "/nologo"]),
                compiler_so: argv(&["cl.exe", "/nologo"]),
                compiler_cxx: argv(&["cl.exe", "/nologo"]),
                linker_so: argv(&["link.exe", "/nologo", "/DLL"]),
                archiver: argv(&["lib.exe", "/nologo"]),
            },
        }
    }

    /// Default commands for a toolchain family building for `os`.
    ///
    /// macOS extension modules are loadable bundles resolving interpreter
    /// symbols at load time rather than plain shared libraries.
    pub fn for_target(family: ToolchainFamily, os: OsFamily) -> Self {
        let mut commands = Self::defaults(family);
        if family == ToolchainFamily::UnixLike && os == OsFamily::Macos {
            commands.linker_so = argv(&["cc", "-bundle", "-undefined", "dynamic_lookup"]);
        }
        commands
    }

    /// Apply the conventional `CC`, `CXX`, `CFLAGS`, `LDSHARED`, `LDFLAGS`
    /// and `AR` overrides, looked up through `lookup`.
    ///
    /// This is where multi-architecture flags usually enter the commands.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(cc) = lookup("CC").filter(|v| !v.trim().is_empty()) {
            let cc = split_words(&cc);
            let pic: Vec<String> = self.compiler_so.iter().skip(1).cloned().collect();
            self.compiler = cc.clone();
            self.compiler_so = cc.into_iter().chain(pic).collect();
        }
        if let Some(cxx) = lookup("CXX").filter(|v| !v.trim().is_empty()) {
            self.compiler_cxx = split_words(&cxx);
        }
        if let Some(ldshared) = lookup("LDSHARED").filter(|v| !v.trim().is_empty()) {
            self.linker_so = split_words(&ldshared);
        }
        if let Some(cflags) = lookup("CFLAGS") {
            self.compiler.extend(split_words(&cflags));
            self.compiler_so.extend(split_words(&cflags));
        }
        if let Some(ldflags) = lookup("LDFLAGS") {
            self.linker_so.extend(split_words(&ldflags));
        }
        if let Some(ar) = lookup("AR").filter(|v| !v.trim().is_empty()) {
            let flags: Vec<String> = self.archiver.iter().skip(1).cloned().collect();
            self.archiver = split_words(&ar).into_iter().chain(flags).collect();
        }
        self
    }

    /// Check every tool has at least a program name.
    pub fn validate(&self) -> Result<()> {
        let tools: [(&'static str, &Vec<String>); 5] = [
            ("compiler", &self.compiler),
            ("compiler_so", &self.compiler_so),
            ("compiler_cxx", &self.compiler_cxx),
            ("linker_so", &self.linker_so),
            ("archiver", &self.archiver),
        ];
        for (tool, command) in tools {
            if command.first().map_or(true, |p| p.is_empty()) {
                return Err(TargetError::EmptyCommand { tool });
            }
        }
        Ok(())
    }
}

/// Remove the first `-arch X` pair whose `X` differs from `machine`.
///
/// Returns whether a pair was removed. Only one pair is ever removed per call.
pub fn remove_mismatched_arch(args: &mut Vec<String>, machine: &str) -> bool {
    let found = (1..args.len()).find(|&i| args[i - 1] == "-arch" && args[i] != machine);
    match found {
        Some(i) => {
            args.remove(i);
            args.remove(i - 1);
            true
        }
        None => false,
    }
}

/// Strip universal-binary `-arch` flags that conflict with `machine`.
///
/// Toolchains on macOS default to multi-architecture builds, while the vendored
/// sources use CPU-specific SIMD instructions and must target one architecture.
/// The compiler, shared-object compiler and shared-object linker streams are
/// each scanned once, and only their first mismatched pair is removed: a
/// stream carrying two foreign `-arch` pairs keeps the second one.
pub fn sanitize_arch_flags(commands: &mut ToolchainCommands, machine: &str) {
    for (tool, flags) in [
        ("compiler", &mut commands.compiler),
        ("compiler_so", &mut commands.compiler_so),
        ("linker_so", &mut commands.linker_so),
    ] {
        if remove_mismatched_arch(flags, machine) {
            log::debug!("removed foreign -arch flag from {tool} (target machine {machine})");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(parts: &[&str]) -> Vec<String> {
        argv(parts)
    }

    #[test]
    fn family_parsing() {
        assert_eq!("unix".parse::<ToolchainFamily>().unwrap(), ToolchainFamily::UnixLike);
        assert_eq!("cygwin".parse::<ToolchainFamily>().unwrap(), ToolchainFamily::UnixLike);
        assert_eq!("mingw32".parse::<ToolchainFamily>().unwrap(), ToolchainFamily::Mingw);
        assert_eq!("msvc".parse::<ToolchainFamily>().unwrap(), ToolchainFamily::Msvc);
        assert!(matches!(
            "bcpp".parse::<ToolchainFamily>(),
            Err(TargetError::UnknownFamily { .. })
        ));
    }

    #[test]
    fn default_family_per_os() {
        assert_eq!(ToolchainFamily::default_for(OsFamily::Windows), ToolchainFamily::Msvc);
        assert_eq!(ToolchainFamily::default_for(OsFamily::Macos), ToolchainFamily::UnixLike);
        assert_eq!(ToolchainFamily::default_for(OsFamily::Unknown), ToolchainFamily::UnixLike);
    }

    #[test]
    fn library_naming() {
        assert_eq!(ToolchainFamily::UnixLike.static_lib_name("bwa"), "libbwa.a");
        assert_eq!(ToolchainFamily::Msvc.static_lib_name("bwa"), "bwa.lib");
        assert_eq!(ToolchainFamily::Msvc.object_extension(), "obj");
    }

    #[test]
    fn clean_input_is_unchanged() {
        let mut args = strings(&["clang", "-arch", "x86_64", "-O2", "-Wall"]);
        let before = args.clone();
        assert!(!remove_mismatched_arch(&mut args, "x86_64"));
        assert_eq!(args, before);
    }

    #[test]
    fn removes_only_first_mismatched_pair() {
        let mut args = strings(&["clang", "-arch", "arm64", "-arch", "x86_64", "-O2"]);
        assert!(remove_mismatched_arch(&mut args, "x86_64"));
        assert_eq!(args, strings(&["clang", "-arch", "x86_64", "-O2"]));
    }

    #[test]
    fn second_foreign_pair_survives_single_pass() {
        let mut args = strings(&["clang", "-arch", "arm64", "-arch", "ppc", "-arch", "x86_64"]);
        assert!(remove_mismatched_arch(&mut args, "x86_64"));
        // Known limitation: the `-arch ppc` pair is left in place.
        assert_eq!(args, strings(&["clang", "-arch", "ppc", "-arch", "x86_64"]));
    }

    #[test]
    fn trailing_arch_without_value_is_ignored() {
        let mut args = strings(&["clang", "-O2", "-arch"]);
        assert!(!remove_mismatched_arch(&mut args, "arm64"));
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn sanitize_touches_three_streams() {
        let universal = ["clang", "-arch", "arm64", "-arch", "x86_64"];
        let mut commands = ToolchainCommands {
            compiler: strings(&universal),
            compiler_so: strings(&universal),
            compiler_cxx: strings(&universal),
            linker_so: strings(&universal),
            archiver: strings(&["ar", "rcs"]),
        };
        sanitize_arch_flags(&mut commands, "arm64");
        let fixed = strings(&["clang", "-arch", "arm64"]);
        assert_eq!(commands.compiler, fixed);
        assert_eq!(commands.compiler_so, fixed);
        assert_eq!(commands.linker_so, fixed);
        // Only the three streams are repaired.
        assert_eq!(commands.compiler_cxx, strings(&universal));
    }

    #[test]
    fn env_overrides() {
        let commands = ToolchainCommands::defaults(ToolchainFamily::UnixLike).with_env_overrides(
            |key| match key {
                "CC" => Some("clang".into()),
                "CFLAGS" => Some("-arch arm64 -arch x86_64".into()),
                "AR" => Some("llvm-ar".into()),
                _ => None,
            },
        );
        assert_eq!(commands.compiler, strings(&["clang", "-arch", "arm64", "-arch", "x86_64"]));
        assert_eq!(
            commands.compiler_so,
            strings(&["clang", "-fPIC", "-arch", "arm64", "-arch", "x86_64"])
        );
        assert_eq!(commands.archiver, strings(&["llvm-ar", "rcs"]));
        assert_eq!(commands.linker_so, strings(&["cc", "-shared"]));
    }

    #[test]
    fn macos_links_bundles() {
        let mac = ToolchainCommands::for_target(ToolchainFamily::UnixLike, OsFamily::Macos);
        assert_eq!(mac.linker_so[1], "-bundle");
        let linux = ToolchainCommands::for_target(ToolchainFamily::UnixLike, OsFamily::LinuxOrAndroid);
        assert_eq!(linux, ToolchainCommands::defaults(ToolchainFamily::UnixLike));
    }

    #[test]
    fn validate_rejects_empty_program() {
        let mut commands = ToolchainCommands::defaults(ToolchainFamily::Msvc);
        assert!(commands.validate().is_ok());
        commands.archiver.clear();
        assert!(matches!(
            commands.validate(),
            Err(TargetError::EmptyCommand { tool: "archiver" })
        ));
    }
}
