//! Platform tag classification.
//!
//! Maps the platform tag handed to a build (the same string used to name
//! wheels and build directories, e.g. `linux-x86_64` or `macosx-11.0-arm64`)
//! to a [`TargetTriple`]. Classification is a pure, total function: tags it
//! does not recognize map to the `Unknown` families instead of failing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// CPU family of the target machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuFamily {
    X86,
    Arm,
    Aarch64,
    Mips,
    Ppc,
    /// No special-casing applies.
    Unknown,
}

impl CpuFamily {
    /// Lowercase name, as exposed to compile-time constants.
    pub fn as_str(&self) -> &'static str {
        match self {
            CpuFamily::X86 => "x86",
            CpuFamily::Arm => "arm",
            CpuFamily::Aarch64 => "aarch64",
            CpuFamily::Mips => "mips",
            CpuFamily::Ppc => "ppc",
            CpuFamily::Unknown => "unknown",
        }
    }

    /// Whether the family was recognized.
    pub fn is_known(&self) -> bool {
        !matches!(self, CpuFamily::Unknown)
    }
}

impl fmt::Display for CpuFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system family of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsFamily {
    Windows,
    Macos,
    /// Linux and Android share a kernel and are not told apart by the tag.
    LinuxOrAndroid,
    Freebsd,
    /// No special-casing applies.
    Unknown,
}

impl OsFamily {
    /// Lowercase name, as exposed to compile-time constants.
    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Windows => "windows",
            OsFamily::Macos => "macos",
            OsFamily::LinuxOrAndroid => "linux_or_android",
            OsFamily::Freebsd => "freebsd",
            OsFamily::Unknown => "unknown",
        }
    }

    /// Whether the family was recognized.
    pub fn is_known(&self) -> bool {
        !matches!(self, OsFamily::Unknown)
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classified target of a build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetTriple {
    /// Machine name as it appears in the tag (e.g. "x86_64", "arm64").
    pub machine: String,
    /// CPU family derived from the machine name.
    pub cpu_family: CpuFamily,
    /// OS family derived from the tag prefix.
    pub os_family: OsFamily,
}

impl fmt::Display for TargetTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.machine, self.cpu_family, self.os_family)
    }
}

/// Classify a platform tag.
pub fn classify(tag: &str) -> TargetTriple {
    let machine = target_machine(tag);
    let cpu_family = cpu_family(machine);
    TargetTriple {
        machine: machine.to_string(),
        cpu_family,
        os_family: os_family(tag),
    }
}

/// Extract the machine name: the last `-`-separated component of the tag.
///
/// `win32` carries no machine component and always denotes 32-bit x86.
pub fn target_machine(tag: &str) -> &str {
    if tag == "win32" {
        return "x86";
    }
    tag.rsplit('-').next().unwrap_or(tag)
}

/// Derive the CPU family from a machine name. First match wins.
pub fn cpu_family(machine: &str) -> CpuFamily {
    if machine.starts_with("mips") {
        CpuFamily::Mips
    } else if machine == "aarch64" || machine == "arm64" {
        CpuFamily::Aarch64
    } else if machine.starts_with("arm") {
        CpuFamily::Arm
    } else if is_x86(machine) {
        CpuFamily::X86
    } else if machine.starts_with("powerpc") || machine.starts_with("ppc") {
        CpuFamily::Ppc
    } else {
        CpuFamily::Unknown
    }
}

fn is_x86(machine: &str) -> bool {
    // `x86` also covers `x86_64`.
    if ["x86", "amd64", "AMD64"]
        .iter()
        .any(|prefix| machine.starts_with(prefix))
    {
        return true;
    }
    // i386, i486, i586, i686
    let bytes = machine.as_bytes();
    bytes.len() == 4 && bytes[0] == b'i' && &bytes[2..] == b"86"
}

/// Derive the OS family from the tag prefix.
pub fn os_family(tag: &str) -> OsFamily {
    if tag.starts_with("win") {
        OsFamily::Windows
    } else if tag.starts_with("macos") {
        OsFamily::Macos
    } else if tag.starts_with("linux")
        || tag.starts_with("manylinux")
        || tag.starts_with("musllinux")
    {
        OsFamily::LinuxOrAndroid
    } else if tag.starts_with("freebsd") {
        OsFamily::Freebsd
    } else {
        OsFamily::Unknown
    }
}

/// Platform tag of the machine running the build, used when the invoking
/// environment does not supply one.
pub fn host_platform_tag() -> String {
    let arch = std::env::consts::ARCH;
    match std::env::consts::OS {
        "windows" => match arch {
            "x86" => "win32".to_string(),
            "x86_64" => "win-amd64".to_string(),
            "aarch64" => "win-arm64".to_string(),
            other => format!("win-{other}"),
        },
        "macos" => {
            let machine = if arch == "aarch64" { "arm64" } else { arch };
            format!("macosx-{machine}")
        }
        os => format!("{os}-{arch}"),
    }
}
