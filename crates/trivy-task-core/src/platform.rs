use std::fmt;
use std::str::FromStr;

/// Operating system of the machine running the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Windows,
    Other(String),
}

impl HostOs {
    pub fn current() -> Self {
        Self::from_name(std::env::consts::OS)
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "linux" => HostOs::Linux,
            "windows" => HostOs::Windows,
            other => HostOs::Other(other.to_string()),
        }
    }
}

/// CPU architecture of the machine running the task.
///
/// Unknown names are kept so the resolver can report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostArch {
    Arm,
    Arm64,
    X86_32,
    X86_64,
    Other(String),
}

impl HostArch {
    pub fn current() -> Self {
        Self::from_name(std::env::consts::ARCH)
    }

    /// Accepts both Rust target names (`aarch64`, `x86`) and the shorter
    /// names CI agents tend to report (`arm64`, `x64`, `x32`).
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "arm" => HostArch::Arm,
            "arm64" | "aarch64" => HostArch::Arm64,
            "x86" | "x32" | "i386" | "i686" | "x86_32" => HostArch::X86_32,
            "x86_64" | "x64" | "amd64" => HostArch::X86_64,
            _ => HostArch::Other(name.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            HostArch::Arm => "arm",
            HostArch::Arm64 => "arm64",
            HostArch::X86_32 => "x86_32",
            HostArch::X86_64 => "x86_64",
            HostArch::Other(name) => name,
        }
    }
}

impl fmt::Display for HostArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HostArch {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}
