//! Host platform identification.
//!
//! Platform and architecture names follow the tokens CI runners report
//! (`linux`, `darwin`, `win32`; `x64`, `arm64`, …) because those are the
//! suffixes users write in cascaded input keys such as `url-win32-x64`.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Operating system as reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostPlatform {
    /// IBM AIX
    Aix,
    /// Android
    Android,
    /// Cygwin
    Cygwin,
    /// macOS
    Darwin,
    /// FreeBSD
    Freebsd,
    /// Haiku
    Haiku,
    /// Linux
    Linux,
    /// NetBSD
    Netbsd,
    /// OpenBSD
    Openbsd,
    /// Solaris and illumos
    Sunos,
    /// Windows
    Win32,
}

impl HostPlatform {
    /// Every known platform, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Aix,
        Self::Android,
        Self::Cygwin,
        Self::Darwin,
        Self::Freebsd,
        Self::Haiku,
        Self::Linux,
        Self::Netbsd,
        Self::Openbsd,
        Self::Sunos,
        Self::Win32,
    ];

    /// Get the current platform.
    pub fn current() -> Result<Self> {
        Self::parse(std::env::consts::OS)
    }

    /// Parse from a runner token or a Rust `target_os` name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aix" => Ok(Self::Aix),
            "android" => Ok(Self::Android),
            "cygwin" => Ok(Self::Cygwin),
            "darwin" | "macos" => Ok(Self::Darwin),
            "freebsd" => Ok(Self::Freebsd),
            "haiku" => Ok(Self::Haiku),
            "linux" => Ok(Self::Linux),
            "netbsd" => Ok(Self::Netbsd),
            "openbsd" => Ok(Self::Openbsd),
            "sunos" | "solaris" | "illumos" => Ok(Self::Sunos),
            "win32" | "windows" => Ok(Self::Win32),
            _ => Err(Error::unsupported_platform(s)),
        }
    }

    /// The canonical runner token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aix => "aix",
            Self::Android => "android",
            Self::Cygwin => "cygwin",
            Self::Darwin => "darwin",
            Self::Freebsd => "freebsd",
            Self::Haiku => "haiku",
            Self::Linux => "linux",
            Self::Netbsd => "netbsd",
            Self::Openbsd => "openbsd",
            Self::Sunos => "sunos",
            Self::Win32 => "win32",
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostPlatform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// CPU architecture as reported by the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostArch {
    /// 32-bit ARM
    Arm,
    /// 64-bit ARM
    Arm64,
    /// 32-bit x86
    Ia32,
    /// MIPS, big endian
    Mips,
    /// MIPS, little endian
    Mipsel,
    /// 32-bit PowerPC
    Ppc,
    /// 64-bit PowerPC
    Ppc64,
    /// 31-bit IBM Z
    S390,
    /// 64-bit IBM Z
    S390x,
    /// 64-bit x86
    X64,
}

impl HostArch {
    /// Every known architecture, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Arm,
        Self::Arm64,
        Self::Ia32,
        Self::Mips,
        Self::Mipsel,
        Self::Ppc,
        Self::Ppc64,
        Self::S390,
        Self::S390x,
        Self::X64,
    ];

    /// Get the current architecture.
    pub fn current() -> Result<Self> {
        Self::parse(std::env::consts::ARCH)
    }

    /// Parse from a runner token or a Rust `target_arch` name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "arm" => Ok(Self::Arm),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "ia32" | "x86" | "i686" => Ok(Self::Ia32),
            "mips" => Ok(Self::Mips),
            "mipsel" => Ok(Self::Mipsel),
            "ppc" | "powerpc" => Ok(Self::Ppc),
            "ppc64" | "powerpc64" => Ok(Self::Ppc64),
            "s390" => Ok(Self::S390),
            "s390x" => Ok(Self::S390x),
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            _ => Err(Error::unsupported_arch(s)),
        }
    }

    /// The canonical runner token.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Arm64 => "arm64",
            Self::Ia32 => "ia32",
            Self::Mips => "mips",
            Self::Mipsel => "mipsel",
            Self::Ppc => "ppc",
            Self::Ppc64 => "ppc64",
            Self::S390 => "s390",
            Self::S390x => "s390x",
            Self::X64 => "x64",
        }
    }
}

impl fmt::Display for HostArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostArch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Platform and architecture, read once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformContext {
    /// Host operating system
    pub platform: HostPlatform,
    /// Host CPU architecture
    pub arch: HostArch,
}

impl PlatformContext {
    /// Create a new platform context.
    #[must_use]
    pub const fn new(platform: HostPlatform, arch: HostArch) -> Self {
        Self { platform, arch }
    }

    /// Detect the platform of the running process.
    pub fn current() -> Result<Self> {
        Ok(Self {
            platform: HostPlatform::current()?,
            arch: HostArch::current()?,
        })
    }

    /// Name of a bare executable on this platform.
    #[must_use]
    pub fn executable_name(&self, name: &str) -> String {
        if self.platform == HostPlatform::Win32 {
            format!("{name}.exe")
        } else {
            name.to_string()
        }
    }
}

impl fmt::Display for PlatformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.platform, self.arch)
    }
}
