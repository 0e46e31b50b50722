//! Platform detection and the native artifact lookup table.
//!
//! Nothing outside native-engine resolution branches on the platform; the rest
//! of the crate only sees "native present" or "native absent".

use std::fmt;

/// C library flavour the artifact was linked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Libc {
    /// glibc
    Gnu,
    /// musl
    Musl,
    /// Microsoft C runtime
    Msvc,
    /// Platforms that ship a single system libc (macOS, FreeBSD, Android).
    System,
}

impl Libc {
    /// Libc of the running binary's target.
    pub const fn current() -> Self {
        if cfg!(target_env = "musl") {
            Libc::Musl
        } else if cfg!(target_env = "gnu") {
            Libc::Gnu
        } else if cfg!(target_env = "msvc") {
            Libc::Msvc
        } else {
            Libc::System
        }
    }

    /// Lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Libc::Gnu => "gnu",
            Libc::Musl => "musl",
            Libc::Msvc => "msvc",
            Libc::System => "system",
        }
    }
}

/// Normalized `(os, arch, libc)` key.
///
/// `os` and `arch` use the values of [`std::env::consts::OS`] and
/// [`std::env::consts::ARCH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Operating system
    pub os: &'static str,
    /// CPU architecture
    pub arch: &'static str,
    /// C library flavour
    pub libc: Libc,
}

impl Platform {
    /// Build a key.
    pub const fn new(os: &'static str, arch: &'static str, libc: Libc) -> Self {
        Self { os, arch, libc }
    }

    /// The platform this process runs on.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH, Libc::current())
    }

    /// Artifact suffixes to try, in order. Empty when the platform is unsupported.
    pub fn artifact_suffixes(&self) -> &'static [&'static str] {
        ARTIFACTS
            .iter()
            .find(|(platform, _)| platform == self)
            .map(|(_, suffixes)| *suffixes)
            .unwrap_or(&[])
    }

    /// Artifact file names to try, in order.
    pub fn artifact_names(&self) -> Vec<String> {
        self.artifact_suffixes()
            .iter()
            .map(|suffix| artifact_file_name(suffix))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.os, self.arch, self.libc.as_str())
    }
}

/// Base name shared by every artifact.
pub const ARTIFACT_STEM: &str = "mdx-hybrid-native";

/// File name of the artifact built for `suffix` (e.g. `linux-x64-gnu`).
pub fn artifact_file_name(suffix: &str) -> String {
    format!(
        "{}.{}{}",
        ARTIFACT_STEM,
        suffix,
        std::env::consts::EXE_SUFFIX
    )
}

/// Published artifacts. macOS tries the universal build before the
/// architecture-specific one.
static ARTIFACTS: &[(Platform, &[&str])] = &[
    (Platform::new("android", "aarch64", Libc::System), &["android-arm64"]),
    (Platform::new("android", "arm", Libc::System), &["android-arm-eabi"]),
    (Platform::new("windows", "x86_64", Libc::Msvc), &["win32-x64-msvc"]),
    (Platform::new("windows", "x86", Libc::Msvc), &["win32-ia32-msvc"]),
    (Platform::new("windows", "aarch64", Libc::Msvc), &["win32-arm64-msvc"]),
    (
        Platform::new("macos", "x86_64", Libc::System),
        &["darwin-universal", "darwin-x64"],
    ),
    (
        Platform::new("macos", "aarch64", Libc::System),
        &["darwin-universal", "darwin-arm64"],
    ),
    (Platform::new("freebsd", "x86_64", Libc::System), &["freebsd-x64"]),
    (Platform::new("linux", "x86_64", Libc::Gnu), &["linux-x64-gnu"]),
    (Platform::new("linux", "x86_64", Libc::Musl), &["linux-x64-musl"]),
    (Platform::new("linux", "aarch64", Libc::Gnu), &["linux-arm64-gnu"]),
    (Platform::new("linux", "aarch64", Libc::Musl), &["linux-arm64-musl"]),
    (Platform::new("linux", "arm", Libc::Gnu), &["linux-arm-gnueabihf"]),
    (Platform::new("linux", "arm", Libc::Musl), &["linux-arm-musleabihf"]),
    (Platform::new("linux", "riscv64", Libc::Gnu), &["linux-riscv64-gnu"]),
    (Platform::new("linux", "riscv64", Libc::Musl), &["linux-riscv64-musl"]),
    (Platform::new("linux", "s390x", Libc::Gnu), &["linux-s390x-gnu"]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_libc_variants() {
        let gnu = Platform::new("linux", "x86_64", Libc::Gnu);
        let musl = Platform::new("linux", "x86_64", Libc::Musl);
        assert_eq!(gnu.artifact_suffixes(), &["linux-x64-gnu"]);
        assert_eq!(musl.artifact_suffixes(), &["linux-x64-musl"]);
    }

    #[test]
    fn test_macos_prefers_universal() {
        let mac = Platform::new("macos", "aarch64", Libc::System);
        assert_eq!(mac.artifact_suffixes(), &["darwin-universal", "darwin-arm64"]);
    }

    #[test]
    fn test_unsupported_platform() {
        let s390x_musl = Platform::new("linux", "s390x", Libc::Musl);
        assert!(s390x_musl.artifact_suffixes().is_empty());
        assert!(Platform::new("plan9", "mips", Libc::System).artifact_names().is_empty());
    }

    #[test]
    fn test_artifact_file_name() {
        let name = artifact_file_name("linux-x64-gnu");
        assert!(name.starts_with("mdx-hybrid-native.linux-x64-gnu"));
        assert_eq!(
            Platform::new("linux", "arm", Libc::Gnu).to_string(),
            "linux/arm/gnu"
        );
    }
}
