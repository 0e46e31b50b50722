//! Environment-driven configuration.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Enables human-readable routing and fallback traces.
pub const DEBUG_ENV: &str = "MDX_HYBRID_DEBUG";
/// Directory searched for the platform artifact.
pub const NATIVE_DIR_ENV: &str = "MDX_HYBRID_NATIVE_DIR";
/// Explicit artifact path; bypasses the platform table.
pub const NATIVE_PATH_ENV: &str = "MDX_HYBRID_NATIVE_PATH";

/// Settings for a [`Compiler`](crate::Compiler).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HybridConfig {
    /// Promote routing/fallback traces from `debug` to `info`.
    pub debug: bool,
    /// Where to look for the native artifact. Defaults to the directory of the
    /// running executable.
    pub native_artifact_dir: Option<PathBuf>,
    /// Artifact path overriding the platform lookup.
    pub native_artifact: Option<PathBuf>,
}

impl HybridConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var_os(key))
    }

    /// Read configuration through `lookup` instead of the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<OsString>) -> Self {
        Self {
            debug: lookup(DEBUG_ENV).is_some_and(|v| flag_enabled(&v)),
            native_artifact_dir: lookup(NATIVE_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            native_artifact: lookup(NATIVE_PATH_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Toggle debug traces.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn flag_enabled(value: &OsStr) -> bool {
    let value = value.to_string_lossy();
    let value = value.trim();
    !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
}
