//! The uniform engine handle both compilation engines are adapted to.

use crate::error::{EngineError, LoadFailure};
use crate::options::CompileOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// In-process mdxjs engine with plugin support.
pub mod reference;
/// Out-of-process engine backed by a platform artifact.
pub mod native;

pub use native::{NativeEngine, NativeLoader, to_native_options};
pub use reference::{ReferenceEngine, ReferenceLoader};

/// Identity of a compilation engine.
///
/// The string forms `"reference"` and `"native"` (and the legacy `"js"` /
/// `"rust"`) only exist at serialization boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineId {
    /// Portable, always available engine.
    #[serde(alias = "js")]
    Reference,
    /// Optional engine loaded from a platform artifact.
    #[serde(alias = "rust")]
    Native,
}

impl EngineId {
    /// Both identities, in slot order.
    pub const ALL: [EngineId; 2] = [EngineId::Reference, EngineId::Native];

    /// Canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            EngineId::Reference => "reference",
            EngineId::Native => "native",
        }
    }

    /// The alternate engine.
    pub const fn other(self) -> EngineId {
        match self {
            EngineId::Reference => EngineId::Native,
            EngineId::Native => EngineId::Reference,
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            EngineId::Reference => 0,
            EngineId::Native => 1,
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown engine name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown engine `{0}`; expected `reference` or `native`")]
pub struct UnknownEngine(pub String);

impl FromStr for EngineId {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reference" | "js" => Ok(EngineId::Reference),
            "native" | "rust" => Ok(EngineId::Native),
            other => Err(UnknownEngine(other.to_string())),
        }
    }
}

/// Output of a single engine compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileResult {
    /// Generated JavaScript.
    pub code: String,
    /// Source map, opaque to the dispatcher.
    pub map: Option<serde_json::Value>,
    /// Wall-clock time spent inside the engine call.
    pub timing: Duration,
    /// Additional engine-reported metadata, passed through untouched.
    pub data: Option<serde_json::Value>,
}

impl CompileResult {
    /// Result with code and timing only.
    pub fn new(code: String, timing: Duration) -> Self {
        Self {
            code,
            map: None,
            timing,
            data: None,
        }
    }

    /// Timing in fractional milliseconds.
    pub fn timing_ms(&self) -> f64 {
        self.timing.as_secs_f64() * 1000.0
    }
}

/// A compilation engine, created once per identity and shared by every request.
///
/// Handles hold no per-request state. The blocking form must never suspend;
/// the non-blocking form may suspend inside the underlying engine.
#[async_trait]
pub trait Engine: Send + Sync + fmt::Debug {
    /// Identity this engine serves.
    fn name(&self) -> EngineId;

    /// Whether the engine can accept work.
    fn is_available(&self) -> bool {
        true
    }

    /// Whether [`Engine::compile_blocking`] may be called.
    fn supports_blocking(&self) -> bool {
        true
    }

    /// Compile without suspending.
    fn compile_blocking(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError>;

    /// Compile, possibly suspending.
    async fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError>;
}

/// Produces the handle for one engine identity.
///
/// The registry calls a loader at most once per identity (barring
/// cancellation of an in-flight non-blocking load).
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// Identity of the engine this loader produces.
    fn name(&self) -> EngineId;

    /// Load from a blocking context.
    ///
    /// Loaders whose artifact can only be loaded asynchronously keep the
    /// default, which reports [`LoadFailure::BlockingUnsupported`].
    fn load_blocking(&self) -> Result<Arc<dyn Engine>, LoadFailure> {
        Err(LoadFailure::BlockingUnsupported)
    }

    /// Load from a non-blocking context.
    async fn load(&self) -> Result<Arc<dyn Engine>, LoadFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_id_parse() {
        assert_eq!("reference".parse::<EngineId>().unwrap(), EngineId::Reference);
        assert_eq!("Native".parse::<EngineId>().unwrap(), EngineId::Native);
        assert_eq!("js".parse::<EngineId>().unwrap(), EngineId::Reference);
        assert_eq!("rust".parse::<EngineId>().unwrap(), EngineId::Native);
        assert_eq!(
            "wasm".parse::<EngineId>(),
            Err(UnknownEngine("wasm".to_string()))
        );
    }

    #[test]
    fn test_engine_id_serde_aliases() {
        let parsed: Vec<EngineId> = serde_json::from_str(r#"["js", "rust", "native"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![EngineId::Reference, EngineId::Native, EngineId::Native]
        );
        assert_eq!(
            serde_json::to_string(&EngineId::Reference).unwrap(),
            "\"reference\""
        );
    }

    #[test]
    fn test_other_engine() {
        assert_eq!(EngineId::Native.other(), EngineId::Reference);
        assert_eq!(EngineId::Reference.other(), EngineId::Native);
        assert_eq!(EngineId::Native.to_string(), "native");
    }

    #[test]
    fn test_timing_ms() {
        let result = CompileResult::new(String::new(), Duration::from_micros(1500));
        assert!((result.timing_ms() - 1.5).abs() < f64::EPSILON);
    }
}
