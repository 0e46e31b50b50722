#![deny(missing_docs)]
//! mdx-hybrid core: routes MDX compilation between a portable reference engine
//! and an optional native engine, falling back when the native engine fails.
//!
//! The non-blocking API ([`Compiler::compile`]) needs a tokio runtime. The
//! blocking API ([`Compiler::compile_blocking`]) never suspends and only uses the
//! native engine after [`Compiler::preload_native`] has resolved it.

/// Fallback-aware compiler and the process-default entry points.
pub mod compiler;
/// Environment-driven configuration.
pub mod config;
/// Engine identities, the engine trait and both implementations.
pub mod engine;
/// Error taxonomy.
pub mod error;
/// Per-request compile options and plugin traits.
pub mod options;
/// Platform detection and artifact lookup.
pub mod platform;
/// Engine routing rules.
pub mod policy;
/// Lazily resolved engine slots.
pub mod registry;
/// Native artifact wire protocol.
pub mod wire;

pub use compiler::{
    Compiler, EngineInfo, EngineReport, FallbackOutcome, compile, compile_blocking,
    default_compiler, engine_info, preload_native,
};
pub use config::HybridConfig;
pub use engine::{
    CompileResult, Engine, EngineId, EngineLoader, NativeEngine, NativeLoader, ReferenceEngine,
    ReferenceLoader, UnknownEngine,
};
pub use error::{
    EngineError, FallbackWarning, HybridError, LoadFailure, SourceLocation, Unavailable,
};
pub use options::{
    CompileOptions, EnginePreference, JsxRuntime, OutputFormat, OutputPlugin, SourcePlugin,
};
pub use policy::{Route, RouteReason};
pub use registry::{EngineRegistry, EngineStatus};
