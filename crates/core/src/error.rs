use crate::engine::EngineId;
use markdown::message::{Message, Place};
use std::path::PathBuf;
use thiserror::Error;

/// Source location information for error reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Optional file path
    pub file: Option<String>,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl SourceLocation {
    /// Create a new source location
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            file: None,
            line,
            column,
        }
    }

    /// Create a source location with file information
    pub fn with_file(file: String, line: usize, column: usize) -> Self {
        Self {
            file: Some(file),
            line,
            column,
        }
    }

    /// Location of an mdxjs / markdown-rs message, when it carries one.
    pub fn of_message(message: &Message) -> Option<Self> {
        message.place.as_ref().map(|place| match place.as_ref() {
            Place::Point(point) => Self::new(point.line, point.column),
            Place::Position(position) => Self::new(position.start.line, position.start.column),
        })
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:{}:{}", file, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

/// Failure reported by an engine while compiling a document.
///
/// Engines do not know which identity they are registered under; the compiler
/// tags this error with the engine identity before it leaves the crate (see
/// [`HybridError::CompileFailure`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineError {
    /// Human readable reason.
    pub message: String,
    /// Position in the MDX source, when the engine reported one.
    pub location: Option<SourceLocation>,
}

impl EngineError {
    /// Create an engine error without location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    /// Attach a source location.
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Convert an mdxjs compile message, keeping its position.
    pub fn from_message(message: &Message) -> Self {
        Self {
            message: format!("MDX compilation failed: {}", message),
            location: SourceLocation::of_message(message),
        }
    }
}

/// Why resolving an engine produced no handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadFailure {
    /// The platform has no entry in the native artifact table.
    #[error("no native artifact is published for platform {0}")]
    UnsupportedPlatform(String),
    /// No directory is configured or derivable to search for the artifact.
    #[error("no directory to search for the native artifact")]
    NoArtifactDir,
    /// None of the candidate artifact files exist.
    #[error("native artifact not found (looked for {})", display_paths(.0))]
    MissingArtifact(Vec<PathBuf>),
    /// The artifact exists but could not be started.
    #[error("failed to start {}: {reason}", .path.display())]
    Spawn {
        /// Artifact path
        path: PathBuf,
        /// OS error text
        reason: String,
    },
    /// The artifact started but its probe answer was unusable.
    #[error("native artifact handshake failed: {0}")]
    Handshake(String),
    /// The engine loaded but reports itself unavailable.
    #[error("engine reports itself unavailable")]
    Disabled,
    /// The loader can only run from a non-blocking context.
    #[error("engine can only be loaded from a non-blocking context")]
    BlockingUnsupported,
    /// Any other loader-specific failure.
    #[error("{0}")]
    Other(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reason carried by [`HybridError::EngineUnavailable`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// Resolution ran and the engine is absent for the rest of the process.
    #[error("{0}")]
    Absent(LoadFailure),
    /// A blocking caller asked before any non-blocking resolution happened.
    #[error("engine has not been preloaded; call `preload_native` from an async context first")]
    NotPreloaded,
    /// A non-blocking resolution is still in flight.
    #[error("engine is still being loaded by a non-blocking caller")]
    Loading,
}

/// Terminal errors returned by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HybridError {
    /// An explicitly requested engine cannot be resolved.
    #[error("{engine} engine is not available: {reason}")]
    EngineUnavailable {
        /// Requested engine
        engine: EngineId,
        /// Why no handle exists
        reason: Unavailable,
    },
    /// A blocking call needs an engine that was only loadable without blocking.
    #[error(
        "synchronous loading of the {engine} engine is not supported in this mode; use the async API"
    )]
    SyncLoadUnsupported {
        /// Engine that cannot serve blocking callers
        engine: EngineId,
    },
    /// An engine rejected the input, or the reference fallback itself failed.
    #[error("{engine} engine failed: {source}")]
    CompileFailure {
        /// Engine that produced the failure
        engine: EngineId,
        /// Underlying engine error
        #[source]
        source: EngineError,
    },
}

impl HybridError {
    /// Wrap an engine error with the identity of the engine that raised it.
    pub fn compile(engine: EngineId, source: EngineError) -> Self {
        Self::CompileFailure { engine, source }
    }

    /// The engine this error is about.
    pub fn engine(&self) -> EngineId {
        match self {
            Self::EngineUnavailable { engine, .. }
            | Self::SyncLoadUnsupported { engine }
            | Self::CompileFailure { engine, .. } => *engine,
        }
    }
}

/// Non-fatal warning attached to an outcome after a soft fault.
///
/// Produced when the native engine fails on an auto-routed request and the
/// reference engine served it instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackWarning {
    /// Engine that failed
    pub failed: EngineId,
    /// Engine that produced the result
    pub served_by: EngineId,
    /// The original engine error
    pub original: EngineError,
}

impl FallbackWarning {
    /// Record a reroute from `failed` to the other engine.
    pub fn new(failed: EngineId, original: EngineError) -> Self {
        Self {
            failed,
            served_by: failed.other(),
            original,
        }
    }
}

impl std::fmt::Display for FallbackWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} engine encountered an error, falling back to {} engine: {}",
            self.failed, self.served_by, self.original
        )
    }
}
