//! Per-request compile options shared by both engines.

use crate::engine::{EngineId, UnknownEngine};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Which engine the caller asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Let the routing policy decide.
    #[default]
    Auto,
    /// Force the reference engine.
    #[serde(alias = "js")]
    Reference,
    /// Force the native engine; failures are never substituted.
    #[serde(alias = "rust")]
    Native,
}

impl EnginePreference {
    /// The forced engine, if any.
    pub fn explicit(self) -> Option<EngineId> {
        match self {
            EnginePreference::Auto => None,
            EnginePreference::Reference => Some(EngineId::Reference),
            EnginePreference::Native => Some(EngineId::Native),
        }
    }
}

impl From<EngineId> for EnginePreference {
    fn from(id: EngineId) -> Self {
        match id {
            EngineId::Reference => EnginePreference::Reference,
            EngineId::Native => EnginePreference::Native,
        }
    }
}

impl FromStr for EnginePreference {
    type Err = UnknownEngine;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(EnginePreference::Auto);
        }
        s.parse::<EngineId>().map(EnginePreference::from)
    }
}

/// JSX runtime flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsxRuntime {
    /// `react/jsx-runtime` style imports.
    Automatic,
    /// `React.createElement` style pragmas.
    Classic,
}

/// Module format of the generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// ES module program.
    Esm,
    /// CommonJS module.
    Cjs,
    /// Bare function body for `new Function` evaluation.
    FunctionBody,
}

/// Extension applied to the MDX source before it is compiled.
///
/// Only the reference engine can run plugins; declaring any forces auto
/// routing onto it.
pub trait SourcePlugin: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Rewrite the source, borrowing it when nothing changes.
    fn transform<'a>(&self, source: &'a str) -> Result<Cow<'a, str>, EngineError>;
}

/// Extension applied to the generated program after compilation.
pub trait OutputPlugin: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Rewrite the generated code in place.
    fn transform(&self, code: &mut String) -> Result<(), EngineError>;
}

impl fmt::Debug for dyn SourcePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourcePlugin").field(&self.name()).finish()
    }
}

impl fmt::Debug for dyn OutputPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OutputPlugin").field(&self.name()).finish()
    }
}

/// Options for one compile request.
///
/// `None` means "unset": engines fall back to their own defaults and the
/// native translation omits the field entirely.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Engine preference, `Auto` by default.
    pub engine: EnginePreference,
    /// Plugins run on the MDX source (remark stage).
    pub source_plugins: Vec<Arc<dyn SourcePlugin>>,
    /// Plugins run on the generated code (rehype/recma stage).
    pub output_plugins: Vec<Arc<dyn OutputPlugin>>,
    /// Generate development code.
    pub development: Option<bool>,
    /// Keep JSX in the output instead of compiling it to calls.
    pub jsx: Option<bool>,
    /// JSX runtime, `automatic` when unset.
    pub jsx_runtime: Option<JsxRuntime>,
    /// Module the automatic runtime is imported from.
    pub jsx_import_source: Option<String>,
    /// Classic runtime element pragma.
    pub pragma: Option<String>,
    /// Classic runtime fragment pragma.
    pub pragma_frag: Option<String>,
    /// Module the classic pragma is imported from.
    pub pragma_import_source: Option<String>,
    /// Module that provides components (`useMDXComponents`).
    pub provider_import_source: Option<String>,
    /// Request a source map.
    pub sourcemap: Option<bool>,
    /// Module format of the output.
    pub output_format: Option<OutputFormat>,
    /// Path of the document, used in diagnostics.
    pub filepath: Option<String>,
}

impl CompileOptions {
    /// Default options (auto routing, no plugins).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the engine preference.
    pub fn with_engine(mut self, engine: impl Into<EnginePreference>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Append a source plugin.
    pub fn with_source_plugin(mut self, plugin: Arc<dyn SourcePlugin>) -> Self {
        self.source_plugins.push(plugin);
        self
    }

    /// Append an output plugin.
    pub fn with_output_plugin(mut self, plugin: Arc<dyn OutputPlugin>) -> Self {
        self.output_plugins.push(plugin);
        self
    }

    /// Whether any extension plugin is declared.
    pub fn has_plugins(&self) -> bool {
        !self.source_plugins.is_empty() || !self.output_plugins.is_empty()
    }

    /// Reject option values no engine can honor.
    ///
    /// Both engines call this before compiling so a request fails the same
    /// way whichever engine serves it.
    pub fn check_supported(&self) -> Result<(), EngineError> {
        // mdxjs always emits a program; `cjs` is served as one too.
        if self.output_format == Some(OutputFormat::FunctionBody) {
            return Err(EngineError::new(
                "output format `function-body` is not supported; only programs can be emitted",
            ));
        }
        Ok(())
    }
}
