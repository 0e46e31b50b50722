//! Fallback-aware compilation on top of the registry and routing policy.

use crate::config::HybridConfig;
use crate::engine::{CompileResult, EngineId, EngineLoader};
use crate::error::{EngineError, FallbackWarning, HybridError};
use crate::options::{CompileOptions, EnginePreference};
use crate::policy::{self, Route};
use crate::registry::{EngineRegistry, EngineStatus};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;

/// Result of a compile request, with any soft-fault warning attached.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackOutcome {
    /// Compilation output.
    pub result: CompileResult,
    /// Engine that produced `result`.
    pub engine: EngineId,
    /// Set when the native engine failed and the reference engine took over.
    pub warning: Option<FallbackWarning>,
}

/// Usability of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    /// Whether the engine can serve requests.
    pub available: bool,
    /// Why it cannot, when it cannot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EngineReport {
    fn available() -> Self {
        Self {
            available: true,
            reason: None,
        }
    }

    fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            available: false,
            reason: Some(reason.into()),
        }
    }

    fn from_status(status: EngineStatus, blocking: bool) -> Self {
        match status {
            EngineStatus::Present { blocking: false } if blocking => {
                Self::unavailable("engine can only be used from async callers")
            }
            EngineStatus::Present { .. } => Self::available(),
            EngineStatus::Absent(failure) => Self::unavailable(failure.to_string()),
            EngineStatus::Resolving => Self::unavailable("engine is still loading"),
            EngineStatus::Unresolved => Self::unavailable("engine has not been loaded yet"),
        }
    }
}

/// Per-engine diagnostic report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    /// Reference engine.
    pub reference: EngineReport,
    /// Native engine.
    pub native: EngineReport,
}

impl EngineInfo {
    /// Report for `id`.
    pub fn get(&self, id: EngineId) -> &EngineReport {
        match id {
            EngineId::Reference => &self.reference,
            EngineId::Native => &self.native,
        }
    }
}

/// Entry point for compiling MDX with either engine.
///
/// Each compiler owns its own [`EngineRegistry`]; engines resolved by one
/// compiler are invisible to another.
#[derive(Debug, Clone)]
pub struct Compiler {
    registry: Arc<EngineRegistry>,
    config: HybridConfig,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// Compiler configured from the environment.
    pub fn new() -> Self {
        Self::with_config(HybridConfig::from_env())
    }

    /// Compiler with explicit configuration and the standard loaders.
    pub fn with_config(config: HybridConfig) -> Self {
        Self {
            registry: Arc::new(EngineRegistry::from_config(&config)),
            config,
        }
    }

    /// Compiler with custom loaders.
    ///
    /// Same precondition as [`EngineRegistry::with_loaders`]: each loader
    /// reports the identity of its slot.
    pub fn with_loaders(
        reference: Arc<dyn EngineLoader>,
        native: Arc<dyn EngineLoader>,
        config: HybridConfig,
    ) -> Self {
        Self {
            registry: Arc::new(EngineRegistry::with_loaders(reference, native)),
            config,
        }
    }

    /// The registry backing this compiler.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    /// Active configuration.
    pub fn config(&self) -> &HybridConfig {
        &self.config
    }

    fn trace(&self, message: std::fmt::Arguments<'_>) {
        if self.config.debug {
            log::info!("[mdx-hybrid] {}", message);
        } else {
            log::debug!("{}", message);
        }
    }

    fn report_fallback(&self, warning: &FallbackWarning) {
        if self.config.debug {
            log::warn!("[mdx-hybrid] {}", warning);
        } else {
            log::debug!("{}", warning);
        }
    }

    async fn route(&self, options: &CompileOptions) -> Route {
        let route = match policy::explicit_route(options) {
            Some(route) => route,
            None => policy::auto_route(self.registry.is_available(EngineId::Native).await),
        };
        self.trace(format_args!("routing to {}", route));
        route
    }

    fn route_blocking(&self, options: &CompileOptions) -> Route {
        let route = policy::decide(options, || self.native_ready_blocking());
        self.trace(format_args!("routing to {} (blocking)", route));
        route
    }

    fn native_ready_blocking(&self) -> bool {
        matches!(
            self.registry.status(EngineId::Native),
            EngineStatus::Present { blocking: true }
        )
    }

    /// Turn an engine failure into a fallback warning, or a terminal error when
    /// the request does not allow substitution.
    fn soft_fault(
        &self,
        route: Route,
        options: &CompileOptions,
        err: EngineError,
    ) -> Result<FallbackWarning, HybridError> {
        if route.engine == EngineId::Native && options.engine == EnginePreference::Auto {
            let warning = FallbackWarning::new(EngineId::Native, err);
            self.report_fallback(&warning);
            Ok(warning)
        } else {
            Err(HybridError::compile(route.engine, err))
        }
    }

    /// Compile from a non-blocking context.
    ///
    /// May resolve engines on first use. A native failure on an auto-routed
    /// request is absorbed: the reference engine serves the request and the
    /// outcome carries a [`FallbackWarning`].
    pub async fn compile_with_fallback(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<FallbackOutcome, HybridError> {
        let route = self.route(options).await;
        check_supported(route, options)?;
        let engine = self.registry.resolve(route.engine).await?;

        let err = match engine.compile(source, options).await {
            Ok(result) => {
                return Ok(FallbackOutcome {
                    result,
                    engine: route.engine,
                    warning: None,
                });
            }
            Err(err) => err,
        };

        let warning = self.soft_fault(route, options, err)?;
        let reference = self.registry.resolve(EngineId::Reference).await?;
        let result = reference
            .compile(source, options)
            .await
            .map_err(|err| HybridError::compile(EngineId::Reference, err))?;
        Ok(FallbackOutcome {
            result,
            engine: EngineId::Reference,
            warning: Some(warning),
        })
    }

    /// Compile from a blocking context.
    ///
    /// Never suspends and never loads the native engine: auto routing only
    /// picks native once [`Compiler::preload_native`] has resolved it.
    pub fn compile_with_fallback_blocking(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<FallbackOutcome, HybridError> {
        let route = self.route_blocking(options);
        check_supported(route, options)?;
        let engine = self.registry.resolve_blocking(route.engine)?;

        let err = match engine.compile_blocking(source, options) {
            Ok(result) => {
                return Ok(FallbackOutcome {
                    result,
                    engine: route.engine,
                    warning: None,
                });
            }
            Err(err) => err,
        };

        let warning = self.soft_fault(route, options, err)?;
        let reference = self.registry.resolve_blocking(EngineId::Reference)?;
        let result = reference
            .compile_blocking(source, options)
            .map_err(|err| HybridError::compile(EngineId::Reference, err))?;
        Ok(FallbackOutcome {
            result,
            engine: EngineId::Reference,
            warning: Some(warning),
        })
    }

    /// Like [`Compiler::compile_with_fallback`], returning only the result.
    pub async fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, HybridError> {
        self.compile_with_fallback(source, options)
            .await
            .map(|outcome| outcome.result)
    }

    /// Like [`Compiler::compile_with_fallback_blocking`], returning only the result.
    pub fn compile_blocking(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, HybridError> {
        self.compile_with_fallback_blocking(source, options)
            .map(|outcome| outcome.result)
    }

    /// Resolve `id` now so later blocking calls can use it.
    pub async fn preload(&self, id: EngineId) -> Result<(), HybridError> {
        self.registry.resolve(id).await.map(|_| ())
    }

    /// Resolve the native engine now.
    pub async fn preload_native(&self) -> Result<(), HybridError> {
        self.preload(EngineId::Native).await
    }

    /// Usability of both engines, resolving them if needed.
    pub async fn engine_info(&self) -> EngineInfo {
        for id in EngineId::ALL {
            // Failures are reported through the status below.
            let _ = self.registry.resolve(id).await;
        }
        self.snapshot(false)
    }

    /// Usability of both engines for blocking callers.
    ///
    /// Resolves the reference engine if it supports blocking loads; never
    /// loads the native engine.
    pub fn engine_info_blocking(&self) -> EngineInfo {
        let _ = self.registry.resolve_blocking(EngineId::Reference);
        self.snapshot(true)
    }

    fn snapshot(&self, blocking: bool) -> EngineInfo {
        let report = |id| {
            let status = self.registry.status(id);
            if blocking && id == EngineId::Native && status == EngineStatus::Unresolved {
                return EngineReport::unavailable(
                    "native engine has not been preloaded; call `preload_native` first",
                );
            }
            EngineReport::from_status(status, blocking)
        };
        EngineInfo {
            reference: report(EngineId::Reference),
            native: report(EngineId::Native),
        }
    }
}

/// Unsupported options fail identically on either engine and are never
/// treated as a soft fault.
fn check_supported(route: Route, options: &CompileOptions) -> Result<(), HybridError> {
    options
        .check_supported()
        .map_err(|err| HybridError::compile(route.engine, err))
}

static DEFAULT_COMPILER: Lazy<Compiler> = Lazy::new(Compiler::new);

/// The process-wide compiler used by the free functions.
pub fn default_compiler() -> &'static Compiler {
    &DEFAULT_COMPILER
}

/// Compile with the process-wide compiler.
pub async fn compile(source: &str, options: &CompileOptions) -> Result<CompileResult, HybridError> {
    default_compiler().compile(source, options).await
}

/// Compile with the process-wide compiler from a blocking context.
pub fn compile_blocking(source: &str, options: &CompileOptions) -> Result<CompileResult, HybridError> {
    default_compiler().compile_blocking(source, options)
}

/// Resolve the process-wide compiler's native engine.
pub async fn preload_native() -> Result<(), HybridError> {
    default_compiler().preload_native().await
}

/// Engine report of the process-wide compiler.
pub async fn engine_info() -> EngineInfo {
    default_compiler().engine_info().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, ReferenceLoader};
    use crate::error::{LoadFailure, Unavailable};
    use async_trait::async_trait;

    struct Missing;

    #[async_trait]
    impl EngineLoader for Missing {
        fn name(&self) -> EngineId {
            EngineId::Native
        }

        async fn load(&self) -> Result<Arc<dyn Engine>, LoadFailure> {
            Err(LoadFailure::NoArtifactDir)
        }
    }

    fn compiler() -> Compiler {
        Compiler::with_loaders(
            Arc::new(ReferenceLoader),
            Arc::new(Missing),
            HybridConfig::default(),
        )
    }

    #[test]
    fn test_blocking_auto_uses_reference_without_preload() {
        let compiler = compiler();
        let outcome = compiler
            .compile_with_fallback_blocking("# Hello\n\nThis is MDX", &CompileOptions::new())
            .unwrap();
        assert_eq!(outcome.engine, EngineId::Reference);
        assert!(outcome.warning.is_none());
        assert!(outcome.result.code.contains("_createMdxContent"));
        assert_eq!(
            compiler.registry().status(EngineId::Native),
            EngineStatus::Unresolved
        );
    }

    #[test]
    fn test_blocking_info_before_preload() {
        let info = compiler().engine_info_blocking();
        assert!(info.reference.available);
        assert!(!info.native.available);
        assert!(info.native.reason.as_deref().unwrap().contains("preload"));
    }

    #[tokio::test]
    async fn test_info_reports_absence_reason() {
        let info = compiler().engine_info().await;
        assert!(info.get(EngineId::Reference).available);
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            serde_json::json!({
                "reference": { "available": true },
                "native": {
                    "available": false,
                    "reason": "no directory to search for the native artifact",
                },
            })
        );
    }

    #[tokio::test]
    async fn test_preload_absent_native() {
        let err = compiler().preload_native().await.unwrap_err();
        assert_eq!(
            err,
            HybridError::EngineUnavailable {
                engine: EngineId::Native,
                reason: Unavailable::Absent(LoadFailure::NoArtifactDir),
            }
        );
    }

    #[tokio::test]
    async fn test_reference_failure_is_tagged() {
        let err = compiler()
            .compile("<Button>", &CompileOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.engine(), EngineId::Reference);
        assert!(matches!(err, HybridError::CompileFailure { .. }));
    }
}
