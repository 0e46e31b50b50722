//! Reference engine: mdxjs compiled into the process.
//!
//! This is the only engine that runs extension plugins. Source plugins see the
//! raw MDX before mdxjs parses it; output plugins rewrite the generated
//! program afterwards.

use super::native::to_native_options;
use super::{CompileResult, Engine, EngineId, EngineLoader};
use crate::error::{EngineError, LoadFailure};
use crate::options::CompileOptions;
use async_trait::async_trait;
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

/// Portable engine backed by the `mdxjs` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceEngine;

impl ReferenceEngine {
    /// Create the engine.
    pub fn new() -> Self {
        Self
    }

    fn run(source: &str, options: &CompileOptions) -> Result<CompileResult, EngineError> {
        let start = Instant::now();
        options.check_supported()?;

        let mut content = Cow::Borrowed(source);
        for plugin in &options.source_plugins {
            let next = plugin.transform(content.as_ref()).map_err(|err| {
                EngineError {
                    message: format!("source plugin `{}` failed: {}", plugin.name(), err.message),
                    ..err
                }
            })?;
            content = Cow::Owned(next.into_owned());
        }

        // Both engines hand mdxjs the same option set.
        let mdx_options = to_native_options(options).to_mdxjs();
        let mut code = mdxjs::compile(&content, &mdx_options)
            .map_err(|message| EngineError::from_message(&message))?;

        for plugin in &options.output_plugins {
            plugin.transform(&mut code).map_err(|err| EngineError {
                message: format!("output plugin `{}` failed: {}", plugin.name(), err.message),
                ..err
            })?;
        }

        Ok(CompileResult::new(code, start.elapsed()))
    }
}

#[async_trait]
impl Engine for ReferenceEngine {
    fn name(&self) -> EngineId {
        EngineId::Reference
    }

    fn compile_blocking(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError> {
        Self::run(source, options)
    }

    async fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError> {
        let source = source.to_owned();
        let options = options.clone();
        tokio::task::spawn_blocking(move || Self::run(&source, &options))
            .await
            .map_err(|err| EngineError::new(format!("reference engine task failed: {}", err)))?
    }
}

/// Loader for [`ReferenceEngine`]; supports both load paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceLoader;

#[async_trait]
impl EngineLoader for ReferenceLoader {
    fn name(&self) -> EngineId {
        EngineId::Reference
    }

    fn load_blocking(&self) -> Result<Arc<dyn Engine>, LoadFailure> {
        Ok(Arc::new(ReferenceEngine::new()))
    }

    async fn load(&self) -> Result<Arc<dyn Engine>, LoadFailure> {
        self.load_blocking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{JsxRuntime, OutputFormat, OutputPlugin, SourcePlugin};

    struct Shortcode;

    impl SourcePlugin for Shortcode {
        fn name(&self) -> &str {
            "shortcode"
        }

        fn transform<'a>(&self, source: &'a str) -> Result<Cow<'a, str>, EngineError> {
            if source.contains("[[hello]]") {
                Ok(Cow::Owned(source.replace("[[hello]]", "Hello from a plugin")))
            } else {
                Ok(Cow::Borrowed(source))
            }
        }
    }

    struct Banner;

    impl OutputPlugin for Banner {
        fn name(&self) -> &str {
            "banner"
        }

        fn transform(&self, code: &mut String) -> Result<(), EngineError> {
            code.insert_str(0, "/* generated */\n");
            Ok(())
        }
    }

    struct Reject;

    impl OutputPlugin for Reject {
        fn name(&self) -> &str {
            "reject"
        }

        fn transform(&self, _code: &mut String) -> Result<(), EngineError> {
            Err(EngineError::new("nope"))
        }
    }

    #[test]
    fn test_compile_basic_document() {
        let result = ReferenceEngine::new()
            .compile_blocking("# Hello\n\nThis is MDX", &CompileOptions::default())
            .expect("compile should succeed");

        assert!(result.code.contains("_createMdxContent"));
        assert!(result.code.contains("MDXContent"));
        assert!(result.map.is_none());
    }

    #[test]
    fn test_unclosed_tag_fails() {
        let err = ReferenceEngine::new()
            .compile_blocking("<Button>", &CompileOptions::default())
            .unwrap_err();
        assert!(err.message.starts_with("MDX compilation failed"));
        assert!(err.message.contains("Button"));
    }

    #[test]
    fn test_plugins_run_around_compilation() {
        let options = CompileOptions::default()
            .with_source_plugin(Arc::new(Shortcode))
            .with_output_plugin(Arc::new(Banner));
        let result = ReferenceEngine::new()
            .compile_blocking("[[hello]]", &options)
            .unwrap();

        assert!(result.code.starts_with("/* generated */\n"));
        assert!(result.code.contains("Hello from a plugin"));
    }

    #[test]
    fn test_plugin_failure_names_plugin() {
        let options = CompileOptions::default().with_output_plugin(Arc::new(Reject));
        let err = ReferenceEngine::new()
            .compile_blocking("# Title", &options)
            .unwrap_err();
        assert_eq!(err.message, "output plugin `reject` failed: nope");
    }

    #[test]
    fn test_classic_runtime_uses_pragma() {
        let options = CompileOptions {
            jsx_runtime: Some(JsxRuntime::Classic),
            pragma: Some("h".into()),
            pragma_frag: Some("Fragment".into()),
            pragma_import_source: Some("preact".into()),
            ..Default::default()
        };
        let result = ReferenceEngine::new()
            .compile_blocking("# Hi", &options)
            .unwrap();
        assert!(result.code.contains("preact"));
    }

    #[test]
    fn test_function_body_rejected() {
        let options = CompileOptions {
            output_format: Some(OutputFormat::FunctionBody),
            ..Default::default()
        };
        let err = ReferenceEngine::new()
            .compile_blocking("# Hi", &options)
            .unwrap_err();
        assert!(err.message.contains("function-body"));
    }

    #[tokio::test]
    async fn test_async_compile_matches_blocking() {
        let engine = ReferenceEngine::new();
        let options = CompileOptions::default();
        let blocking = engine.compile_blocking("# Same", &options).unwrap();
        let async_result = engine.compile("# Same", &options).await.unwrap();
        assert_eq!(blocking.code, async_result.code);
    }
}
