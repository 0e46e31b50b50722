use mdx_hybrid_core::{
    CompileOptions, Compiler, Engine, EngineId, EngineLoader, EnginePreference, HybridConfig,
    HybridError, JsxRuntime, NativeLoader, OutputFormat, ReferenceLoader,
};
use std::sync::Arc;

const ARTIFACT: &str = env!("CARGO_BIN_EXE_mdx-hybrid-native");
const DOC: &str = "# Hello\n\nThis is MDX";

fn compiler() -> Compiler {
    Compiler::with_loaders(
        Arc::new(ReferenceLoader),
        Arc::new(NativeLoader::with_artifact(ARTIFACT)),
        HybridConfig::default(),
    )
}

#[tokio::test]
async fn probe_handshake_loads_engine() {
    let engine = NativeLoader::with_artifact(ARTIFACT).load().await.unwrap();
    assert_eq!(engine.name(), EngineId::Native);
    assert!(engine.is_available());
}

#[tokio::test]
async fn auto_routes_to_sidecar() {
    let outcome = compiler()
        .compile_with_fallback("# Hello\n\nThis is MDX", &CompileOptions::new())
        .await
        .unwrap();

    assert_eq!(outcome.engine, EngineId::Native);
    assert!(outcome.warning.is_none());
    assert!(outcome.result.code.contains("_createMdxContent"));
}

#[tokio::test]
async fn sidecar_matches_reference_output() {
    let compiler = compiler();
    let options = CompileOptions {
        jsx_runtime: Some(JsxRuntime::Automatic),
        jsx_import_source: Some("preact".into()),
        ..Default::default()
    };
    let source = "# Title\n\nSome *emphasis* and <Note>inline</Note>.";

    let native = compiler
        .compile_with_fallback(source, &options.clone().with_engine(EnginePreference::Native))
        .await
        .unwrap();
    let reference = compiler
        .compile_with_fallback(source, &options.with_engine(EnginePreference::Reference))
        .await
        .unwrap();

    assert_eq!(native.engine, EngineId::Native);
    assert_eq!(reference.engine, EngineId::Reference);
    assert_eq!(native.result.code, reference.result.code);
    assert!(native.result.code.contains("preact/jsx-runtime"));
}

#[tokio::test]
async fn unclosed_tag_fails_on_native() {
    let options = CompileOptions::new().with_engine(EnginePreference::Native);
    let err = compiler().compile("<Button>", &options).await.unwrap_err();

    match err {
        HybridError::CompileFailure { engine, source } => {
            assert_eq!(engine, EngineId::Native);
            assert!(source.message.contains("Button"));
            assert!(source.location.is_some());
        }
        other => panic!("expected compile failure, got {:?}", other),
    }
}

#[tokio::test]
async fn function_body_rejected_by_both_engines() {
    let compiler = compiler();
    let options = CompileOptions {
        output_format: Some(OutputFormat::FunctionBody),
        ..Default::default()
    };

    let native = compiler
        .compile(DOC, &options.clone().with_engine(EnginePreference::Native))
        .await
        .unwrap_err();
    let reference = compiler
        .compile(DOC, &options.with_engine(EnginePreference::Reference))
        .await
        .unwrap_err();

    let (
        HybridError::CompileFailure { source: native, .. },
        HybridError::CompileFailure { source: reference, .. },
    ) = (native, reference)
    else {
        panic!("expected compile failures on both engines");
    };
    assert_eq!(native, reference);
}

#[test]
fn blocking_compile_after_preload() {
    let compiler = compiler();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(compiler.preload_native()).unwrap();

    let outcome = compiler
        .compile_with_fallback_blocking("# Blocking", &CompileOptions::new())
        .unwrap();
    assert_eq!(outcome.engine, EngineId::Native);
    assert!(outcome.result.code.contains("MDXContent"));
}
