//! JSON protocol spoken between the dispatcher and the native artifact.
//!
//! The artifact is invoked once per request: the request document is written to
//! its stdin and a single response document is read from its stdout. Invoking
//! it with [`PROBE_FLAG`] prints a [`ProbeResponse`] instead.

use crate::error::{EngineError, SourceLocation};
use crate::options::JsxRuntime;
use mdxjs::JsxRuntime as MdxJsxRuntime;
use serde::{Deserialize, Serialize};

/// Argument that makes the artifact answer a handshake and exit.
pub const PROBE_FLAG: &str = "--probe";

/// The narrower option set the native engine accepts.
///
/// Unset fields are omitted from the JSON so the artifact never mistakes an
/// explicit `false` or empty string for "use your default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeOptions {
    /// Generate development code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development: Option<bool>,
    /// Keep JSX in the output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx: Option<bool>,
    /// JSX runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx_runtime: Option<JsxRuntime>,
    /// Automatic runtime import source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsx_import_source: Option<String>,
    /// Classic element pragma.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragma: Option<String>,
    /// Classic fragment pragma.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragma_frag: Option<String>,
    /// Classic pragma import source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pragma_import_source: Option<String>,
    /// Component provider import source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_import_source: Option<String>,
    /// Document path for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
}

impl NativeOptions {
    /// Build mdxjs options, leaving unset fields at mdxjs defaults.
    pub fn to_mdxjs(&self) -> mdxjs::Options {
        let mut options = mdxjs::Options::default();

        if let Some(development) = self.development {
            options.development = development;
        }
        if let Some(jsx) = self.jsx {
            options.jsx = jsx;
        }
        if let Some(runtime) = self.jsx_runtime {
            options.jsx_runtime = Some(match runtime {
                JsxRuntime::Automatic => MdxJsxRuntime::Automatic,
                JsxRuntime::Classic => MdxJsxRuntime::Classic,
            });
        }
        if let Some(source) = &self.jsx_import_source {
            options.jsx_import_source = Some(source.clone());
        }
        if let Some(pragma) = &self.pragma {
            options.pragma = Some(pragma.clone());
        }
        if let Some(pragma_frag) = &self.pragma_frag {
            options.pragma_frag = Some(pragma_frag.clone());
        }
        if let Some(source) = &self.pragma_import_source {
            options.pragma_import_source = Some(source.clone());
        }
        if let Some(source) = &self.provider_import_source {
            options.provider_import_source = Some(source.clone());
        }
        if let Some(filepath) = &self.filepath {
            options.filepath = Some(filepath.clone());
        }

        options
    }
}

/// One compile request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeRequest {
    /// MDX source text.
    pub source: String,
    /// Translated options.
    #[serde(default)]
    pub options: NativeOptions,
}

/// Successful compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeOutput {
    /// Generated JavaScript.
    pub code: String,
    /// Source map, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<serde_json::Value>,
    /// Extra metadata, passed through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Compilation rejected by the artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeFailure {
    /// Error text.
    pub message: String,
    /// 1-indexed line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// 1-indexed column, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

impl From<EngineError> for NativeFailure {
    fn from(err: EngineError) -> Self {
        Self {
            line: err.location.as_ref().map(|l| l.line),
            column: err.location.as_ref().map(|l| l.column),
            message: err.message,
        }
    }
}

impl From<NativeFailure> for EngineError {
    fn from(failure: NativeFailure) -> Self {
        let err = EngineError::new(failure.message);
        match (failure.line, failure.column) {
            (Some(line), Some(column)) => err.with_location(SourceLocation::new(line, column)),
            _ => err,
        }
    }
}

/// Response document, externally tagged: `{"ok": {...}}` or `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeResponse {
    /// Compilation succeeded.
    Ok(NativeOutput),
    /// Compilation failed.
    Error(NativeFailure),
}

/// Answer to [`PROBE_FLAG`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Artifact name.
    pub name: String,
    /// Artifact version.
    pub version: String,
    /// Whether the artifact can serve requests on this machine.
    pub available: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_options_are_omitted() {
        let options = NativeOptions {
            development: Some(false),
            pragma: Some("h".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json, serde_json::json!({ "development": false, "pragma": "h" }));

        let empty = serde_json::to_string(&NativeOptions::default()).unwrap();
        assert_eq!(empty, "{}");
    }

    #[test]
    fn test_response_tagging() {
        let response: NativeResponse = serde_json::from_str(
            r#"{"error": {"message": "Unexpected end of file", "line": 1, "column": 9}}"#,
        )
        .unwrap();
        let NativeResponse::Error(failure) = response else {
            panic!("expected an error response");
        };
        let err = EngineError::from(failure);
        assert_eq!(err.message, "Unexpected end of file");
        assert_eq!(err.location, Some(SourceLocation::new(1, 9)));
    }

    #[test]
    fn test_ok_response_fields() {
        let output = NativeOutput {
            code: "export default 1".into(),
            map: None,
            data: None,
        };
        let json = serde_json::to_value(NativeResponse::Ok(output)).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": { "code": "export default 1" } }));

        // Timing is measured by the dispatcher; extra artifact fields are ignored.
        let parsed: NativeResponse =
            serde_json::from_str(r#"{"ok": {"code": "x", "timing_ms": 1.5}}"#).unwrap();
        assert!(matches!(parsed, NativeResponse::Ok(NativeOutput { ref code, .. }) if code == "x"));
    }

    #[test]
    fn test_request_defaults_options() {
        let request: NativeRequest = serde_json::from_str(r##"{"source": "# Hi"}"##).unwrap();
        assert_eq!(request.options, NativeOptions::default());
    }

    #[test]
    fn test_to_mdxjs_keeps_defaults_for_unset_fields() {
        let options = NativeOptions {
            jsx: Some(true),
            jsx_runtime: Some(JsxRuntime::Classic),
            ..Default::default()
        }
        .to_mdxjs();
        assert!(options.jsx);
        assert!(!options.development);
        assert!(matches!(options.jsx_runtime, Some(MdxJsxRuntime::Classic)));
        assert!(options.jsx_import_source.is_none());
    }
}
