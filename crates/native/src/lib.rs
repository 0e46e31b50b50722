#![deny(missing_docs)]
//! The native MDX engine artifact.
//!
//! The binary answers one request per invocation using the JSON protocol in
//! [`mdx_hybrid_core::wire`]. The library half holds the request handling so it
//! can be tested without spawning a process.

use mdx_hybrid_core::EngineError;
use mdx_hybrid_core::wire::{NativeOutput, NativeRequest, NativeResponse, ProbeResponse};

/// Name reported by the probe.
pub const ARTIFACT_NAME: &str = "mdx-hybrid-native";

/// Handshake answer for this build.
pub fn probe() -> ProbeResponse {
    ProbeResponse {
        name: ARTIFACT_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        available: true,
    }
}

/// Compile one request. Compile errors are part of the response, not a failure
/// of the call.
pub fn compile_request(request: &NativeRequest) -> NativeResponse {
    let options = request.options.to_mdxjs();

    match mdxjs::compile(&request.source, &options) {
        Ok(code) => NativeResponse::Ok(NativeOutput {
            code,
            map: None,
            data: None,
        }),
        Err(message) => NativeResponse::Error(EngineError::from_message(&message).into()),
    }
}
