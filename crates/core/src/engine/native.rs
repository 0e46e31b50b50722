//! Native engine: a prebuilt platform artifact driven over stdin/stdout.
//!
//! The artifact is resolved through the [`platform`](crate::platform) table and
//! verified with a probe handshake. Loading it is a non-blocking operation only;
//! blocking callers get whatever an earlier non-blocking resolution produced.

use super::{CompileResult, Engine, EngineId, EngineLoader};
use crate::config::HybridConfig;
use crate::error::{EngineError, LoadFailure};
use crate::options::CompileOptions;
use crate::platform::{Platform, artifact_file_name};
use crate::wire::{NativeOptions, NativeRequest, NativeResponse, PROBE_FLAG, ProbeResponse};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

/// Translate common options into the native engine's narrower shape.
///
/// Plugin lists, `sourcemap` and `output_format` have no native counterpart and
/// are dropped; unset fields stay unset.
pub fn to_native_options(options: &CompileOptions) -> NativeOptions {
    NativeOptions {
        development: options.development,
        jsx: options.jsx,
        jsx_runtime: options.jsx_runtime,
        jsx_import_source: options.jsx_import_source.clone(),
        pragma: options.pragma.clone(),
        pragma_frag: options.pragma_frag.clone(),
        pragma_import_source: options.pragma_import_source.clone(),
        provider_import_source: options.provider_import_source.clone(),
        filepath: options.filepath.clone(),
    }
}

/// Handle to a verified native artifact.
#[derive(Debug, Clone)]
pub struct NativeEngine {
    artifact: PathBuf,
    version: String,
}

impl NativeEngine {
    /// Path of the artifact this handle drives.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Version reported by the artifact's probe.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn encode(source: &str, options: &CompileOptions) -> Result<Vec<u8>, EngineError> {
        options.check_supported()?;
        let request = NativeRequest {
            source: source.to_owned(),
            options: to_native_options(options),
        };
        serde_json::to_vec(&request)
            .map_err(|err| EngineError::new(format!("failed to encode native request: {}", err)))
    }

    fn spawn_error(&self, err: std::io::Error) -> EngineError {
        EngineError::new(format!(
            "failed to run native artifact {}: {}",
            self.artifact.display(),
            err
        ))
    }

    /// Interpret the finished artifact. A failed request write only matters
    /// when the artifact otherwise looks successful; a non-zero exit carries
    /// the more useful status and stderr.
    fn finish(
        &self,
        written: std::io::Result<()>,
        output: Output,
        start: Instant,
    ) -> Result<CompileResult, EngineError> {
        match (written, Self::decode(output, start)) {
            (Err(err), Ok(_)) => Err(self.spawn_error(err)),
            (_, decoded) => decoded,
        }
    }

    fn decode(output: Output, start: Instant) -> Result<CompileResult, EngineError> {
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::new(format!(
                "native engine exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let response: NativeResponse = serde_json::from_slice(&output.stdout).map_err(|err| {
            EngineError::new(format!("malformed native engine response: {}", err))
        })?;

        match response {
            NativeResponse::Ok(out) => Ok(CompileResult {
                code: out.code,
                map: out.map,
                timing: start.elapsed(),
                data: out.data,
            }),
            NativeResponse::Error(failure) => Err(failure.into()),
        }
    }
}

#[async_trait]
impl Engine for NativeEngine {
    fn name(&self) -> EngineId {
        EngineId::Native
    }

    fn compile_blocking(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError> {
        let start = Instant::now();
        let payload = Self::encode(source, options)?;

        let mut child = std::process::Command::new(&self.artifact)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        // The artifact reads all of stdin before writing; dropping the handle
        // closes it. The child is always reaped, even when the write fails.
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&payload),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(|err| self.spawn_error(err))?;
        self.finish(written, output, start)
    }

    async fn compile(
        &self,
        source: &str,
        options: &CompileOptions,
    ) -> Result<CompileResult, EngineError> {
        let start = Instant::now();
        let payload = Self::encode(source, options)?;

        let mut child = tokio::process::Command::new(&self.artifact)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| self.spawn_error(err))?;

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&payload).await,
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| self.spawn_error(err))?;
        self.finish(written, output, start)
    }
}

#[derive(Debug, Clone)]
enum Locator {
    Explicit(PathBuf),
    Search {
        dir: Option<PathBuf>,
        platform: Platform,
    },
}

/// Finds and verifies the native artifact.
#[derive(Debug, Clone)]
pub struct NativeLoader {
    locator: Locator,
}

impl NativeLoader {
    /// Loader honoring [`HybridConfig`]: an explicit artifact path wins,
    /// otherwise the current platform's artifact is searched for.
    pub fn from_config(config: &HybridConfig) -> Self {
        match &config.native_artifact {
            Some(path) => Self::with_artifact(path.clone()),
            None => Self {
                locator: Locator::Search {
                    dir: config.native_artifact_dir.clone().or_else(default_artifact_dir),
                    platform: Platform::current(),
                },
            },
        }
    }

    /// Loader for an explicit artifact path.
    pub fn with_artifact(path: impl Into<PathBuf>) -> Self {
        Self {
            locator: Locator::Explicit(path.into()),
        }
    }

    /// Loader searching `dir` for the artifact published for `platform`.
    pub fn for_platform(dir: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            locator: Locator::Search {
                dir: Some(dir.into()),
                platform,
            },
        }
    }

    /// Resolve the artifact path without starting it.
    pub fn locate(&self) -> Result<PathBuf, LoadFailure> {
        match &self.locator {
            Locator::Explicit(path) if path.is_file() => Ok(path.clone()),
            Locator::Explicit(path) => Err(LoadFailure::MissingArtifact(vec![path.clone()])),
            Locator::Search { dir, platform } => {
                let suffixes = platform.artifact_suffixes();
                if suffixes.is_empty() {
                    return Err(LoadFailure::UnsupportedPlatform(platform.to_string()));
                }
                let dir = dir.as_ref().ok_or(LoadFailure::NoArtifactDir)?;
                let candidates: Vec<PathBuf> = suffixes
                    .iter()
                    .map(|suffix| dir.join(artifact_file_name(suffix)))
                    .collect();
                match candidates.iter().find(|path| path.is_file()) {
                    Some(found) => Ok(found.clone()),
                    None => Err(LoadFailure::MissingArtifact(candidates)),
                }
            }
        }
    }
}

fn default_artifact_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

#[async_trait]
impl EngineLoader for NativeLoader {
    fn name(&self) -> EngineId {
        EngineId::Native
    }

    async fn load(&self) -> Result<Arc<dyn Engine>, LoadFailure> {
        let artifact = self.locate()?;

        let output = tokio::process::Command::new(&artifact)
            .arg(PROBE_FLAG)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| LoadFailure::Spawn {
                path: artifact.clone(),
                reason: err.to_string(),
            })?;

        if !output.status.success() {
            return Err(LoadFailure::Handshake(format!(
                "probe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let probe: ProbeResponse = serde_json::from_slice(&output.stdout)
            .map_err(|err| LoadFailure::Handshake(err.to_string()))?;
        if !probe.available {
            return Err(LoadFailure::Disabled);
        }

        log::debug!(
            "loaded native artifact {} ({} {})",
            artifact.display(),
            probe.name,
            probe.version
        );
        Ok(Arc::new(NativeEngine {
            artifact,
            version: probe.version,
        }))
    }
}
