// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for Stratus.
//!
//! Every failure mode of the layer and function pipelines is an explicit
//! variant. No `Box<dyn Error>`, no `anyhow::Result` - callers can always
//! tell which pipeline stage failed and whether a retry makes sense.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the Stratus pipelines.
#[derive(Debug, Error)]
pub enum StratusError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("Build failure: {0}")]
    Build(#[from] BuildFailure),

    #[error("Packaging error: {0}")]
    Packaging(#[from] PackagingError),

    #[error("Upload failed after {attempts} attempts: {message}")]
    TransientUpload { attempts: u32, message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// A pipeline stage failed. Earlier stages are not rolled back.
    #[error("{stage} stage failed: {source}")]
    Deployment {
        stage: Stage,
        #[source]
        source: Box<StratusError>,
    },

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl StratusError {
    /// Wrap an error with the pipeline stage it came from.
    pub fn at(stage: Stage, source: impl Into<StratusError>) -> Self {
        StratusError::Deployment {
            stage,
            source: Box::new(source.into()),
        }
    }

    /// The failing pipeline stage, if this error came out of a pipeline.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            StratusError::Deployment { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Named stages of the publish and deploy pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Build,
    Package,
    Upload,
    Publish,
    Function,
    Gateway,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Build => "build",
            Stage::Package => "package",
            Stage::Upload => "upload",
            Stage::Publish => "publish",
            Stage::Function => "function",
            Stage::Gateway => "gateway",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Hard validation errors reject a configuration before any remote call.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported runtime: {runtime}")]
    UnsupportedRuntime { runtime: String },

    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown layer '{layer}' referenced by function '{function}'")]
    UnknownLayer { function: String, layer: String },

    #[error("Schema validation failed: {message}")]
    SchemaValidation { message: String },
}

/// Isolated build errors. Never retried automatically.
#[derive(Debug, Error)]
pub enum BuildFailure {
    #[error("Manifest not readable: {path} - {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("Runtime {runtime} does not support layer builds")]
    UnsupportedRuntime { runtime: String },

    #[error("Failed to pull image {image}: {output}")]
    ImagePull { image: String, output: String },

    #[error("Failed to start container runtime: {reason}")]
    Spawn { reason: String },

    #[error("Container exited with status {code:?}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}")]
    NonZeroExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("Build did not finish within {secs}s")]
    TimedOut { secs: u64 },

    #[error("Installer produced no files under {library_root}")]
    EmptyOutput { library_root: String },

    #[error("Failed to prepare build directory: {reason}")]
    Workspace { reason: String },
}

/// Local packaging errors. Bad input, never retried.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Source directory not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Source directory has no files to package: {path}")]
    EmptySource { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write archive: {reason}")]
    Archive { reason: String },
}

/// Permission and missing-resource errors. Fatal, surfaced verbatim.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Bucket does not exist: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Object store rejected request: {message}")]
    Rejected { message: String },
}

/// Errors returned by the function platform or the HTTP front door.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    Conflict { kind: &'static str, name: String },

    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    #[error("Service error: {message}")]
    Service { message: String },

    #[error("Response missing field '{field}' from {operation}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },

    #[error("Function {name} did not settle: {reason}")]
    NotReady { name: String, reason: String },
}

/// Result type alias using StratusError.
pub type StratusResult<T> = Result<T, StratusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_validation_error_display() {
        let err = HardValidationError::MissingRequiredField {
            field: "bucket",
            context: "function 'my-func'".to_string(),
        };
        assert!(err.to_string().contains("bucket"));
        assert!(err.to_string().contains("my-func"));
    }

    #[test]
    fn test_error_chain() {
        let validation_err = HardValidationError::UnsupportedRuntime {
            runtime: "cobol85".to_string(),
        };
        let err: StratusError = validation_err.into();
        assert!(matches!(err, StratusError::HardValidation(_)));
    }

    #[test]
    fn test_deployment_error_names_stage() {
        let err = StratusError::at(
            Stage::Upload,
            ConfigurationError::NoSuchBucket {
                bucket: "missing".to_string(),
            },
        );
        assert_eq!(err.stage(), Some(Stage::Upload));
        let text = err.to_string();
        assert!(text.starts_with("upload stage failed"));
        assert!(text.contains("missing"));
    }

    #[test]
    fn test_build_failure_carries_output() {
        let err = BuildFailure::NonZeroExit {
            code: Some(1),
            stdout: "Collecting numpy".to_string(),
            stderr: "ERROR: No matching distribution".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("Collecting numpy"));
        assert!(text.contains("No matching distribution"));
    }
}
