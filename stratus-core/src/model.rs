// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Values that flow between pipeline stages.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{BucketName, FunctionName, LayerName, Runtime};

/// Default resource path of the HTTP front door.
pub const DEFAULT_PATH_PART: &str = "api";
/// Default deployment stage of the HTTP front door.
pub const DEFAULT_STAGE: &str = "test";

/// What to build into a layer.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    pub layer_name: LayerName,
    /// Dependency manifest (requirements.txt, package.json).
    pub manifest: PathBuf,
    pub runtime: Runtime,
    pub description: String,
    /// SPDX identifier, license URL, or full license text.
    pub license: Option<String>,
}

/// A packaged directory. Immutable once built.
#[derive(Debug, Clone)]
pub struct Artifact {
    source: PathBuf,
    bytes: Vec<u8>,
    sha256: String,
    entries: Vec<String>,
}

impl Artifact {
    pub(crate) fn new(source: PathBuf, bytes: Vec<u8>, sha256: String, entries: Vec<String>) -> Self {
        Self {
            source,
            bytes,
            sha256,
            entries,
        }
    }

    /// Directory the archive was built from.
    pub fn source(&self) -> &PathBuf {
        &self.source
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex-encoded SHA-256 of the archive bytes.
    pub fn sha256(&self) -> &str {
        &self.sha256
    }

    /// Archive entry paths, in archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Location of an uploaded object. Opaque to the pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    pub bucket: String,
    pub key: String,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// A published layer version. The platform never mutates a version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerReference {
    pub name: String,
    pub version: i64,
    pub arn: String,
}

/// HTTP front door settings for a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSpec {
    pub name: String,
    pub path_part: String,
    pub stage: String,
    pub description: String,
}

impl ApiSpec {
    /// Front door named after the function with the default path and stage.
    pub fn for_function(name: &FunctionName, description: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            path_part: DEFAULT_PATH_PART.to_string(),
            stage: DEFAULT_STAGE.to_string(),
            description: description.into(),
        }
    }
}

/// Everything needed to create or update one function.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: FunctionName,
    /// Directory holding the handler code.
    pub source: PathBuf,
    pub runtime: Runtime,
    /// Entry point, e.g. `lambda_function.lambda_handler`.
    pub handler: String,
    /// Layer version ARNs. Order is kept verbatim.
    pub layers: Vec<String>,
    pub bucket: BucketName,
    /// Credential profile the clients were built with.
    pub profile: Option<String>,
    pub description: String,
    /// Execution role ARN.
    pub role: String,
    pub environment: BTreeMap<String, String>,
    /// `None` deploys the function without a front door.
    pub api: Option<ApiSpec>,
}

/// Result of a deploy or update call. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployResult {
    pub function_arn: String,
    pub invocation_url: Option<String>,
}

/// Function state as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: String,
    pub arn: String,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub layers: Vec<String>,
    pub version: Option<String>,
}

/// Request body shared by create-function and update-function-configuration.
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    pub name: FunctionName,
    pub runtime: Runtime,
    pub handler: String,
    pub role: String,
    pub description: String,
    pub layers: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

impl FunctionRequest {
    pub fn from_spec(spec: &FunctionSpec) -> Self {
        Self {
            name: spec.name.clone(),
            runtime: spec.runtime,
            handler: spec.handler.clone(),
            role: spec.role.clone(),
            description: spec.description.clone(),
            layers: spec.layers.clone(),
            environment: spec.environment.clone(),
        }
    }
}

/// Request for publish-layer-version.
#[derive(Debug, Clone)]
pub struct PublishLayerRequest {
    pub name: LayerName,
    pub content: ObjectReference,
    pub compatible_runtimes: Vec<Runtime>,
    pub description: String,
    pub license: Option<String>,
}

/// A REST API known to the front door.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHandle {
    pub id: String,
    pub name: String,
}

/// A resource (path segment) of a REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResource {
    pub id: String,
    pub path: String,
    pub path_part: Option<String>,
    /// HTTP methods configured on the resource.
    pub methods: Vec<String>,
}
