// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! In-memory fakes for the service traits (testing only).
//!
//! Provides `MemoryObjectStore`, `FakeContainerRunner`, `MemoryPlatform`, and
//! `MemoryFrontDoor` that honor the trait contracts without touching Docker
//! or AWS. Each fake exposes inspection helpers for assertions and a few
//! switches for injecting failures.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::builder::{ContainerOutput, ContainerRunner, ContainerSpec, OUTPUT_MOUNT};
use crate::error::{BuildFailure, PlatformError};
use crate::model::{
    ApiHandle, ApiResource, FunctionDescriptor, FunctionRequest, LayerReference, ObjectReference,
    PublishLayerRequest,
};
use crate::platform::{FrontDoor, FunctionPlatform};
use crate::store::{ObjectStore, PutOutcome, StoreError};
use crate::types::{BucketName, FunctionName, LayerName};

const FAKE_ARN_PREFIX: &str = "arn:aws:lambda:eu-west-1:123456789012";

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct StoreState {
    buckets: HashMap<String, HashMap<String, Vec<u8>>>,
    put_attempts: u32,
    failures_left: u32,
}

/// In-memory bucket store.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    state: Mutex<StoreState>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the given buckets already created.
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap();
            for bucket in buckets {
                state.buckets.insert(bucket.into(), HashMap::new());
            }
        }
        store
    }

    /// Make the next `count` puts fail with a transient error.
    pub fn fail_next_puts(&self, count: u32) {
        self.state.lock().unwrap().failures_left = count;
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        state.buckets.get(bucket)?.get(key).cloned()
    }

    /// Objects across all buckets.
    pub fn object_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.buckets.values().map(HashMap::len).sum()
    }

    pub fn put_attempts(&self) -> u32 {
        self.state.lock().unwrap().put_attempts
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &str,
        body: &[u8],
    ) -> Result<PutOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.put_attempts += 1;

        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(StoreError::Transient {
                message: "503 SlowDown".to_string(),
            });
        }

        let objects = state
            .buckets
            .get_mut(bucket.as_str())
            .ok_or_else(|| StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            })?;
        objects.insert(key.to_string(), body.to_vec());

        let digest = hex::encode(Sha256::digest(body));
        Ok(PutOutcome {
            etag: Some(format!("\"{}\"", &digest[..32])),
            version_id: None,
        })
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .buckets
            .entry(bucket.to_string())
            .or_insert_with(HashMap::new);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FakeContainerRunner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum RunnerMode {
    Succeed(Vec<String>),
    Fail { code: i32, stderr: String },
    Hang,
}

/// Container runner returning canned results.
///
/// On success it writes the configured files into the library root the
/// builder prepared inside the output mount.
#[derive(Debug)]
pub struct FakeContainerRunner {
    mode: RunnerMode,
    runs: Mutex<Vec<ContainerSpec>>,
}

impl FakeContainerRunner {
    pub fn succeeding(files: &[&str]) -> Self {
        Self {
            mode: RunnerMode::Succeed(files.iter().map(|f| f.to_string()).collect()),
            runs: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(code: i32, stderr: &str) -> Self {
        Self {
            mode: RunnerMode::Fail {
                code,
                stderr: stderr.to_string(),
            },
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Never finishes. Used to exercise timeouts.
    pub fn hanging() -> Self {
        Self {
            mode: RunnerMode::Hang,
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Every spec this runner was asked to run.
    pub fn runs(&self) -> Vec<ContainerSpec> {
        self.runs.lock().unwrap().clone()
    }

    fn install(spec: &ContainerSpec, files: &[String]) -> std::io::Result<()> {
        let Some(output) = spec.mounts.iter().find(|m| m.container == OUTPUT_MOUNT) else {
            return Ok(());
        };
        let Some(library_dir) = first_subdir(&output.host)? else {
            return Ok(());
        };

        for file in files {
            let path = library_dir.join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, format!("# {}\n", file))?;
        }
        Ok(())
    }
}

fn first_subdir(dir: &Path) -> std::io::Result<Option<std::path::PathBuf>> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

#[async_trait]
impl ContainerRunner for FakeContainerRunner {
    async fn run(&self, spec: &ContainerSpec) -> Result<ContainerOutput, BuildFailure> {
        self.runs.lock().unwrap().push(spec.clone());

        match &self.mode {
            RunnerMode::Succeed(files) => {
                Self::install(spec, files).map_err(|e| BuildFailure::Workspace {
                    reason: e.to_string(),
                })?;
                Ok(ContainerOutput {
                    exit_code: Some(0),
                    stdout: format!("Successfully installed {} files", files.len()),
                    stderr: String::new(),
                })
            }
            RunnerMode::Fail { code, stderr } => Ok(ContainerOutput {
                exit_code: Some(*code),
                stdout: String::new(),
                stderr: stderr.clone(),
            }),
            RunnerMode::Hang => std::future::pending().await,
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryPlatform
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct StoredFunction {
    descriptor: FunctionDescriptor,
    request: FunctionRequest,
    code: ObjectReference,
    code_updates: u32,
    gateway_invoke: bool,
}

#[derive(Debug, Default)]
struct PlatformState {
    layers: HashMap<String, Vec<LayerReference>>,
    published: Vec<PublishLayerRequest>,
    functions: BTreeMap<String, StoredFunction>,
    deny_publish: Option<String>,
}

/// In-memory function platform.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    state: Mutex<PlatformState>,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every publish-layer-version call with an access error.
    pub fn deny_publish(&self, message: &str) {
        self.state.lock().unwrap().deny_publish = Some(message.to_string());
    }

    /// Seed a previously published layer version.
    pub fn seed_layer(&self, name: &str) -> LayerReference {
        let mut state = self.state.lock().unwrap();
        Self::next_layer(&mut state, name)
    }

    pub fn published_layers(&self) -> Vec<PublishLayerRequest> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn function(&self, name: &str) -> Option<FunctionDescriptor> {
        let state = self.state.lock().unwrap();
        state.functions.get(name).map(|f| f.descriptor.clone())
    }

    /// Last create or update-configuration request applied to the function.
    pub fn function_request(&self, name: &str) -> Option<FunctionRequest> {
        let state = self.state.lock().unwrap();
        state.functions.get(name).map(|f| f.request.clone())
    }

    pub fn function_code(&self, name: &str) -> Option<ObjectReference> {
        let state = self.state.lock().unwrap();
        state.functions.get(name).map(|f| f.code.clone())
    }

    pub fn function_count(&self) -> usize {
        self.state.lock().unwrap().functions.len()
    }

    pub fn code_updates(&self, name: &str) -> u32 {
        let state = self.state.lock().unwrap();
        state.functions.get(name).map(|f| f.code_updates).unwrap_or(0)
    }

    pub fn gateway_invoke_granted(&self, name: &str) -> bool {
        let state = self.state.lock().unwrap();
        state
            .functions
            .get(name)
            .map(|f| f.gateway_invoke)
            .unwrap_or(false)
    }

    fn next_layer(state: &mut PlatformState, name: &str) -> LayerReference {
        let versions = state.layers.entry(name.to_string()).or_default();
        let version = versions.len() as i64 + 1;
        let layer = LayerReference {
            name: name.to_string(),
            version,
            arn: format!("{}:layer:{}:{}", FAKE_ARN_PREFIX, name, version),
        };
        versions.push(layer.clone());
        layer
    }

    fn not_found(name: &FunctionName) -> PlatformError {
        PlatformError::NotFound {
            kind: "function",
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl FunctionPlatform for MemoryPlatform {
    async fn publish_layer_version(
        &self,
        request: &PublishLayerRequest,
    ) -> Result<LayerReference, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(message) = &state.deny_publish {
            return Err(PlatformError::AccessDenied {
                message: message.clone(),
            });
        }
        state.published.push(request.clone());
        Ok(Self::next_layer(&mut state, request.name.as_str()))
    }

    async fn latest_layer_version(
        &self,
        name: &LayerName,
    ) -> Result<Option<LayerReference>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .layers
            .get(name.as_str())
            .and_then(|versions| versions.last().cloned()))
    }

    async fn get_function(
        &self,
        name: &FunctionName,
    ) -> Result<Option<FunctionDescriptor>, PlatformError> {
        Ok(self.function(name.as_str()))
    }

    async fn create_function(
        &self,
        request: &FunctionRequest,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if state.functions.contains_key(request.name.as_str()) {
            return Err(PlatformError::Conflict {
                kind: "function",
                name: request.name.to_string(),
            });
        }

        let descriptor = FunctionDescriptor {
            name: request.name.to_string(),
            arn: format!("{}:function:{}", FAKE_ARN_PREFIX, request.name),
            runtime: Some(request.runtime.to_string()),
            handler: Some(request.handler.clone()),
            layers: request.layers.clone(),
            version: Some("1".to_string()),
        };
        state.functions.insert(
            request.name.to_string(),
            StoredFunction {
                descriptor: descriptor.clone(),
                request: request.clone(),
                code: code.clone(),
                code_updates: 0,
                gateway_invoke: false,
            },
        );
        Ok(descriptor)
    }

    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> Result<FunctionDescriptor, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .functions
            .get_mut(request.name.as_str())
            .ok_or_else(|| Self::not_found(&request.name))?;

        stored.descriptor.runtime = Some(request.runtime.to_string());
        stored.descriptor.handler = Some(request.handler.clone());
        stored.descriptor.layers = request.layers.clone();
        stored.request = request.clone();
        Ok(stored.descriptor.clone())
    }

    async fn update_function_code(
        &self,
        name: &FunctionName,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .functions
            .get_mut(name.as_str())
            .ok_or_else(|| Self::not_found(name))?;

        stored.code = code.clone();
        stored.code_updates += 1;
        stored.descriptor.version = Some((stored.code_updates + 1).to_string());
        Ok(stored.descriptor.clone())
    }

    async fn grant_gateway_invoke(&self, name: &FunctionName) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .functions
            .get_mut(name.as_str())
            .ok_or_else(|| Self::not_found(name))?;
        stored.gateway_invoke = true;
        Ok(())
    }

    async fn delete_function(&self, name: &FunctionName) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        state
            .functions
            .remove(name.as_str())
            .map(|_| ())
            .ok_or_else(|| Self::not_found(name))
    }
}

// ---------------------------------------------------------------------------
// MemoryFrontDoor
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct FakeApi {
    handle: ApiHandle,
    resources: Vec<ApiResource>,
    integrations: HashMap<String, String>,
    stages: Vec<String>,
}

#[derive(Debug, Default)]
struct FrontDoorState {
    apis: Vec<FakeApi>,
    next_id: u32,
    deployments: u32,
    fail_deployments: Option<String>,
    fail_next_integration: Option<String>,
}

/// In-memory REST API front door.
#[derive(Debug)]
pub struct MemoryFrontDoor {
    domain: String,
    state: Mutex<FrontDoorState>,
}

impl MemoryFrontDoor {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            state: Mutex::new(FrontDoorState::default()),
        }
    }

    /// Make every create-deployment call fail until cleared.
    pub fn fail_deployments(&self, message: &str) {
        self.state.lock().unwrap().fail_deployments = Some(message.to_string());
    }

    /// Make the next put-integration call fail once.
    pub fn fail_next_integration(&self, message: &str) {
        self.state.lock().unwrap().fail_next_integration = Some(message.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_deployments = None;
        state.fail_next_integration = None;
    }

    pub fn api_count(&self) -> usize {
        self.state.lock().unwrap().apis.len()
    }

    /// Successful stage deployments across all APIs.
    pub fn deployments(&self) -> u32 {
        self.state.lock().unwrap().deployments
    }

    /// Function ARN the `path_part` resource of the named API forwards to.
    pub fn routed_function(&self, api_name: &str, path_part: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let api = state.apis.iter().find(|a| a.handle.name == api_name)?;
        let resource = api
            .resources
            .iter()
            .find(|r| r.path_part.as_deref() == Some(path_part))?;
        api.integrations.get(&resource.id).cloned()
    }

    fn with_api<T>(
        &self,
        api_id: &str,
        f: impl FnOnce(&mut FrontDoorState, usize) -> Result<T, PlatformError>,
    ) -> Result<T, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let index = state
            .apis
            .iter()
            .position(|a| a.handle.id == api_id)
            .ok_or_else(|| PlatformError::NotFound {
                kind: "rest api",
                name: api_id.to_string(),
            })?;
        f(&mut state, index)
    }
}

fn resource_not_found(id: &str) -> PlatformError {
    PlatformError::NotFound {
        kind: "resource",
        name: id.to_string(),
    }
}

#[async_trait]
impl FrontDoor for MemoryFrontDoor {
    async fn find_api(&self, name: &str) -> Result<Option<ApiHandle>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .apis
            .iter()
            .find(|a| a.handle.name == name)
            .map(|a| a.handle.clone()))
    }

    async fn create_api(&self, name: &str, _description: &str) -> Result<ApiHandle, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let next_id = state.next_id;
        let handle = ApiHandle {
            id: format!("fake{:06}", next_id),
            name: name.to_string(),
        };
        state.apis.push(FakeApi {
            handle: handle.clone(),
            resources: vec![ApiResource {
                id: format!("root{:06}", next_id),
                path: "/".to_string(),
                path_part: None,
                methods: Vec::new(),
            }],
            integrations: HashMap::new(),
            stages: Vec::new(),
        });
        Ok(handle)
    }

    async fn resources(&self, api_id: &str) -> Result<Vec<ApiResource>, PlatformError> {
        self.with_api(api_id, |state, i| Ok(state.apis[i].resources.clone()))
    }

    async fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<String, PlatformError> {
        self.with_api(api_id, |state, i| {
            let api = &mut state.apis[i];
            let parent = api
                .resources
                .iter()
                .find(|r| r.id == parent_id)
                .ok_or_else(|| resource_not_found(parent_id))?;
            let path = format!("{}{}", parent.path, path_part);
            if api.resources.iter().any(|r| r.path == path) {
                return Err(PlatformError::Conflict {
                    kind: "resource",
                    name: path,
                });
            }

            let id = format!("res{:03}", api.resources.len());
            api.resources.push(ApiResource {
                id: id.clone(),
                path,
                path_part: Some(path_part.to_string()),
                methods: Vec::new(),
            });
            Ok(id)
        })
    }

    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> Result<(), PlatformError> {
        self.with_api(api_id, |state, i| {
            let resource = state.apis[i]
                .resources
                .iter_mut()
                .find(|r| r.id == resource_id)
                .ok_or_else(|| resource_not_found(resource_id))?;
            if resource.methods.iter().any(|m| m == "ANY") {
                return Err(PlatformError::Conflict {
                    kind: "method",
                    name: format!("{} ANY", resource.path),
                });
            }
            resource.methods.push("ANY".to_string());
            Ok(())
        })
    }

    async fn put_function_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        function_arn: &str,
    ) -> Result<(), PlatformError> {
        self.with_api(api_id, |state, i| {
            if let Some(message) = state.fail_next_integration.take() {
                return Err(PlatformError::Service { message });
            }
            let api = &mut state.apis[i];
            if !api.resources.iter().any(|r| r.id == resource_id) {
                return Err(resource_not_found(resource_id));
            }
            api.integrations
                .insert(resource_id.to_string(), function_arn.to_string());
            Ok(())
        })
    }

    async fn integration_target(
        &self,
        api_id: &str,
        resource_id: &str,
    ) -> Result<Option<String>, PlatformError> {
        self.with_api(api_id, |state, i| {
            Ok(state.apis[i].integrations.get(resource_id).cloned())
        })
    }

    async fn create_deployment(&self, api_id: &str, stage: &str) -> Result<(), PlatformError> {
        self.with_api(api_id, |state, i| {
            if let Some(message) = &state.fail_deployments {
                return Err(PlatformError::Service {
                    message: message.clone(),
                });
            }
            let api = &state.apis[i];
            if let Some(bare) = api
                .resources
                .iter()
                .find(|r| !r.methods.is_empty() && !api.integrations.contains_key(&r.id))
            {
                return Err(PlatformError::Service {
                    message: format!("No integration defined for method on {}", bare.path),
                });
            }
            state.deployments += 1;
            let api = &mut state.apis[i];
            if !api.stages.iter().any(|s| s == stage) {
                api.stages.push(stage.to_string());
            }
            Ok(())
        })
    }

    async fn stages(&self, api_id: &str) -> Result<Vec<String>, PlatformError> {
        self.with_api(api_id, |state, i| Ok(state.apis[i].stages.clone()))
    }

    fn endpoint_domain(&self) -> String {
        self.domain.clone()
    }
}
