// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Function deploy and update pipelines.
//!
//! Deploy: package -> upload -> create function -> front door.
//! Update: package -> upload -> update configuration and code.
//!
//! Nothing is rolled back on failure. Every step is create-or-reuse, so
//! re-running a failed deploy picks up where the previous run stopped.

use std::sync::Arc;

use crate::error::{PlatformError, Stage, StratusError, StratusResult};
use crate::model::{
    ApiSpec, Artifact, DeployResult, FunctionDescriptor, FunctionRequest, FunctionSpec,
    ObjectReference,
};
use crate::packager::ArtifactPackager;
use crate::platform::{FrontDoor, FunctionPlatform};
use crate::store::ObjectStoreClient;
use crate::types::FunctionName;

/// HTTP method wired on the front door resource.
const PROXY_METHOD: &str = "ANY";

/// Object key for packaged function code.
pub fn function_object_key(function_name: &str, sha256: &str) -> String {
    format!("functions/{}/{}.zip", function_name, sha256)
}

/// Creates, updates and deletes functions and their front doors.
pub struct FunctionDeployer {
    packager: ArtifactPackager,
    store: ObjectStoreClient,
    platform: Arc<dyn FunctionPlatform>,
    front_door: Arc<dyn FrontDoor>,
}

impl FunctionDeployer {
    pub fn new(
        store: ObjectStoreClient,
        platform: Arc<dyn FunctionPlatform>,
        front_door: Arc<dyn FrontDoor>,
    ) -> Self {
        Self {
            packager: ArtifactPackager::new(),
            store,
            platform,
            front_door,
        }
    }

    /// Create the function if absent, otherwise update it in place, then
    /// make sure the front door routes to it.
    pub async fn deploy(&self, spec: &FunctionSpec) -> StratusResult<DeployResult> {
        tracing::info!(function = %spec.name, source = %spec.source.display(), "Deploying function");

        let code = self.package_and_upload(spec).await?;

        let existing = self
            .platform
            .get_function(&spec.name)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))?;

        let function = match existing {
            Some(_) => {
                tracing::info!(function = %spec.name, "Function exists, updating in place");
                self.apply_update(spec, &code).await?
            }
            None => self.create(spec, &code).await?,
        };

        let invocation_url = match &spec.api {
            Some(api) => {
                // Idempotent: an existing grant is accepted as-is.
                self.platform
                    .grant_gateway_invoke(&spec.name)
                    .await
                    .map_err(|e| StratusError::at(Stage::Function, e))?;
                Some(
                    self.ensure_front_door(api, &function.arn)
                        .await
                        .map_err(|e| StratusError::at(Stage::Gateway, e))?,
                )
            }
            None => None,
        };

        let result = DeployResult {
            function_arn: function.arn,
            invocation_url,
        };
        tracing::info!(
            function = %spec.name,
            url = ?result.invocation_url,
            "Function deployed"
        );
        Ok(result)
    }

    /// Update an existing function's code and configuration. The front door
    /// is left untouched.
    pub async fn update(&self, spec: &FunctionSpec) -> StratusResult<DeployResult> {
        tracing::info!(function = %spec.name, "Updating function");

        let existing = self
            .platform
            .get_function(&spec.name)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))?;
        if existing.is_none() {
            return Err(StratusError::at(
                Stage::Function,
                PlatformError::NotFound {
                    kind: "function",
                    name: spec.name.to_string(),
                },
            ));
        }

        let code = self.package_and_upload(spec).await?;
        let function = self.apply_update(spec, &code).await?;

        let invocation_url = match &spec.api {
            Some(api) => self
                .existing_url(api)
                .await
                .map_err(|e| StratusError::at(Stage::Gateway, e))?,
            None => None,
        };

        Ok(DeployResult {
            function_arn: function.arn,
            invocation_url,
        })
    }

    /// Delete a function. Its front door and uploaded archives are kept.
    pub async fn delete(&self, name: &FunctionName) -> StratusResult<()> {
        tracing::info!(function = %name, "Deleting function");
        self.platform
            .delete_function(name)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))
    }

    async fn package_and_upload(&self, spec: &FunctionSpec) -> StratusResult<ObjectReference> {
        let artifact: Artifact = self
            .packager
            .package(&spec.source)
            .map_err(|e| StratusError::at(Stage::Package, e))?;

        let key = function_object_key(spec.name.as_str(), artifact.sha256());
        self.store
            .upload_creating_bucket(&spec.bucket, &key, &artifact)
            .await
            .map_err(|e| StratusError::at(Stage::Upload, e))
    }

    async fn create(
        &self,
        spec: &FunctionSpec,
        code: &ObjectReference,
    ) -> StratusResult<FunctionDescriptor> {
        let request = FunctionRequest::from_spec(spec);
        let function = self
            .platform
            .create_function(&request, code)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))?;

        tracing::info!(function = %spec.name, arn = %function.arn, "Function created");
        Ok(function)
    }

    async fn apply_update(
        &self,
        spec: &FunctionSpec,
        code: &ObjectReference,
    ) -> StratusResult<FunctionDescriptor> {
        let request = FunctionRequest::from_spec(spec);
        self.platform
            .update_function_configuration(&request)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))?;

        let function = self
            .platform
            .update_function_code(&spec.name, code)
            .await
            .map_err(|e| StratusError::at(Stage::Function, e))?;

        tracing::info!(
            function = %spec.name,
            version = ?function.version,
            "Function code updated"
        );
        Ok(function)
    }

    /// Find or create the REST API, route `path_part` to the function, and
    /// deploy the stage. The route counts as wired only when the `ANY` method
    /// exists and its integration targets `function_arn`; the stage is
    /// redeployed only when the route was (re)wired or is missing.
    async fn ensure_front_door(
        &self,
        api: &ApiSpec,
        function_arn: &str,
    ) -> Result<String, PlatformError> {
        let handle = match self.front_door.find_api(&api.name).await? {
            Some(handle) => handle,
            None => {
                tracing::info!(api = %api.name, "Creating REST API");
                self.front_door.create_api(&api.name, &api.description).await?
            }
        };

        let resources = self.front_door.resources(&handle.id).await?;
        let existing = resources
            .iter()
            .find(|r| r.path_part.as_deref() == Some(api.path_part.as_str()));

        let resource_id = match existing {
            Some(resource) => resource.id.clone(),
            None => {
                let root = resources.iter().find(|r| r.path == "/").ok_or_else(|| {
                    PlatformError::NotFound {
                        kind: "root resource",
                        name: handle.id.clone(),
                    }
                })?;
                self.front_door
                    .create_resource(&handle.id, &root.id, &api.path_part)
                    .await?
            }
        };

        let has_method = existing
            .map(|r| r.methods.iter().any(|m| m == PROXY_METHOD))
            .unwrap_or(false);
        let target = if has_method {
            self.front_door
                .integration_target(&handle.id, &resource_id)
                .await?
        } else {
            None
        };
        let wired = target.as_deref() == Some(function_arn);

        let stage_deployed = self
            .front_door
            .stages(&handle.id)
            .await?
            .iter()
            .any(|s| s == &api.stage);

        if !wired {
            if !has_method {
                match self.front_door.put_any_method(&handle.id, &resource_id).await {
                    Ok(()) | Err(PlatformError::Conflict { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            tracing::info!(
                api = %api.name,
                resource = %resource_id,
                previous = ?target,
                "Wiring proxy integration"
            );
            self.front_door
                .put_function_integration(&handle.id, &resource_id, function_arn)
                .await?;
        }

        if !wired || !stage_deployed {
            self.front_door.create_deployment(&handle.id, &api.stage).await?;
            tracing::info!(api = %api.name, api_id = %handle.id, stage = %api.stage, "Front door deployed");
        } else {
            tracing::info!(api = %api.name, api_id = %handle.id, "Front door already wired");
        }

        Ok(self
            .front_door
            .invocation_url(&handle.id, &api.stage, &api.path_part))
    }

    /// URL of an already wired front door, without modifying it.
    async fn existing_url(&self, api: &ApiSpec) -> Result<Option<String>, PlatformError> {
        let Some(handle) = self.front_door.find_api(&api.name).await? else {
            return Ok(None);
        };

        let resources = self.front_door.resources(&handle.id).await?;
        let routed = resources
            .iter()
            .any(|r| r.path_part.as_deref() == Some(api.path_part.as_str()));

        Ok(routed.then(|| {
            self.front_door
                .invocation_url(&handle.id, &api.stage, &api.path_part)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryFrontDoor, MemoryObjectStore, MemoryPlatform};
    use crate::retry::RetryPolicy;
    use crate::types::{BucketName, Runtime};
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<MemoryObjectStore>,
        platform: Arc<MemoryPlatform>,
        front_door: Arc<MemoryFrontDoor>,
        spec: FunctionSpec,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::write(
                dir.path().join("lambda_function.py"),
                "def lambda_handler(event, context):\n    return {}\n",
            )
            .unwrap();
            let name = FunctionName::new("predict").unwrap();
            let spec = FunctionSpec {
                api: Some(ApiSpec::for_function(&name, "prediction api")),
                name,
                source: dir.path().to_path_buf(),
                runtime: Runtime::Python312,
                handler: "lambda_function.lambda_handler".to_string(),
                layers: vec![
                    "arn:aws:lambda:eu-west-1:123456789012:layer:b:3".to_string(),
                    "arn:aws:lambda:eu-west-1:123456789012:layer:a:7".to_string(),
                ],
                bucket: BucketName::new("function-code").unwrap(),
                profile: None,
                description: "prediction".to_string(),
                role: "arn:aws:iam::123456789012:role/lambda-exec".to_string(),
                environment: BTreeMap::from([("MODE".to_string(), "prod".to_string())]),
            };
            Self {
                _dir: dir,
                store: Arc::new(MemoryObjectStore::with_buckets(["function-code"])),
                platform: Arc::new(MemoryPlatform::new()),
                front_door: Arc::new(MemoryFrontDoor::new("execute-api.eu-west-1.amazonaws.com")),
                spec,
            }
        }

        fn deployer(&self) -> FunctionDeployer {
            FunctionDeployer::new(
                ObjectStoreClient::new(self.store.clone()).with_retry(RetryPolicy::immediate(3)),
                self.platform.clone(),
                self.front_door.clone(),
            )
        }
    }

    #[tokio::test]
    async fn test_deploy_creates_function_and_front_door() {
        let fx = Fixture::new();

        let result = fx.deployer().deploy(&fx.spec).await.unwrap();

        let function = fx.platform.function("predict").unwrap();
        assert_eq!(result.function_arn, function.arn);
        assert_eq!(function.handler.as_deref(), Some("lambda_function.lambda_handler"));
        assert!(fx.platform.gateway_invoke_granted("predict"));

        let request = fx.platform.function_request("predict").unwrap();
        assert_eq!(request.role, "arn:aws:iam::123456789012:role/lambda-exec");
        assert_eq!(request.description, "prediction");
        assert_eq!(request.environment.get("MODE").map(String::as_str), Some("prod"));

        let url = result.invocation_url.unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.ends_with(".execute-api.eu-west-1.amazonaws.com/test/api/"));
        assert_eq!(fx.front_door.api_count(), 1);
        assert_eq!(fx.front_door.deployments(), 1);
        assert_eq!(
            fx.front_door.routed_function("predict", "api").as_deref(),
            Some(function.arn.as_str())
        );
    }

    #[tokio::test]
    async fn test_deploy_preserves_layer_order() {
        let fx = Fixture::new();
        fx.deployer().deploy(&fx.spec).await.unwrap();

        let function = fx.platform.function("predict").unwrap();
        assert_eq!(function.layers, fx.spec.layers);
    }

    #[tokio::test]
    async fn test_deploy_twice_is_idempotent() {
        let fx = Fixture::new();
        let deployer = fx.deployer();

        let first = deployer.deploy(&fx.spec).await.unwrap();
        let second = deployer.deploy(&fx.spec).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.platform.function_count(), 1);
        assert_eq!(fx.front_door.api_count(), 1);
        // Second run reuses the wired front door without redeploying it.
        assert_eq!(fx.front_door.deployments(), 1);
        assert_eq!(fx.platform.code_updates("predict"), 1);
    }

    #[tokio::test]
    async fn test_deploy_without_api() {
        let mut fx = Fixture::new();
        fx.spec.api = None;

        let result = fx.deployer().deploy(&fx.spec).await.unwrap();
        assert!(result.invocation_url.is_none());
        assert_eq!(fx.front_door.api_count(), 0);
        assert!(!fx.platform.gateway_invoke_granted("predict"));
    }

    #[tokio::test]
    async fn test_update_requires_existing_function() {
        let fx = Fixture::new();

        let err = fx.deployer().update(&fx.spec).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Function));
        assert_eq!(fx.store.object_count(), 0);
    }

    #[tokio::test]
    async fn test_update_keeps_front_door() {
        let fx = Fixture::new();
        let deployer = fx.deployer();
        let deployed = deployer.deploy(&fx.spec).await.unwrap();

        let mut spec = fx.spec.clone();
        spec.layers.reverse();
        let updated = deployer.update(&spec).await.unwrap();

        assert_eq!(updated.invocation_url, deployed.invocation_url);
        assert_eq!(fx.front_door.deployments(), 1);
        assert_eq!(fx.platform.function("predict").unwrap().layers, spec.layers);
    }

    #[tokio::test]
    async fn test_package_failure_names_stage() {
        let mut fx = Fixture::new();
        fx.spec.source = fx.spec.source.join("missing");

        let err = fx.deployer().deploy(&fx.spec).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Package));
    }

    #[tokio::test]
    async fn test_missing_bucket_is_created() {
        let fx = Fixture::new();
        let deployer = FunctionDeployer::new(
            ObjectStoreClient::new(Arc::new(MemoryObjectStore::new())),
            fx.platform.clone(),
            fx.front_door.clone(),
        );

        deployer.deploy(&fx.spec).await.unwrap();
        assert_eq!(fx.platform.function_count(), 1);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_function() {
        let fx = Fixture::new();
        fx.front_door.fail_deployments("TooManyRequestsException");

        let err = fx.deployer().deploy(&fx.spec).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Gateway));
        // No rollback: the function and the uploaded code stay.
        assert_eq!(fx.platform.function_count(), 1);
        assert_eq!(fx.store.object_count(), 1);
    }

    #[tokio::test]
    async fn test_redeploy_after_gateway_failure_completes_wiring() {
        let fx = Fixture::new();
        fx.front_door.fail_deployments("TooManyRequestsException");
        fx.deployer().deploy(&fx.spec).await.unwrap_err();

        fx.front_door.clear_failures();
        let result = fx.deployer().deploy(&fx.spec).await.unwrap();
        assert!(result.invocation_url.is_some());
        assert_eq!(fx.front_door.api_count(), 1);
        assert_eq!(fx.platform.function_count(), 1);
    }

    #[tokio::test]
    async fn test_redeploy_after_integration_failure_restores_route() {
        let fx = Fixture::new();
        fx.front_door.fail_next_integration("TooManyRequestsException");

        let err = fx.deployer().deploy(&fx.spec).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Gateway));
        assert!(fx.front_door.routed_function("predict", "api").is_none());

        let result = fx.deployer().deploy(&fx.spec).await.unwrap();
        assert!(result.invocation_url.is_some());
        assert_eq!(
            fx.front_door.routed_function("predict", "api").as_deref(),
            Some(result.function_arn.as_str())
        );
        assert_eq!(fx.front_door.deployments(), 1);
    }

    #[tokio::test]
    async fn test_update_configuration_reaches_platform() {
        let fx = Fixture::new();
        let deployer = fx.deployer();
        deployer.deploy(&fx.spec).await.unwrap();

        let mut spec = fx.spec.clone();
        spec.role = "arn:aws:iam::123456789012:role/other".to_string();
        spec.environment.insert("LEVEL".to_string(), "debug".to_string());
        deployer.update(&spec).await.unwrap();

        let request = fx.platform.function_request("predict").unwrap();
        assert_eq!(request.role, spec.role);
        assert_eq!(request.environment.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_function() {
        let fx = Fixture::new();
        let deployer = fx.deployer();
        deployer.deploy(&fx.spec).await.unwrap();

        deployer.delete(&fx.spec.name).await.unwrap();
        assert_eq!(fx.platform.function_count(), 0);

        let err = deployer.delete(&fx.spec.name).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Function));
    }
}
