// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Seams to the function execution platform and the HTTP front door.
//!
//! The pipelines only talk to these traits; `crate::aws` provides the
//! production implementations and `crate::fakes` the in-memory ones.

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::model::{
    ApiHandle, ApiResource, FunctionDescriptor, FunctionRequest, LayerReference, ObjectReference,
    PublishLayerRequest,
};
use crate::types::{FunctionName, LayerName};

/// Function and layer operations of the execution platform.
#[async_trait]
pub trait FunctionPlatform: Send + Sync {
    /// Register a new layer version. Never updates an existing version.
    async fn publish_layer_version(
        &self,
        request: &PublishLayerRequest,
    ) -> Result<LayerReference, PlatformError>;

    /// Most recent version of a layer, if any was ever published.
    async fn latest_layer_version(
        &self,
        name: &LayerName,
    ) -> Result<Option<LayerReference>, PlatformError>;

    /// `Ok(None)` when the function does not exist.
    async fn get_function(
        &self,
        name: &FunctionName,
    ) -> Result<Option<FunctionDescriptor>, PlatformError>;

    async fn create_function(
        &self,
        request: &FunctionRequest,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError>;

    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> Result<FunctionDescriptor, PlatformError>;

    /// Replace the code and publish a new version.
    async fn update_function_code(
        &self,
        name: &FunctionName,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError>;

    /// Allow the HTTP front door to invoke the function.
    async fn grant_gateway_invoke(&self, name: &FunctionName) -> Result<(), PlatformError>;

    async fn delete_function(&self, name: &FunctionName) -> Result<(), PlatformError>;
}

/// REST API operations of the HTTP front door.
#[async_trait]
pub trait FrontDoor: Send + Sync {
    async fn find_api(&self, name: &str) -> Result<Option<ApiHandle>, PlatformError>;

    async fn create_api(&self, name: &str, description: &str) -> Result<ApiHandle, PlatformError>;

    async fn resources(&self, api_id: &str) -> Result<Vec<ApiResource>, PlatformError>;

    /// Create a child resource and return its id.
    async fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<String, PlatformError>;

    /// `ANY` method without authorization.
    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> Result<(), PlatformError>;

    /// Proxy integration that forwards every request to the function.
    async fn put_function_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        function_arn: &str,
    ) -> Result<(), PlatformError>;

    /// Function ARN behind the resource's `ANY` integration, `Ok(None)` when
    /// no integration is defined.
    async fn integration_target(
        &self,
        api_id: &str,
        resource_id: &str,
    ) -> Result<Option<String>, PlatformError>;

    async fn create_deployment(&self, api_id: &str, stage: &str) -> Result<(), PlatformError>;

    /// Names of the deployed stages.
    async fn stages(&self, api_id: &str) -> Result<Vec<String>, PlatformError>;

    /// Host suffix appended to the API id, e.g. `execute-api.eu-west-1.amazonaws.com`.
    fn endpoint_domain(&self) -> String;

    /// Public URL of a deployed resource.
    fn invocation_url(&self, api_id: &str, stage: &str, path_part: &str) -> String {
        format!(
            "https://{}.{}/{}/{}/",
            api_id,
            self.endpoint_domain(),
            stage,
            path_part
        )
    }
}
