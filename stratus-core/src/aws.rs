// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! AWS implementations of the service traits.
//!
//! S3 backs [`ObjectStore`], Lambda backs [`FunctionPlatform`] and the REST
//! flavour of API Gateway backs [`FrontDoor`]. Errors are classified by their
//! service error code and HTTP status; messages are kept verbatim.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_apigateway::types::IntegrationType;
use aws_sdk_lambda::types::{
    Environment, FunctionCode, FunctionConfiguration, LastUpdateStatus, LayerVersionContentInput,
    Runtime as LambdaRuntime, State,
};
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};

use crate::error::{HardValidationError, PlatformError, StratusResult};
use crate::model::{
    ApiHandle, ApiResource, FunctionDescriptor, FunctionRequest, LayerReference, ObjectReference,
    PublishLayerRequest,
};
use crate::platform::{FrontDoor, FunctionPlatform};
use crate::store::{ObjectStore, PutOutcome, StoreError};
use crate::types::{BucketName, FunctionName, LayerName};

/// Statement id of the permission that lets API Gateway invoke a function.
const GATEWAY_STATEMENT_ID: &str = "apigateway";
const GATEWAY_PRINCIPAL: &str = "apigateway.amazonaws.com";

/// Poll interval and limit while waiting for a function to leave `Pending`
/// or `InProgress`.
const SETTLE_INTERVAL: Duration = Duration::from_secs(1);
const SETTLE_MAX_POLLS: u32 = 120;

/// Page size for API Gateway listings (the service maximum).
const PAGE_LIMIT: i32 = 500;

/// Shared SDK clients for one profile and region.
#[derive(Clone)]
pub struct AwsClients {
    s3: aws_sdk_s3::Client,
    lambda: aws_sdk_lambda::Client,
    apigateway: aws_sdk_apigateway::Client,
    region: String,
}

impl AwsClients {
    /// Resolve credentials and region through the standard provider chain.
    /// An explicit `profile` or `region` overrides the environment.
    pub async fn load(profile: Option<&str>, region: Option<&str>) -> StratusResult<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let region = config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| HardValidationError::MissingRequiredField {
                field: "region",
                context: "AWS configuration (set defaults.region or AWS_REGION)".to_string(),
            })?;

        tracing::debug!(profile = ?profile, region = %region, "Loaded AWS configuration");

        Ok(Self {
            s3: aws_sdk_s3::Client::new(&config),
            lambda: aws_sdk_lambda::Client::new(&config),
            apigateway: aws_sdk_apigateway::Client::new(&config),
            region,
        })
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn object_store(&self) -> S3ObjectStore {
        S3ObjectStore {
            client: self.s3.clone(),
            region: self.region.clone(),
        }
    }

    pub fn platform(&self) -> LambdaPlatform {
        LambdaPlatform {
            client: self.lambda.clone(),
        }
    }

    pub fn front_door(&self) -> RestApiFrontDoor {
        RestApiFrontDoor {
            client: self.apigateway.clone(),
            region: self.region.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// The parts of an SDK error the pipelines care about.
struct Failure {
    code: Option<String>,
    status: Option<u16>,
    transient: bool,
    message: String,
}

impl Failure {
    fn from_sdk<E>(err: &SdkError<E, HttpResponse>) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let status = err.raw_response().map(|r| r.status().as_u16());
        let code = err.code().map(str::to_string);
        let transient = match err {
            SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
                true
            }
            _ => {
                status.map(|s| s >= 500).unwrap_or(false)
                    || matches!(
                        code.as_deref(),
                        Some(
                            "SlowDown"
                                | "RequestTimeout"
                                | "InternalError"
                                | "ServiceUnavailable"
                                | "Throttling"
                                | "ThrottlingException"
                                | "TooManyRequestsException"
                        )
                    )
            }
        };

        Self {
            code,
            status,
            transient,
            message: DisplayErrorContext(err).to_string(),
        }
    }

    fn is(&self, codes: &[&str]) -> bool {
        self.code.as_deref().map(|c| codes.contains(&c)).unwrap_or(false)
    }

    fn is_denied(&self) -> bool {
        self.status == Some(403)
            || self.is(&["AccessDenied", "AccessDeniedException", "UnauthorizedException"])
    }

    fn into_store_error(self, bucket: &BucketName) -> StoreError {
        if self.is(&["NoSuchBucket"]) {
            StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            }
        } else if self.is_denied() {
            StoreError::AccessDenied {
                message: self.message,
            }
        } else if self.transient {
            StoreError::Transient {
                message: self.message,
            }
        } else {
            StoreError::Rejected {
                message: self.message,
            }
        }
    }

    fn into_platform_error(self, kind: &'static str, name: &str) -> PlatformError {
        if self.is(&["ResourceNotFoundException", "NotFoundException"]) {
            PlatformError::NotFound {
                kind,
                name: name.to_string(),
            }
        } else if self.is(&["ResourceConflictException", "ConflictException"]) {
            PlatformError::Conflict {
                kind,
                name: name.to_string(),
            }
        } else if self.is_denied() {
            PlatformError::AccessDenied {
                message: self.message,
            }
        } else {
            PlatformError::Service {
                message: self.message,
            }
        }
    }
}

fn platform_error<E>(err: SdkError<E, HttpResponse>, kind: &'static str, name: &str) -> PlatformError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    Failure::from_sdk(&err).into_platform_error(kind, name)
}

fn missing(operation: &'static str, field: &'static str) -> PlatformError {
    PlatformError::MissingField { operation, field }
}

// ---------------------------------------------------------------------------
// S3
// ---------------------------------------------------------------------------

/// S3 backed object store.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    region: String,
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &str,
        body: &[u8],
    ) -> Result<PutOutcome, StoreError> {
        let output = self
            .client
            .put_object()
            .bucket(bucket.as_str())
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| Failure::from_sdk(&e).into_store_error(bucket))?;

        Ok(PutOutcome {
            etag: output.e_tag().map(str::to_string),
            version_id: output.version_id().map(str::to_string),
        })
    }

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(bucket.as_str());
        // us-east-1 rejects an explicit location constraint.
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => {
                tracing::info!(bucket = %bucket, region = %self.region, "Bucket created");
                Ok(())
            }
            Err(err) => {
                let failure = Failure::from_sdk(&err);
                if failure.is(&["BucketAlreadyOwnedByYou"]) {
                    Ok(())
                } else {
                    Err(failure.into_store_error(bucket))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lambda
// ---------------------------------------------------------------------------

/// Lambda backed function platform.
#[derive(Clone)]
pub struct LambdaPlatform {
    client: aws_sdk_lambda::Client,
}

/// Strip a version or alias qualifier: `...:function:name:7` -> `...:function:name`.
fn unqualified_arn(arn: &str) -> String {
    arn.split(':').take(7).collect::<Vec<_>>().join(":")
}

fn descriptor(config: &FunctionConfiguration) -> Result<FunctionDescriptor, PlatformError> {
    let name = config
        .function_name()
        .ok_or_else(|| missing("GetFunction", "FunctionName"))?;
    let arn = config
        .function_arn()
        .ok_or_else(|| missing("GetFunction", "FunctionArn"))?;

    Ok(FunctionDescriptor {
        name: name.to_string(),
        arn: unqualified_arn(arn),
        runtime: config.runtime().map(|r| r.as_str().to_string()),
        handler: config.handler().map(str::to_string),
        layers: config
            .layers()
            .iter()
            .filter_map(|l| l.arn().map(str::to_string))
            .collect(),
        version: config.version().map(str::to_string),
    })
}

fn environment(request: &FunctionRequest) -> Environment {
    let variables: HashMap<String, String> = request
        .environment
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Environment::builder().set_variables(Some(variables)).build()
}

impl LambdaPlatform {
    async fn fetch(&self, name: &FunctionName) -> Result<Option<FunctionConfiguration>, PlatformError> {
        match self.client.get_function().function_name(name.as_str()).send().await {
            Ok(output) => Ok(output.configuration().cloned()),
            Err(err) => match platform_error(err, "function", name.as_str()) {
                PlatformError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    /// Wait until the function accepts further changes.
    async fn settle(&self, name: &FunctionName) -> Result<FunctionDescriptor, PlatformError> {
        for poll in 0..SETTLE_MAX_POLLS {
            let config = self.fetch(name).await?.ok_or_else(|| PlatformError::NotFound {
                kind: "function",
                name: name.to_string(),
            })?;

            match (config.state(), config.last_update_status()) {
                (Some(State::Failed), _) | (_, Some(LastUpdateStatus::Failed)) => {
                    let reason = config
                        .last_update_status_reason()
                        .or(config.state_reason())
                        .unwrap_or("no reason reported");
                    return Err(PlatformError::NotReady {
                        name: name.to_string(),
                        reason: reason.to_string(),
                    });
                }
                (Some(State::Pending), _) | (_, Some(LastUpdateStatus::InProgress)) => {
                    tracing::debug!(function = %name, poll, "Waiting for function to settle");
                    tokio::time::sleep(SETTLE_INTERVAL).await;
                }
                _ => return descriptor(&config),
            }
        }

        Err(PlatformError::NotReady {
            name: name.to_string(),
            reason: format!("still updating after {} polls", SETTLE_MAX_POLLS),
        })
    }
}

#[async_trait]
impl FunctionPlatform for LambdaPlatform {
    async fn publish_layer_version(
        &self,
        request: &PublishLayerRequest,
    ) -> Result<LayerReference, PlatformError> {
        let content = LayerVersionContentInput::builder()
            .s3_bucket(&request.content.bucket)
            .s3_key(&request.content.key)
            .set_s3_object_version(request.content.version_id.clone())
            .build();

        let mut call = self
            .client
            .publish_layer_version()
            .layer_name(request.name.as_str())
            .description(&request.description)
            .content(content);
        for runtime in &request.compatible_runtimes {
            call = call.compatible_runtimes(LambdaRuntime::from(runtime.identifier()));
        }
        if let Some(license) = &request.license {
            call = call.license_info(license);
        }

        let output = call
            .send()
            .await
            .map_err(|e| platform_error(e, "layer", request.name.as_str()))?;

        let arn = output
            .layer_version_arn()
            .ok_or_else(|| missing("PublishLayerVersion", "LayerVersionArn"))?;

        Ok(LayerReference {
            name: request.name.to_string(),
            version: output.version(),
            arn: arn.to_string(),
        })
    }

    async fn latest_layer_version(
        &self,
        name: &LayerName,
    ) -> Result<Option<LayerReference>, PlatformError> {
        let output = match self
            .client
            .list_layer_versions()
            .layer_name(name.as_str())
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                return match platform_error(err, "layer", name.as_str()) {
                    PlatformError::NotFound { .. } => Ok(None),
                    other => Err(other),
                }
            }
        };

        Ok(output
            .layer_versions()
            .iter()
            .filter_map(|item| {
                item.layer_version_arn().map(|arn| LayerReference {
                    name: name.to_string(),
                    version: item.version(),
                    arn: arn.to_string(),
                })
            })
            .max_by_key(|layer| layer.version))
    }

    async fn get_function(
        &self,
        name: &FunctionName,
    ) -> Result<Option<FunctionDescriptor>, PlatformError> {
        self.fetch(name)
            .await?
            .map(|config| descriptor(&config))
            .transpose()
    }

    async fn create_function(
        &self,
        request: &FunctionRequest,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError> {
        let function_code = FunctionCode::builder()
            .s3_bucket(&code.bucket)
            .s3_key(&code.key)
            .set_s3_object_version(code.version_id.clone())
            .build();

        self.client
            .create_function()
            .function_name(request.name.as_str())
            .runtime(LambdaRuntime::from(request.runtime.identifier()))
            .role(&request.role)
            .handler(&request.handler)
            .description(&request.description)
            .code(function_code)
            .set_layers(Some(request.layers.clone()))
            .environment(environment(request))
            .publish(true)
            .send()
            .await
            .map_err(|e| platform_error(e, "function", request.name.as_str()))?;

        self.settle(&request.name).await
    }

    async fn update_function_configuration(
        &self,
        request: &FunctionRequest,
    ) -> Result<FunctionDescriptor, PlatformError> {
        // A previous update may still be in flight.
        self.settle(&request.name).await?;

        self.client
            .update_function_configuration()
            .function_name(request.name.as_str())
            .runtime(LambdaRuntime::from(request.runtime.identifier()))
            .role(&request.role)
            .handler(&request.handler)
            .description(&request.description)
            .set_layers(Some(request.layers.clone()))
            .environment(environment(request))
            .send()
            .await
            .map_err(|e| platform_error(e, "function", request.name.as_str()))?;

        self.settle(&request.name).await
    }

    async fn update_function_code(
        &self,
        name: &FunctionName,
        code: &ObjectReference,
    ) -> Result<FunctionDescriptor, PlatformError> {
        let output = self
            .client
            .update_function_code()
            .function_name(name.as_str())
            .s3_bucket(&code.bucket)
            .s3_key(&code.key)
            .set_s3_object_version(code.version_id.clone())
            .publish(true)
            .send()
            .await
            .map_err(|e| platform_error(e, "function", name.as_str()))?;

        let published = output.version().map(str::to_string);
        let mut function = self.settle(name).await?;
        if published.is_some() {
            function.version = published;
        }
        Ok(function)
    }

    async fn grant_gateway_invoke(&self, name: &FunctionName) -> Result<(), PlatformError> {
        let result = self
            .client
            .add_permission()
            .function_name(name.as_str())
            .statement_id(GATEWAY_STATEMENT_ID)
            .action("lambda:InvokeFunction")
            .principal(GATEWAY_PRINCIPAL)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) => match platform_error(err, "permission", GATEWAY_STATEMENT_ID) {
                PlatformError::Conflict { .. } => {
                    tracing::debug!(function = %name, "Gateway invoke permission already present");
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn delete_function(&self, name: &FunctionName) -> Result<(), PlatformError> {
        self.client
            .delete_function()
            .function_name(name.as_str())
            .send()
            .await
            .map_err(|e| platform_error(e, "function", name.as_str()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// API Gateway
// ---------------------------------------------------------------------------

/// REST API front door.
#[derive(Clone)]
pub struct RestApiFrontDoor {
    client: aws_sdk_apigateway::Client,
    region: String,
}

impl RestApiFrontDoor {
    fn integration_uri(&self, function_arn: &str) -> String {
        format!(
            "arn:aws:apigateway:{}:lambda:path/2015-03-31/functions/{}/invocations",
            self.region, function_arn
        )
    }
}

/// Function ARN embedded in a Lambda proxy integration URI.
fn integration_function_arn(uri: &str) -> Option<&str> {
    let (_, rest) = uri.split_once("/functions/")?;
    rest.strip_suffix("/invocations")
}

#[async_trait]
impl FrontDoor for RestApiFrontDoor {
    async fn find_api(&self, name: &str) -> Result<Option<ApiHandle>, PlatformError> {
        let output = self
            .client
            .get_rest_apis()
            .limit(PAGE_LIMIT)
            .send()
            .await
            .map_err(|e| platform_error(e, "rest api", name))?;

        Ok(output
            .items()
            .iter()
            .filter(|api| api.name() == Some(name))
            .find_map(|api| {
                api.id().map(|id| ApiHandle {
                    id: id.to_string(),
                    name: name.to_string(),
                })
            }))
    }

    async fn create_api(&self, name: &str, description: &str) -> Result<ApiHandle, PlatformError> {
        let output = self
            .client
            .create_rest_api()
            .name(name)
            .description(description)
            .send()
            .await
            .map_err(|e| platform_error(e, "rest api", name))?;

        let id = output.id().ok_or_else(|| missing("CreateRestApi", "id"))?;
        Ok(ApiHandle {
            id: id.to_string(),
            name: name.to_string(),
        })
    }

    async fn resources(&self, api_id: &str) -> Result<Vec<ApiResource>, PlatformError> {
        let output = self
            .client
            .get_resources()
            .rest_api_id(api_id)
            .limit(PAGE_LIMIT)
            .send()
            .await
            .map_err(|e| platform_error(e, "rest api", api_id))?;

        output
            .items()
            .iter()
            .map(|resource| {
                Ok(ApiResource {
                    id: resource
                        .id()
                        .ok_or_else(|| missing("GetResources", "id"))?
                        .to_string(),
                    path: resource
                        .path()
                        .ok_or_else(|| missing("GetResources", "path"))?
                        .to_string(),
                    path_part: resource.path_part().map(str::to_string),
                    methods: resource
                        .resource_methods()
                        .map(|methods| methods.keys().cloned().collect())
                        .unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn create_resource(
        &self,
        api_id: &str,
        parent_id: &str,
        path_part: &str,
    ) -> Result<String, PlatformError> {
        let output = self
            .client
            .create_resource()
            .rest_api_id(api_id)
            .parent_id(parent_id)
            .path_part(path_part)
            .send()
            .await
            .map_err(|e| platform_error(e, "resource", path_part))?;

        output
            .id()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateResource", "id"))
    }

    async fn put_any_method(&self, api_id: &str, resource_id: &str) -> Result<(), PlatformError> {
        self.client
            .put_method()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method("ANY")
            .authorization_type("NONE")
            .send()
            .await
            .map_err(|e| platform_error(e, "method", resource_id))?;
        Ok(())
    }

    async fn put_function_integration(
        &self,
        api_id: &str,
        resource_id: &str,
        function_arn: &str,
    ) -> Result<(), PlatformError> {
        self.client
            .put_integration()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method("ANY")
            .r#type(IntegrationType::AwsProxy)
            .integration_http_method("POST")
            .uri(self.integration_uri(function_arn))
            .send()
            .await
            .map_err(|e| platform_error(e, "integration", resource_id))?;
        Ok(())
    }

    async fn integration_target(
        &self,
        api_id: &str,
        resource_id: &str,
    ) -> Result<Option<String>, PlatformError> {
        let result = self
            .client
            .get_integration()
            .rest_api_id(api_id)
            .resource_id(resource_id)
            .http_method("ANY")
            .send()
            .await;

        match result {
            Ok(output) => Ok(output
                .uri()
                .and_then(integration_function_arn)
                .map(str::to_string)),
            Err(err) => match platform_error(err, "integration", resource_id) {
                PlatformError::NotFound { .. } => Ok(None),
                other => Err(other),
            },
        }
    }

    async fn create_deployment(&self, api_id: &str, stage: &str) -> Result<(), PlatformError> {
        self.client
            .create_deployment()
            .rest_api_id(api_id)
            .stage_name(stage)
            .send()
            .await
            .map_err(|e| platform_error(e, "stage", stage))?;
        Ok(())
    }

    async fn stages(&self, api_id: &str) -> Result<Vec<String>, PlatformError> {
        let output = self
            .client
            .get_stages()
            .rest_api_id(api_id)
            .send()
            .await
            .map_err(|e| platform_error(e, "rest api", api_id))?;

        Ok(output
            .item()
            .iter()
            .filter_map(|stage| stage.stage_name().map(str::to_string))
            .collect())
    }

    fn endpoint_domain(&self) -> String {
        format!("execute-api.{}.amazonaws.com", self.region)
    }
}
