//! Stratus Core Library
//!
//! Layer build and function deploy pipelines for the Stratus serverless
//! toolkit. Provides isolated dependency builds, deterministic packaging,
//! object storage uploads, layer publishing, function deployment with an
//! HTTP front door, and YAML configuration parsing.

pub mod aws;
pub mod builder;
pub mod config;
pub mod deploy;
pub mod error;
pub mod fakes;
pub mod layer;
pub mod model;
pub mod packager;
pub mod platform;
pub mod retry;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use builder::{ContainerRunner, DockerRunner, IsolatedBuilder};
pub use config::{Config, ConfigLoader, FunctionConfig, LayerConfig, LayerRef};
pub use deploy::FunctionDeployer;
pub use error::{
    BuildFailure, ConfigurationError, HardValidationError, PackagingError, PlatformError, Stage,
    StratusError, StratusResult,
};
pub use layer::LayerPublisher;
pub use model::{BuildSpec, DeployResult, FunctionSpec, LayerReference};
pub use packager::ArtifactPackager;
pub use platform::{FrontDoor, FunctionPlatform};
pub use retry::RetryPolicy;
pub use store::{ObjectStore, ObjectStoreClient};
pub use types::{BucketName, FunctionName, LayerName, Runtime};
