// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Layer publishing pipeline.
//!
//! build -> package -> upload -> publish-layer-version, strictly in order.
//! A failed stage stops the pipeline before anything is registered.

use std::sync::Arc;

use crate::builder::IsolatedBuilder;
use crate::error::{Stage, StratusError, StratusResult};
use crate::model::{BuildSpec, LayerReference, PublishLayerRequest};
use crate::packager::ArtifactPackager;
use crate::platform::FunctionPlatform;
use crate::store::ObjectStoreClient;
use crate::types::BucketName;

/// Object key for a packaged layer. Content-addressed, so a re-upload of the
/// same archive lands on the same key.
pub fn layer_object_key(layer_name: &str, sha256: &str) -> String {
    format!("layers/{}/{}.zip", layer_name, sha256)
}

/// Builds and publishes layer versions.
pub struct LayerPublisher {
    builder: IsolatedBuilder,
    packager: ArtifactPackager,
    store: ObjectStoreClient,
    platform: Arc<dyn FunctionPlatform>,
}

impl LayerPublisher {
    pub fn new(
        builder: IsolatedBuilder,
        store: ObjectStoreClient,
        platform: Arc<dyn FunctionPlatform>,
    ) -> Self {
        Self {
            builder,
            packager: ArtifactPackager::new(),
            store,
            platform,
        }
    }

    /// Publish a new layer version. Every call yields a new version, even
    /// for an unchanged manifest.
    pub async fn publish(&self, spec: &BuildSpec, bucket: &BucketName) -> StratusResult<LayerReference> {
        tracing::info!(
            layer = %spec.layer_name,
            manifest = %spec.manifest.display(),
            runtime = %spec.runtime,
            "Publishing layer"
        );

        let built = self
            .builder
            .build(spec)
            .await
            .map_err(|e| StratusError::at(Stage::Build, e))?;

        let artifact = self
            .packager
            .package(built.root())
            .map_err(|e| StratusError::at(Stage::Package, e))?;
        // The build directory is no longer needed once the archive is in memory.
        drop(built);

        let key = layer_object_key(spec.layer_name.as_str(), artifact.sha256());
        let object = self
            .store
            .upload(bucket, &key, &artifact)
            .await
            .map_err(|e| StratusError::at(Stage::Upload, e))?;

        let request = PublishLayerRequest {
            name: spec.layer_name.clone(),
            content: object,
            compatible_runtimes: vec![spec.runtime],
            description: spec.description.clone(),
            license: spec.license.clone(),
        };
        let layer = self
            .platform
            .publish_layer_version(&request)
            .await
            .map_err(|e| StratusError::at(Stage::Publish, e))?;

        tracing::info!(
            layer = %layer.name,
            version = layer.version,
            arn = %layer.arn,
            "Layer successfully deployed"
        );

        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeContainerRunner, MemoryObjectStore, MemoryPlatform};
    use crate::retry::RetryPolicy;
    use crate::types::{LayerName, Runtime};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        spec: BuildSpec,
        runner: Arc<FakeContainerRunner>,
        store: Arc<MemoryObjectStore>,
        platform: Arc<MemoryPlatform>,
    }

    impl Fixture {
        fn new(runner: FakeContainerRunner) -> Self {
            let dir = TempDir::new().unwrap();
            let manifest = dir.path().join("requirements.txt");
            std::fs::write(&manifest, "numpy==2.1.0\n").unwrap();
            Self {
                spec: BuildSpec {
                    layer_name: LayerName::new("modelling").unwrap(),
                    manifest,
                    runtime: Runtime::Python312,
                    description: "Data science modelling layer".to_string(),
                    license: Some("MIT".to_string()),
                },
                _dir: dir,
                runner: Arc::new(runner),
                store: Arc::new(MemoryObjectStore::with_buckets(["layer-bucket"])),
                platform: Arc::new(MemoryPlatform::new()),
            }
        }

        fn publisher(&self) -> LayerPublisher {
            LayerPublisher::new(
                IsolatedBuilder::new(self.runner.clone()),
                ObjectStoreClient::new(self.store.clone()).with_retry(RetryPolicy::immediate(3)),
                self.platform.clone(),
            )
        }
    }

    fn bucket() -> BucketName {
        BucketName::new("layer-bucket").unwrap()
    }

    #[tokio::test]
    async fn test_publish_runs_all_stages() {
        let fx = Fixture::new(FakeContainerRunner::succeeding(&["numpy/__init__.py"]));

        let layer = fx.publisher().publish(&fx.spec, &bucket()).await.unwrap();
        assert_eq!(layer.name, "modelling");
        assert_eq!(layer.version, 1);

        let published = fx.platform.published_layers();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].content.bucket, "layer-bucket");
        assert!(published[0].content.key.starts_with("layers/modelling/"));
        assert_eq!(published[0].compatible_runtimes, vec![Runtime::Python312]);
        assert_eq!(published[0].license.as_deref(), Some("MIT"));

        let bytes = fx
            .store
            .object("layer-bucket", &published[0].content.key)
            .unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<_> = archive.file_names().collect();
        assert!(!names.is_empty());
        assert!(names.iter().all(|n| n.starts_with("python/")));
    }

    #[tokio::test]
    async fn test_publish_twice_yields_new_versions() {
        let fx = Fixture::new(FakeContainerRunner::succeeding(&["numpy/__init__.py"]));
        let publisher = fx.publisher();

        let first = publisher.publish(&fx.spec, &bucket()).await.unwrap();
        let second = publisher.publish(&fx.spec, &bucket()).await.unwrap();

        assert!(second.version > first.version);
        assert_ne!(first.arn, second.arn);
    }

    #[tokio::test]
    async fn test_build_failure_registers_nothing() {
        let fx = Fixture::new(FakeContainerRunner::failing(1, "pip exploded"));

        let err = fx.publisher().publish(&fx.spec, &bucket()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Build));
        assert!(err.to_string().contains("pip exploded"));
        assert_eq!(fx.store.object_count(), 0);
        assert!(fx.platform.published_layers().is_empty());
        assert_eq!(fx.runner.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_failure_registers_nothing() {
        let fx = Fixture::new(FakeContainerRunner::succeeding(&["numpy/__init__.py"]));
        let missing = BucketName::new("no-such-bucket").unwrap();

        let err = fx.publisher().publish(&fx.spec, &missing).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Upload));
        assert!(fx.platform.published_layers().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_names_stage() {
        let fx = Fixture::new(FakeContainerRunner::succeeding(&["numpy/__init__.py"]));
        fx.platform.deny_publish("not authorized to perform lambda:PublishLayerVersion");

        let err = fx.publisher().publish(&fx.spec, &bucket()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Publish));
        // The uploaded artifact is left in place.
        assert_eq!(fx.store.object_count(), 1);
    }
}
