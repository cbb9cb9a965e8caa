// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Object storage uploads.
//!
//! The deploy pipelines never hand archives to the platform directly; they
//! upload to a bucket first and pass the resulting reference along, which
//! sidesteps the platform's direct-upload size limit.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::{ConfigurationError, StratusError, StratusResult};
use crate::model::{Artifact, ObjectReference};
use crate::retry::{RetryError, RetryPolicy};
use crate::types::BucketName;

/// Errors reported by an object store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("NoSuchBucket: {bucket}")]
    NoSuchBucket { bucket: String },

    #[error("AccessDenied: {message}")]
    AccessDenied { message: String },

    /// Timeouts, dispatch failures and 5xx responses.
    #[error("transient: {message}")]
    Transient { message: String },

    #[error("{message}")]
    Rejected { message: String },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. })
    }
}

impl From<StoreError> for ConfigurationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoSuchBucket { bucket } => ConfigurationError::NoSuchBucket { bucket },
            StoreError::AccessDenied { message } => ConfigurationError::AccessDenied { message },
            StoreError::Transient { message } | StoreError::Rejected { message } => {
                ConfigurationError::Rejected { message }
            }
        }
    }
}

/// Metadata returned by a successful put.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Minimal object store capability used by the pipelines.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` to `bucket/key`, overwriting any existing object.
    async fn put_object(
        &self,
        bucket: &BucketName,
        key: &str,
        body: &[u8],
    ) -> Result<PutOutcome, StoreError>;

    async fn create_bucket(&self, bucket: &BucketName) -> Result<(), StoreError>;
}

/// Upload client with retry and error classification.
#[derive(Clone)]
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    retry: RetryPolicy,
}

impl ObjectStoreClient {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Upload an artifact. A missing bucket is a configuration error.
    pub async fn upload(
        &self,
        bucket: &BucketName,
        key: &str,
        artifact: &Artifact,
    ) -> StratusResult<ObjectReference> {
        self.put_with_retry(bucket, key, artifact).await
    }

    /// Upload an artifact, creating the bucket once if it does not exist.
    pub async fn upload_creating_bucket(
        &self,
        bucket: &BucketName,
        key: &str,
        artifact: &Artifact,
    ) -> StratusResult<ObjectReference> {
        match self.put_with_retry(bucket, key, artifact).await {
            Err(StratusError::Configuration(ConfigurationError::NoSuchBucket { .. })) => {
                tracing::info!(bucket = %bucket, "Bucket does not exist, creating it");
                self.store
                    .create_bucket(bucket)
                    .await
                    .map_err(|e| StratusError::Configuration(e.into()))?;
                self.put_with_retry(bucket, key, artifact).await
            }
            other => other,
        }
    }

    async fn put_with_retry(
        &self,
        bucket: &BucketName,
        key: &str,
        artifact: &Artifact,
    ) -> StratusResult<ObjectReference> {
        tracing::info!(
            bucket = %bucket,
            key = %key,
            bytes = artifact.len(),
            "Uploading artifact"
        );

        let outcome = self
            .retry
            .run(
                |_| self.store.put_object(bucket, key, artifact.bytes()),
                StoreError::is_transient,
            )
            .await
            .map_err(|e| match e {
                RetryError::Permanent(err) => StratusError::Configuration(err.into()),
                RetryError::Exhausted { attempts, last } => StratusError::TransientUpload {
                    attempts,
                    message: last.to_string(),
                },
            })?;

        Ok(ObjectReference {
            bucket: bucket.to_string(),
            key: key.to_string(),
            etag: outcome.etag,
            version_id: outcome.version_id,
        })
    }
}
