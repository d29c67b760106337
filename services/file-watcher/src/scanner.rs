use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::types::Object;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Errors from listing the watched bucket
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to list bucket {bucket}: {message}")]
    ListFailed { bucket: String, message: String },
}

/// An object currently present in the bucket
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFile {
    /// Object key
    pub key: String,
    /// Object size in bytes
    pub size_bytes: Option<i64>,
    /// Last modification time reported by the provider
    pub last_modified: Option<DateTime<Utc>>,
}

impl CandidateFile {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            size_bytes: None,
            last_modified: None,
        }
    }
}

/// Lists every object currently in the watched bucket, in provider order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BucketLister: Send + Sync {
    async fn list_current_files(&self) -> Result<Vec<CandidateFile>, StorageError>;
}

/// S3 bucket scanner
pub struct S3BucketScanner {
    client: S3Client,
    bucket: String,
}

impl S3BucketScanner {
    /// Create a new S3 scanner
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        // Static keys win over the default credential chain
        let credentials = static_credentials(config);
        let static_keys = credentials.is_some();
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(credentials);
        }

        let aws_config = loader.load().await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            static_credentials = static_keys,
            "S3 scanner initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BucketLister for S3BucketScanner {
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_current_files(&self) -> Result<Vec<CandidateFile>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .into_paginator()
            .send();

        let mut files = Vec::new();
        let mut page_count = 0usize;

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::ListFailed {
                bucket: self.bucket.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
            page_count += 1;

            files.extend(page.contents().iter().filter_map(candidate_from_object));
        }

        debug!(
            pages = page_count,
            objects = files.len(),
            "Listed bucket contents"
        );

        Ok(files)
    }
}

/// Static credentials when both keys are configured
fn static_credentials(config: &StorageConfig) -> Option<Credentials> {
    match (&config.access_key, &config.secret_key) {
        (Some(access_key), Some(secret_key)) => Some(Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "file-watcher",
        )),
        (None, None) => None,
        (access_key, _) => {
            warn!(
                access_key_set = access_key.is_some(),
                "Only one of the S3 access/secret keys is set, using the default credential chain"
            );
            None
        }
    }
}

/// Convert a listed object, skipping folder placeholders
fn candidate_from_object(object: &Object) -> Option<CandidateFile> {
    let key = object.key()?;
    if key.is_empty() || key.ends_with('/') {
        return None;
    }

    let last_modified = object
        .last_modified()
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()));

    Some(CandidateFile {
        key: key.to_string(),
        size_bytes: object.size(),
        last_modified,
    })
}
