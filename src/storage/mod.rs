//! Object storage uploads.
//!
//! Packages and the index go to an S3 bucket, or any S3-compatible service when
//! a custom endpoint is configured. Credentials come from the standard AWS
//! provider chain (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, profiles, ...).

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use log::debug;

use crate::config::Storage;

/// One object to store. Stored objects are publicly readable.
#[derive(Debug, Clone, PartialEq)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    /// Left to the storage default when `None`
    pub content_type: Option<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, object: PutObject) -> Result<()>;
}

/// Object key of `filename` for the package slug, e.g. "language/example-soft/example-soft-de-DE.zip".
pub fn object_key(path_prefix: &str, package_slug: &str, filename: &str) -> String {
    [
        path_prefix.trim_matches('/'),
        package_slug.trim_matches('/'),
        filename,
    ]
    .iter()
    .filter(|part| !part.is_empty())
    .copied()
    .collect::<Vec<_>>()
    .join("/")
}

/// Stores objects with signed `PutObject` requests.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client for the configured region and optional custom endpoint.
    pub async fn new(storage: &Storage) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = storage.endpoint.as_deref().filter(|e| !e.is_empty()) {
            debug!("Using custom S3 endpoint: {}", endpoint);
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::from_conf(builder.build())
    }

    pub fn from_conf(config: aws_sdk_s3::Config) -> Self {
        Self {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[tracing::instrument(skip(self, object), fields(bucket = %object.bucket, key = %object.key))]
    async fn put_object(&self, object: PutObject) -> Result<()> {
        debug!(
            "Uploading s3://{}/{} ({} bytes)...",
            object.bucket,
            object.key,
            object.body.len()
        );

        let mut request = self
            .client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(object.body));
        if let Some(content_type) = object.content_type {
            request = request.content_type(content_type);
        }

        request
            .send()
            .await
            .with_context(|| format!("Failed to upload s3://{}/{}", object.bucket, object.key))?;

        Ok(())
    }
}
