//! S3-compatible object storage client.
//!
//! Works against MinIO in development and any S3-compatible store in
//! production, so the endpoint, credentials and path-style addressing are
//! always explicit rather than resolved from the ambient AWS environment.

use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Object storage connection settings.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket_raw: String,
    pub bucket_processed: String,
}

impl S3Config {
    /// Read settings from the environment, with local MinIO defaults.
    pub fn from_env() -> Self {
        Self {
            endpoint: env_or("S3_ENDPOINT", "http://localhost:9000"),
            region: env_or("S3_REGION", "us-east-1"),
            access_key: env_or("S3_ACCESS_KEY", "minioadmin"),
            secret_key: env_or("S3_SECRET_KEY", "minioadmin"),
            bucket_raw: env_or("S3_BUCKET_RAW", "shortdrama-raw"),
            bucket_processed: env_or("S3_BUCKET_PROCESSED", "shortdrama-processed"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// A listed object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: i64,
}

/// Client over the raw and processed buckets.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client: Client,
    bucket_raw: String,
    bucket_processed: String,
}

impl StorageClient {
    pub fn new(config: &S3Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "shortdrama-worker",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .endpoint_url(&config.endpoint)
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket_raw: config.bucket_raw.clone(),
            bucket_processed: config.bucket_processed.clone(),
        }
    }

    /// Bucket holding source uploads.
    pub fn bucket_raw(&self) -> &str {
        &self.bucket_raw
    }

    /// Bucket receiving finished artifacts.
    pub fn bucket_processed(&self) -> &str {
        &self.bucket_processed
    }

    /// Download an object to a local file.
    pub async fn download_file(&self, bucket: &str, key: &str, path: &Path) -> StorageResult<()> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(err) if err.is_no_such_key() => StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                },
                _ => StorageError::s3(aws_sdk_s3::error::DisplayErrorContext(&e)),
            })?;

        let mut body = response.body.into_async_read();
        let mut file = tokio::fs::File::create(path).await?;
        tokio::io::copy(&mut body, &mut file).await?;
        debug!(bucket, key, path = %path.display(), "Downloaded object");
        Ok(())
    }

    /// Upload a local file.
    pub async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> StorageResult<()> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::s3(format!("read {}: {e}", path.display())))?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::s3(aws_sdk_s3::error::DisplayErrorContext(&e)))?;
        debug!(bucket, key, "Uploaded file");
        Ok(())
    }

    /// Upload in-memory bytes.
    pub async fn upload_bytes(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::s3(aws_sdk_s3::error::DisplayErrorContext(&e)))?;
        debug!(bucket, key, "Uploaded bytes");
        Ok(())
    }

    /// List all objects in a bucket, following pagination.
    pub async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::s3(aws_sdk_s3::error::DisplayErrorContext(&e)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    objects.push(ObjectInfo {
                        key: key.to_string(),
                        size: object.size().unwrap_or(0),
                    });
                }
            }
        }
        Ok(objects)
    }

    /// Whether an object exists.
    pub async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match e.as_service_error() {
                Some(err) if err.is_not_found() => Ok(false),
                _ => Err(StorageError::s3(aws_sdk_s3::error::DisplayErrorContext(&e))),
            },
        }
    }
}
