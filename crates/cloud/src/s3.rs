//! S3-compatible blob store built on `aws-sdk-s3`.
//!
//! Works against AWS S3 or any S3-compatible endpoint (MinIO, Ceph, Azure
//! gateways) when `endpoint_url` is set.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use crate::error::BlobError;
use crate::store::{validate_blob_name, BlobEntry, BlobStore};

/// Connection settings for [`S3BlobStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint_url: Option<String>,
    /// Use `https://host/bucket/key` addressing instead of virtual hosts.
    pub force_path_style: bool,
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

fn backend_err(context: &str, err: impl std::fmt::Display) -> BlobError {
    BlobError::Backend(format!("{context}: {err}"))
}

fn to_chrono(ts: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}

impl S3BlobStore {
    /// Build a client from the ambient AWS credential chain.
    pub async fn connect(settings: &S3Settings) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(settings.force_path_style);
        if let Some(endpoint) = &settings.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        tracing::info!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = ?settings.endpoint_url,
            "S3 blob store configured"
        );

        Self {
            client: Client::from_conf(builder.build()),
            bucket: settings.bucket.clone(),
        }
    }

    async fn fetch(&self, name: &str, range: Option<String>) -> Result<Vec<u8>, BlobError> {
        validate_blob_name(name)?;
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    BlobError::NotFound(name.to_string())
                } else {
                    backend_err("get_object", aws_sdk_s3::error::DisplayErrorContext(e))
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| backend_err("read body", e))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn put(&self, name: &str, data: Vec<u8>) -> Result<(), BlobError> {
        validate_blob_name(name)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| backend_err("put_object", aws_sdk_s3::error::DisplayErrorContext(e)))?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        self.fetch(name, None).await
    }

    async fn get_range(&self, name: &str, offset: u64, len: u64) -> Result<Vec<u8>, BlobError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset + len - 1;
        self.fetch(name, Some(format!("bytes={offset}-{end}"))).await
    }

    async fn head(&self, name: &str) -> Result<Option<BlobEntry>, BlobError> {
        validate_blob_name(name)?;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(output) => Ok(Some(BlobEntry {
                name: name.to_string(),
                size: output.content_length().unwrap_or(0).max(0) as u64,
                last_modified: output.last_modified().and_then(to_chrono),
            })),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(backend_err(
                "head_object",
                aws_sdk_s3::error::DisplayErrorContext(e),
            )),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<BlobEntry>, BlobError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(prefix.map(str::to_string))
            .into_paginator()
            .send();

        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| {
                backend_err("list_objects_v2", aws_sdk_s3::error::DisplayErrorContext(e))
            })?;
            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                entries.push(BlobEntry {
                    name: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object.last_modified().and_then(to_chrono),
                });
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
