use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use bytes::Bytes;
use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ObjectLocator, ObjectStore};
use crate::error::{ZipError, ZipResult};

/// Reads objects through the AWS SDK.
///
/// Credentials and region come from the usual places: environment,
/// shared config and credentials files, or instance metadata.
pub struct S3ObjectStore {
    client: Client,
    transferred_bytes: AtomicU64,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            transferred_bytes: AtomicU64::new(0),
        }
    }

    /// Build a client from the default credential and region chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config))
    }

    /// Get total bytes transferred from S3
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

/// The HTTP `Range` header for the inclusive range `start..=end`.
fn range_header(start: u64, end: u64) -> String {
    format!("bytes={start}-{end}")
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn size(&self, object: &ObjectLocator) -> ZipResult<u64> {
        debug!("HeadObject {object}");
        let head = self
            .client
            .head_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .map_err(|e| ZipError::remote(object, DisplayErrorContext(&e)))?;

        head.content_length()
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| ZipError::remote(object, "S3 did not return a content length"))
    }

    async fn read_range(&self, object: &ObjectLocator, start: u64, end: u64) -> ZipResult<Bytes> {
        if end < start {
            return Ok(Bytes::new());
        }
        let range = range_header(start, end);
        debug!("GetObject {object} {range}");

        let resp = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .range(range)
            .send()
            .await
            .map_err(|e| ZipError::remote(object, DisplayErrorContext(&e)))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ZipError::remote(object, e))?
            .into_bytes();

        self.transferred_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data)
    }
}
