mod http;
mod local;
mod memory;
mod s3;

pub use http::HttpObjectStore;
pub use local::LocalObjectStore;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::error::ZipResult;

/// Names one object in a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocator {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Random access to objects in a remote (or not so remote) store.
///
/// Any failure is reported as [`ZipError::RemoteAccess`](crate::ZipError::RemoteAccess).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Total size of the object in bytes
    async fn size(&self, object: &ObjectLocator) -> ZipResult<u64>;

    /// Read the inclusive byte range `start..=end`.
    ///
    /// The result is only shorter than requested when the range runs past
    /// the end of the object.
    async fn read_range(&self, object: &ObjectLocator, start: u64, end: u64) -> ZipResult<Bytes>;
}
