use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{ObjectLocator, ObjectStore};
use crate::error::{ZipError, ZipResult};

/// Objects held in memory.
///
/// Every range request is recorded, so callers can see exactly which bytes
/// an extraction asked for.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: HashMap<ObjectLocator, Bytes>,
    requests: Mutex<Vec<(u64, u64)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, object: ObjectLocator, data: impl Into<Bytes>) {
        self.objects.insert(object, data.into());
    }

    /// The inclusive ranges requested so far, in request order.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn object(&self, object: &ObjectLocator) -> ZipResult<&Bytes> {
        self.objects
            .get(object)
            .ok_or_else(|| ZipError::remote(object, "no such object"))
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn size(&self, object: &ObjectLocator) -> ZipResult<u64> {
        Ok(self.object(object)?.len() as u64)
    }

    async fn read_range(&self, object: &ObjectLocator, start: u64, end: u64) -> ZipResult<Bytes> {
        let data = self.object(object)?;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((start, end));
        }
        let len = data.len() as u64;
        if start >= len || end < start {
            return Err(ZipError::remote(
                object,
                format!("range {start}-{end} not satisfiable for {len} bytes"),
            ));
        }
        let end = end.min(len - 1);
        Ok(data.slice(start as usize..=end as usize))
    }
}
