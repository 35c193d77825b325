use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{ObjectLocator, ObjectStore};
use crate::error::{ZipError, ZipResult};

/// Serves objects from a local directory laid out as `<root>/<bucket>/<key>`.
///
/// Handy for trying archives out before uploading them,
/// or for mirrors of a bucket on disk.
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn path_of(&self, object: &ObjectLocator) -> ZipResult<PathBuf> {
        let escapes = |s: &str| s == ".." || s.contains('\\');
        let bucket = object.bucket.as_str();
        if bucket.is_empty()
            || bucket.contains('/')
            || escapes(bucket)
            || object.key.split('/').any(escapes)
        {
            return Err(ZipError::remote(object, "path escapes the store root"));
        }
        let mut path = self.root.join(&object.bucket);
        path.extend(object.key.split('/').filter(|s| !s.is_empty()));
        Ok(path)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn size(&self, object: &ObjectLocator) -> ZipResult<u64> {
        let path = self.path_of(object)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| ZipError::remote(object, e))?;
        if !metadata.is_file() {
            return Err(ZipError::remote(object, format!("{} is not a file", path.display())));
        }
        Ok(metadata.len())
    }

    async fn read_range(&self, object: &ObjectLocator, start: u64, end: u64) -> ZipResult<Bytes> {
        if end < start {
            return Ok(Bytes::new());
        }
        let path = self.path_of(object)?;
        debug!("read {} bytes={}-{}", path.display(), start, end);

        let mut file = File::open(&path)
            .await
            .map_err(|e| ZipError::remote(object, e))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ZipError::remote(object, e))?;

        let mut buf = Vec::with_capacity((end - start + 1) as usize);
        file.take(end - start + 1)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ZipError::remote(object, e))?;
        Ok(Bytes::from(buf))
    }
}
