use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, warn};
use reqwest::{Client, StatusCode, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{ObjectLocator, ObjectStore};
use crate::error::{ZipError, ZipResult};

/// HTTP Range reader for objects in S3 or an S3-compatible store.
///
/// Without an endpoint, objects resolve to virtual-hosted S3 URLs
/// (`https://<bucket>.s3.amazonaws.com/<key>`). With one, they resolve
/// path-style (`<endpoint>/<bucket>/<key>`).
/// Requests are unsigned, so objects must be public or the endpoint must
/// handle authentication itself.
pub struct HttpObjectStore {
    client: Client,
    endpoint: Option<Url>,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpObjectStore {
    pub fn new(endpoint: Option<&str>) -> ZipResult<Self> {
        let endpoint = endpoint
            .map(|e| {
                Url::parse(e)
                    .map_err(|err| ZipError::Configuration(format!("bad endpoint {e}: {err}")))
            })
            .transpose()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ZipError::Configuration(format!("couldn't build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    pub fn object_url(&self, object: &ObjectLocator) -> ZipResult<Url> {
        let mut url = match &self.endpoint {
            Some(endpoint) => {
                let mut url = endpoint.clone();
                url.path_segments_mut()
                    .map_err(|_| {
                        ZipError::Configuration(format!("endpoint {endpoint} can't take a path"))
                    })?
                    .pop_if_empty()
                    .push(&object.bucket);
                url
            }
            None => Url::parse(&format!("https://{}.s3.amazonaws.com/", object.bucket))
                .map_err(|e| ZipError::Configuration(format!("bad bucket name: {e}")))?,
        };
        url.path_segments_mut()
            .map_err(|_| ZipError::Configuration(format!("bad object URL for {object}")))?
            .pop_if_empty()
            .extend(object.key.split('/'));
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn size(&self, object: &ObjectLocator) -> ZipResult<u64> {
        let url = self.object_url(object)?;
        debug!("HEAD {url}");

        let resp = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| ZipError::remote(object, e))?;

        if !resp.status().is_success() {
            return Err(ZipError::remote(
                object,
                format!("HTTP request failed with status: {}", resp.status()),
            ));
        }

        // Check if server supports Range requests
        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(ZipError::remote(
                object,
                "remote server does not support Range requests",
            ));
        }

        resp.headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ZipError::remote(object, "remote server did not return Content-Length"))
    }

    async fn read_range(&self, object: &ObjectLocator, start: u64, end: u64) -> ZipResult<Bytes> {
        if end < start {
            return Ok(Bytes::new());
        }
        let url = self.object_url(object)?;
        let expected_size = (end - start + 1) as usize;

        let mut buf = Vec::with_capacity(expected_size);
        let mut retry_count = 0;

        while buf.len() < expected_size {
            let current_start = start + buf.len() as u64;
            let range = format!("bytes={}-{}", current_start, end);
            debug!("GET {url} {range}");

            let result = self
                .client
                .get(url.clone())
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != StatusCode::PARTIAL_CONTENT {
                        return Err(ZipError::remote(
                            object,
                            format!("HTTP request failed with status: {}", resp.status()),
                        ));
                    }

                    let bytes = resp.bytes().await.map_err(|e| ZipError::remote(object, e))?;
                    if bytes.is_empty() {
                        // Ran off the end of the object.
                        break;
                    }
                    let chunk_len = bytes.len().min(expected_size - buf.len());
                    buf.extend_from_slice(&bytes[..chunk_len]);

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(ZipError::remote(object, "max retries exceeded"));
                    }
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(ZipError::remote(object, e)),
            }
        }

        Ok(Bytes::from(buf))
    }
}
