//! Byte-range access to remote or in-memory files.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use raster_common::{RasterError, RasterResult};
use reqwest::{header, Client, StatusCode};
use tracing::{debug, instrument, warn};

/// Random access to a byte sequence.
///
/// Reads past the end return the bytes that exist; a read starting past
/// the end is an error.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read `len` bytes starting at `offset`.
    async fn read_range(&self, offset: u64, len: usize) -> RasterResult<Bytes>;

    /// Name used in logs and error messages.
    fn identifier(&self) -> &str;
}

/// Range reader over HTTP(S) using `Range: bytes=a-b` requests.
pub struct HttpRangeReader {
    client: Client,
    url: String,
}

impl HttpRangeReader {
    /// Create a reader sharing an existing client.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn read_range(&self, offset: u64, len: usize) -> RasterResult<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let last = offset + len as u64 - 1;
        let response = self
            .client
            .get(&self.url)
            .header(header::RANGE, format!("bytes={}-{}", offset, last))
            .send()
            .await
            .map_err(|e| RasterError::Fetch(format!("request to {} failed: {}", self.url, e)))?;

        match response.status() {
            StatusCode::PARTIAL_CONTENT => {
                let body = response.bytes().await.map_err(|e| {
                    RasterError::Fetch(format!("reading body from {} failed: {}", self.url, e))
                })?;
                debug!(bytes = body.len(), "Range read complete");
                Ok(body)
            }
            StatusCode::OK => {
                // Server ignored the Range header and sent the whole file
                warn!(offset, len, "Server does not support range requests, slicing full body");
                let body = response.bytes().await.map_err(|e| {
                    RasterError::Fetch(format!("reading body from {} failed: {}", self.url, e))
                })?;
                slice_range(&body, offset, len, &self.url)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(RasterError::RateLimited(format!(
                "{} answered 429 for bytes {}-{}",
                self.url, offset, last
            ))),
            status => Err(RasterError::Fetch(format!(
                "{} answered {} for bytes {}-{}",
                self.url, status, offset, last
            ))),
        }
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}

/// Range reader over bytes held in memory.
///
/// Counts requests and bytes served so tests can assert on access patterns.
pub struct MemoryRangeReader {
    name: String,
    data: Bytes,
    requests: AtomicUsize,
    bytes_served: AtomicU64,
}

impl MemoryRangeReader {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            requests: AtomicUsize::new(0),
            bytes_served: AtomicU64::new(0),
        }
    }

    /// Number of `read_range` calls so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Total bytes returned so far.
    pub fn bytes_served(&self) -> u64 {
        self.bytes_served.load(Ordering::SeqCst)
    }

    /// Size of the underlying data.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl RangeReader for MemoryRangeReader {
    async fn read_range(&self, offset: u64, len: usize) -> RasterResult<Bytes> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let bytes = slice_range(&self.data, offset, len, &self.name)?;
        self.bytes_served
            .fetch_add(bytes.len() as u64, Ordering::SeqCst);
        Ok(bytes)
    }

    fn identifier(&self) -> &str {
        &self.name
    }
}

fn slice_range(data: &Bytes, offset: u64, len: usize, name: &str) -> RasterResult<Bytes> {
    let start = usize::try_from(offset)
        .ok()
        .filter(|start| *start < data.len() || (len == 0 && *start == data.len()))
        .ok_or_else(|| {
            RasterError::Fetch(format!(
                "offset {} is past the end of {} ({} bytes)",
                offset,
                name,
                data.len()
            ))
        })?;
    let end = start.saturating_add(len).min(data.len());
    Ok(data.slice(start..end))
}
