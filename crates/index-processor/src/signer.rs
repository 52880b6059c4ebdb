//! Turning catalog asset hrefs into URLs that can be read.

use async_trait::async_trait;
use raster_common::{RasterError, RasterResult};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

/// Produces a readable (possibly time-limited) URL for an asset href.
///
/// Failures are `RateLimited` when the provider throttles and `Fetch`
/// otherwise; callers retry the former only.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, href: &str) -> RasterResult<String>;
}

/// Uses hrefs as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSigner;

#[async_trait]
impl UrlSigner for PassthroughSigner {
    async fn sign(&self, href: &str) -> RasterResult<String> {
        Ok(href.to_string())
    }
}

/// Signs hrefs through a token endpoint.
///
/// Issues `GET <endpoint>?href=<href>` and expects `{"href": "<signed>"}`,
/// the convention of the Planetary Computer SAS API.
pub struct HttpSigner {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SignedHref {
    href: String,
}

impl HttpSigner {
    /// Create a signer with its own HTTP client. Requests are bounded only
    /// by the transport; there is no client-side timeout.
    pub fn new(endpoint: impl Into<String>) -> RasterResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RasterError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UrlSigner for HttpSigner {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn sign(&self, href: &str) -> RasterResult<String> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("href", href)])
            .send()
            .await
            .map_err(|e| RasterError::Fetch(format!("signing request failed: {}", e)))?;

        match response.status() {
            StatusCode::OK => {
                let signed: SignedHref = response.json().await.map_err(|e| {
                    RasterError::Fetch(format!("invalid signing response: {}", e))
                })?;
                debug!("Signed asset href");
                Ok(signed.href)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(RasterError::RateLimited(format!(
                "signing endpoint {} answered 429",
                self.endpoint
            ))),
            status => Err(RasterError::Fetch(format!(
                "signing endpoint {} answered {}",
                self.endpoint, status
            ))),
        }
    }
}
