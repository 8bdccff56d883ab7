//! HTTP transport seam.
//!
//! The storage client is generic over [`HttpFetch`] so tests and embedders can
//! swap the network for an in-memory table.

use crate::{FetchError, Result};
use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tracing::trace;

/// Default request timeout; the client never applies its own deadline on top.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const USER_AGENT: &str = concat!("tacmap/", env!("CARGO_PKG_VERSION"));

/// Asynchronous HTTP GET.
pub trait HttpFetch: Send + Sync {
    /// Fetch `url` and return the body of a successful response.
    ///
    /// A non-success status must be reported as [`FetchError::Status`] and an
    /// unreachable host as a transport error (see [`FetchError::is_transport`]).
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// [`HttpFetch`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for ReqwestFetcher {
    async fn get(&self, url: &str) -> Result<Bytes> {
        trace!(url, "GET");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.bytes().await?)
    }
}
