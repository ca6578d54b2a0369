//! Single-page fetching behind a trait seam.
//!
//! The orchestrator only ever issues plain GETs; authentication is the
//! caller's business (a session cookie baked into the [`reqwest::Client`]).
//! Tests substitute fixture fetchers for [`HttpFetcher`].

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::{error::SyncError, portal::REQUEST_TIMEOUT};

/// Client with the portal timeout applied. Callers that need a session
/// cookie build their own client and use [`HttpFetcher::with_client`].
pub fn client() -> reqwest::Result<Client> {
    Client::builder().timeout(REQUEST_TIMEOUT).build()
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET one page; timeouts, connection errors and non-2xx statuses all
    /// come back as [`SyncError::Network`].
    async fn get(&self, url: &str) -> Result<Bytes, SyncError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> reqwest::Result<Self> {
        Ok(Self { client: client()? })
    }

    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<Bytes, SyncError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?)
    }
}
