//! MagicBell list-endpoint source.
//!
//! Fetches `GET {api_host}/v2/notifications?limit=N` with the user's bearer
//! token and decodes the `{"data": [...]}` envelope.  Parsing lives in
//! [`MagicBellFetcher::parse_page`] so tests can exercise it without the
//! network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{Fetcher, Notification};
use crate::error::FetchError;
use crate::state::Credential;

/// Production API host; `API_HOST` overrides it on the command line.
pub const DEFAULT_API_HOST: &str = "https://api.magicbell.com";

/// How many notifications a fetch asks for.
pub const DEFAULT_LIMIT: usize = 8;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a whole list request, body included.  A fetch that hangs
/// would otherwise hold the pipeline's single fetch slot forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Response envelope of the list endpoint.
#[derive(Debug, Deserialize)]
struct NotificationPage {
    data: Option<Vec<Notification>>,
}

/// A [`Fetcher`] backed by the MagicBell user API.
pub struct MagicBellFetcher {
    client: Client,
    api_host: String,
    limit: usize,
}

impl MagicBellFetcher {
    /// Create a fetcher.
    ///
    /// # Arguments
    ///
    /// * `api_host`: scheme and host, without a trailing path
    ///   (e.g. `https://api.magicbell.com`).
    /// * `limit`: number of notifications requested per fetch.
    pub fn new(api_host: impl Into<String>, limit: usize) -> Result<Self, FetchError> {
        Self::with_timeout(api_host, limit, REQUEST_TIMEOUT)
    }

    /// Like [`new`](Self::new) with a custom request timeout.
    pub fn with_timeout(
        api_host: impl Into<String>,
        limit: usize,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            client,
            api_host: api_host.into().trim_end_matches('/').to_string(),
            limit,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v2/notifications", self.api_host)
    }

    /// Decode a list-endpoint body.  A missing or null `data` field is an
    /// empty page, not an error.
    pub fn parse_page(body: &str) -> Result<Vec<Notification>, FetchError> {
        let page: NotificationPage = serde_json::from_str(body)?;
        Ok(page.data.unwrap_or_default())
    }
}

#[async_trait]
impl Fetcher for MagicBellFetcher {
    fn name(&self) -> &str {
        "magicbell"
    }

    async fn fetch(&self, credential: &Credential) -> Result<Vec<Notification>, FetchError> {
        debug!(limit = self.limit, account = %credential.email, "listing notifications");

        let response = self
            .client
            .get(self.endpoint())
            .bearer_auth(&credential.token)
            .query(&[("limit", self.limit)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Self::parse_page(&body)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
