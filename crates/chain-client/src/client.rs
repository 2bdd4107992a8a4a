//! HTTP client for the option chain feed APIs.

use crate::error::Error;
use crate::types::*;
use reqwest::Client;
use std::time::Duration;
use url::Url;


/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "http://localhost:8080").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP client for the option chain feed APIs.
#[derive(Debug, Clone)]
pub struct ChainClient {
    client: Client,
    base_url: String,
}

impl ChainClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self { client, base_url })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::new(ClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Returns the normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Option chain
    // ========================================================================

    /// Gets the live option-chain cache for an underlying and expiry.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_live_chain(
        &self,
        underlying: &str,
        expiry: &str,
    ) -> Result<LiveChainResponse, Error> {
        let url = self.live_chain_url(underlying, expiry)?;
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    /// Gets the snapshot builder rows for an underlying, expiry and
    /// underlying price.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_snapshot(&self, query: &SnapshotQuery) -> Result<Vec<SnapshotRow>, Error> {
        let url = self.snapshot_url(query)?;
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // Underlying
    // ========================================================================

    /// Gets the last traded price of a symbol.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_ltp(&self, symbol: &str) -> Result<LtpResponse, Error> {
        let symbol = required("symbol", symbol)?;
        let url = format!("{}/api/v1/ltp/{}", self.base_url, symbol);
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    /// Lists expiries for an underlying.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_expiries(&self, underlying: &str) -> Result<ExpiriesResponse, Error> {
        let underlying = required("underlying", underlying)?;
        let url = format!("{}/api/v1/expiries/{}", self.base_url, underlying);
        let resp = self.client.get(&url).send().await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // Internal Helpers
    // ========================================================================

    fn live_chain_url(&self, underlying: &str, expiry: &str) -> Result<String, Error> {
        let underlying = required("underlying", underlying)?;
        let expiry = required("expiry", expiry)?;
        Ok(format!(
            "{}/api/v1/option-chain/{}/{}",
            self.base_url, underlying, expiry
        ))
    }

    fn snapshot_url(&self, query: &SnapshotQuery) -> Result<String, Error> {
        required("underlying", &query.underlying)?;
        required("expiry", &query.expiry)?;
        if !(query.underlying_ltp.is_finite() && query.underlying_ltp > 0.0) {
            return Err(Error::InvalidRequest(format!(
                "underlying_ltp must be positive, got {}",
                query.underlying_ltp
            )));
        }
        let encoded = serde_urlencoded::to_string(query)?;
        Ok(format!(
            "{}/api/v1/option-chain/snapshot?{}",
            self.base_url, encoded
        ))
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();

        if status.is_success() {
            let body = resp.bytes().await?;
            Ok(serde_json::from_slice(&body)?)
        } else if status.as_u16() == 404 {
            let text = resp.text().await.unwrap_or_default();
            Err(Error::NotFound(text))
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(Error::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, Error> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidRequest(format!("{} must not be empty", name)));
    }
    Ok(trimmed)
}
