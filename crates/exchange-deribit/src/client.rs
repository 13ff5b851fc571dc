//! Deribit public REST client with rate limiting.
//!
//! Only unauthenticated market-data endpoints are used: the desk never sends
//! orders, it just reads option and perpetual tickers.
//!
//! # Example
//!
//! ```ignore
//! use gex_desk_deribit::{DeribitClient, DeribitClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = DeribitClient::new(DeribitClientConfig::default())?;
//!     let ticker = client.get_ticker("BTC-PERPETUAL").await?;
//!     println!("index: {:?}", ticker.index_price);
//!     Ok(())
//! }
//! ```

use crate::error::{DeribitError, Result};
use crate::types::{Instrument, RpcEnvelope, Ticker};
use async_trait::async_trait;
use gex_desk_core::{DeribitConfig, LegQuote, QuoteSource, SpotQuote};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;

// =============================================================================
// Constants
// =============================================================================

/// Deribit production API base URL.
pub const DERIBIT_PROD_URL: &str = "https://www.deribit.com/api/v2";

/// Deribit testnet API base URL.
pub const DERIBIT_TEST_URL: &str = "https://test.deribit.com/api/v2";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Deribit client.
#[derive(Debug, Clone)]
pub struct DeribitClientConfig {
    /// Base URL for the API.
    pub base_url: String,

    /// Requests per minute limit.
    pub requests_per_minute: NonZeroU32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DeribitClientConfig {
    fn default() -> Self {
        Self {
            base_url: DERIBIT_PROD_URL.to_string(),
            requests_per_minute: nonzero!(600u32),
            timeout_secs: 6,
        }
    }
}

impl From<&DeribitConfig> for DeribitClientConfig {
    fn from(config: &DeribitConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            requests_per_minute: NonZeroU32::new(config.requests_per_minute)
                .unwrap_or(nonzero!(600u32)),
            timeout_secs: config.timeout_secs.max(1),
        }
    }
}

impl DeribitClientConfig {
    /// Creates a configuration for testnet.
    #[must_use]
    pub fn testnet() -> Self {
        Self {
            base_url: DERIBIT_TEST_URL.to_string(),
            ..Default::default()
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_minute: NonZeroU32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

// =============================================================================
// DeribitClient
// =============================================================================

/// Deribit public REST client.
pub struct DeribitClient {
    /// Configuration.
    config: DeribitClientConfig,

    /// HTTP client.
    http: Client,

    /// Rate limiter.
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl std::fmt::Debug for DeribitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeribitClient")
            .field("base_url", &self.config.base_url)
            .field("requests_per_minute", &self.config.requests_per_minute)
            .finish_non_exhaustive()
    }
}

impl DeribitClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: DeribitClientConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("gex-desk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeribitError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_minute(config.requests_per_minute);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Ok(Self {
            config,
            http,
            rate_limiter,
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Sets a custom base URL (useful for testing).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Validates an instrument name before it is put in a query string.
    ///
    /// Names contain only alphanumerics, hyphens, underscores and dots.
    fn validate_instrument(name: &str) -> Result<&str> {
        if name.is_empty() {
            return Err(DeribitError::InvalidInstrument(
                "instrument name cannot be empty".to_string(),
            ));
        }

        if name.len() > 64 {
            return Err(DeribitError::InvalidInstrument(format!(
                "instrument name exceeds maximum length of 64: {}",
                name.len()
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(DeribitError::InvalidInstrument(format!(
                "instrument name contains forbidden characters: {name}"
            )));
        }

        Ok(name)
    }

    /// Waits for rate limiter and makes a GET request against a public method.
    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, method);
        tracing::debug!(url = %url, ?query, "GET");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(DeribitError::RateLimit {
                retry_after_secs: retry_after,
            });
        }

        let text = response.text().await?;
        // Deribit reports RPC errors with 4xx bodies that still carry the envelope.
        let envelope: Option<RpcEnvelope<T>> = serde_json::from_str(&text).ok();

        match envelope {
            Some(RpcEnvelope {
                error: Some(err), ..
            }) => Err(DeribitError::rpc(err.code, err.message)),
            Some(RpcEnvelope {
                result: Some(result),
                ..
            }) if status.is_success() => Ok(result),
            _ if !status.is_success() => Err(DeribitError::api(status.as_u16(), text)),
            Some(_) => Err(DeribitError::EmptyResult(method.to_string())),
            None => Err(DeribitError::Serialization(format!(
                "unexpected response body for {method}"
            ))),
        }
    }

    // =========================================================================
    // Market Data Endpoints
    // =========================================================================

    /// Gets the ticker of one instrument.
    ///
    /// # Errors
    /// Returns error if the instrument is invalid or the API call fails.
    pub async fn get_ticker(&self, instrument: &str) -> Result<Ticker> {
        let instrument = Self::validate_instrument(instrument)?;
        self.get("/public/ticker", &[("instrument_name", instrument)])
            .await
    }

    /// Lists instruments of a currency.
    ///
    /// # Arguments
    /// * `currency` - Underlying currency (e.g., "BTC")
    /// * `kind` - Instrument kind (e.g., "option")
    /// * `expired` - Include expired instruments
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn get_instruments(
        &self,
        currency: &str,
        kind: &str,
        expired: bool,
    ) -> Result<Vec<Instrument>> {
        let currency = Self::validate_instrument(currency)?;
        let expired = if expired { "true" } else { "false" };
        self.get(
            "/public/get_instruments",
            &[("currency", currency), ("kind", kind), ("expired", expired)],
        )
        .await
    }

    /// Finds the call and put instruments of a strike/expiry.
    ///
    /// Returns `(call, put)` names, either of which may be missing on the venue.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn find_straddle_legs(
        &self,
        currency: &str,
        expiry: &str,
        strike: rust_decimal::Decimal,
    ) -> Result<(Option<String>, Option<String>)> {
        let instruments = self.get_instruments(currency, "option", false).await?;
        let expiry = expiry.to_uppercase();

        let matching: Vec<&Instrument> = instruments
            .iter()
            .filter(|i| i.expiry_label() == Some(expiry.as_str()))
            .filter(|i| i.strike_decimal() == Some(strike))
            .collect();

        let call = matching
            .iter()
            .find(|i| i.is_call())
            .map(|i| i.instrument_name.clone());
        let put = matching
            .iter()
            .find(|i| i.is_put())
            .map(|i| i.instrument_name.clone());

        Ok((call, put))
    }
}

#[async_trait]
impl QuoteSource for DeribitClient {
    async fn get_quote(&self, instrument: &str) -> gex_desk_core::Result<LegQuote> {
        self.get_ticker(instrument)
            .await
            .map(|t| t.to_leg_quote())
            .map_err(|e| e.into_quote_unavailable(instrument))
    }

    async fn get_spot(&self, perpetual: &str) -> gex_desk_core::Result<SpotQuote> {
        self.get_ticker(perpetual)
            .await
            .map(|t| t.to_spot_quote())
            .map_err(|e| e.into_quote_unavailable(perpetual))
    }
}
