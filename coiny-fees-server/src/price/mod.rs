//! BTC/USD price feed used for the USD column of the published summary
//!
//! The price is cosmetic: it never influences fee decisions.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Default CoinGecko simple-price endpoint
pub const COINGECKO_DEFAULT_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Price feed errors
#[derive(Error, Debug)]
pub enum PriceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid price response: {0}")]
    InvalidResponse(String),
}

/// Source of the current BTC price in USD
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self) -> Result<f64, PriceError>;
}

#[derive(Deserialize)]
struct SimplePriceResponse {
    bitcoin: CoinPrice,
}

#[derive(Deserialize)]
struct CoinPrice {
    usd: f64,
}

/// Reads `{"bitcoin": {"usd": N}}` from a CoinGecko style endpoint
pub struct HttpPriceSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpPriceSource {
    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn current_price(&self) -> Result<f64, PriceError> {
        debug!("Fetching BTC price from {}", self.url);

        let response = self.client.get(&self.url).timeout(self.timeout).send().await?;
        if !response.status().is_success() {
            error!("Price request failed with status: {}", response.status());
            return Err(PriceError::InvalidResponse(format!(
                "price feed returned status {}",
                response.status()
            )));
        }

        let body: SimplePriceResponse = response.json().await?;
        let price = body.bitcoin.usd;
        if !price.is_finite() || price < 0.0 {
            return Err(PriceError::InvalidResponse(format!("bad price {price}")));
        }
        Ok(price)
    }
}

/// Wrapper enum over the supported price feeds
pub enum PriceClient {
    Http(HttpPriceSource),
    Fixed(f64),
}

#[async_trait]
impl PriceSource for PriceClient {
    async fn current_price(&self) -> Result<f64, PriceError> {
        match self {
            PriceClient::Http(source) => source.current_price().await,
            PriceClient::Fixed(price) => Ok(*price),
        }
    }
}
