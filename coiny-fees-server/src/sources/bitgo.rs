use async_trait::async_trait;
use chrono::Utc;
use coiny_fees::{normalize, RawEstimate, SourceId, UnitConversion};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::{FeeSource, SourceError};

/// Default BitGo API base URL
pub const BITGO_DEFAULT_URL: &str = "https://www.bitgo.com";

#[derive(Deserialize)]
struct BitGoFeeResponse {
    #[serde(rename = "feeByBlockTarget")]
    fee_by_block_target: BTreeMap<String, Value>,
}

/// Client for BitGo's fee endpoint.
///
/// BitGo reports `feeByBlockTarget` in satoshis per kilobyte.
pub struct BitGoClient {
    client: Client,
    base_url: String,
}

impl BitGoClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/v1/tx/fee", self.base_url)
    }
}

#[async_trait]
impl FeeSource for BitGoClient {
    fn id(&self) -> SourceId {
        SourceId::new("bitgo")
    }

    async fn fetch(&self) -> Result<RawEstimate, SourceError> {
        let url = self.endpoint();
        debug!("Fetching BitGo fee estimates from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            error!("BitGo request failed with status: {}", response.status());
            return Err(SourceError::InvalidResponse(format!(
                "BitGo returned status {}",
                response.status()
            )));
        }

        let body: BitGoFeeResponse = response.json().await?;
        let rates = normalize(&body.fee_by_block_target, UnitConversion::DivideBy(1000.0))?;

        debug!("BitGo returned {} fee targets", rates.len());
        Ok(RawEstimate::new(self.id(), rates, Utc::now()))
    }
}
