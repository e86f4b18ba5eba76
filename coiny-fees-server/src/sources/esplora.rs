use async_trait::async_trait;
use chrono::Utc;
use coiny_fees::{normalize, RawEstimate, SourceId, UnitConversion};
use reqwest::Client;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};

use super::{FeeSource, SourceError};

/// Default Esplora instance (Blockstream)
pub const ESPLORA_DEFAULT_URL: &str = "https://blockstream.info";

/// Client for an Esplora `fee-estimates` endpoint.
///
/// Esplora answers with target → sat/vB for targets 1-25, 144, 504 and 1008.
pub struct EsploraClient {
    client: Client,
    base_url: String,
}

impl EsploraClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/fee-estimates", self.base_url)
    }
}

#[async_trait]
impl FeeSource for EsploraClient {
    fn id(&self) -> SourceId {
        SourceId::new("esplora")
    }

    async fn fetch(&self) -> Result<RawEstimate, SourceError> {
        let url = self.endpoint();
        debug!("Fetching Esplora fee estimates from {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            error!("Esplora request failed with status: {}", response.status());
            return Err(SourceError::InvalidResponse(format!(
                "Esplora returned status {}",
                response.status()
            )));
        }

        let body: BTreeMap<String, Value> = response.json().await?;
        let rates = normalize(&body, UnitConversion::Identity)?;

        debug!("Esplora returned {} fee targets", rates.len());
        Ok(RawEstimate::new(self.id(), rates, Utc::now()))
    }
}
