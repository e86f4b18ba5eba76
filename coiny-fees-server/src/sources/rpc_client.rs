use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use coiny_fees::{normalize, RawEstimate, SourceId, UnitConversion, PUBLISHED_TARGETS};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

use super::{FeeSource, SourceError};

/// `estimatesmartfee` reports BTC/kvB; 1 BTC/kvB = 100_000 sat/vB
const BTC_PER_KVB_TO_SAT_PER_VB: f64 = 100_000.0;

/// Bitcoin RPC configuration
#[derive(Debug, Clone)]
pub struct BitcoinRpcConfig {
    pub url: String,
    pub username: String,
    pub password: String,
}

/// Bitcoin Core fee source using `estimatesmartfee`
pub struct BitcoinRpcClient {
    client: Client,
    config: BitcoinRpcConfig,
    auth_header: String,
    targets: Vec<u32>,
}

#[derive(Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: String,
    method: String,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorResponse>,
    id: String,
}

#[derive(Deserialize)]
struct RpcErrorResponse {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct SmartFeeEstimate {
    feerate: Option<f64>,
    #[serde(default)]
    errors: Vec<String>,
}

impl BitcoinRpcClient {
    /// Creates a new Bitcoin RPC client estimating the published targets
    pub fn new(config: BitcoinRpcConfig) -> Self {
        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", config.username, config.password));

        Self {
            client: Client::new(),
            auth_header: format!("Basic {}", auth),
            config,
            targets: PUBLISHED_TARGETS.to_vec(),
        }
    }

    /// Sends one `estimatesmartfee` per target as a single batch request
    async fn estimate_smart_fees(&self) -> Result<BTreeMap<String, Value>, SourceError> {
        let batch_request: Vec<RpcRequest> = self
            .targets
            .iter()
            .map(|target| RpcRequest {
                jsonrpc: "1.0",
                id: target.to_string(),
                method: "estimatesmartfee".to_string(),
                params: vec![json!(target)],
            })
            .collect();

        let response = self
            .client
            .post(&self.config.url)
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&batch_request)
            .send()
            .await?;

        if !response.status().is_success() {
            error!("RPC request failed with status: {}", response.status());
            return Err(SourceError::InvalidResponse(format!(
                "Bitcoin Core returned status {}",
                response.status()
            )));
        }

        let results: Vec<RpcResponse> = response.json().await?;
        if results.len() != self.targets.len() {
            return Err(SourceError::InvalidResponse(format!(
                "expected {} batch results, got {}",
                self.targets.len(),
                results.len()
            )));
        }

        let mut raw = BTreeMap::new();
        for result in results {
            if let Some(error) = result.error {
                return Err(SourceError::RpcError {
                    code: error.code,
                    message: error.message,
                });
            }

            let value = result.result.ok_or_else(|| {
                SourceError::InvalidResponse(format!("missing result for target {}", result.id))
            })?;
            let estimate: SmartFeeEstimate = serde_json::from_value(value)?;

            // Bitcoin Core omits feerate while it lacks data for a target
            match estimate.feerate {
                Some(feerate) => {
                    raw.insert(result.id, json!(feerate));
                }
                None => warn!(
                    "No Bitcoin Core estimate for target {}: {}",
                    result.id,
                    estimate.errors.join(", ")
                ),
            }
        }

        Ok(raw)
    }

    /// Tests the RPC connection
    pub async fn test_connection(&self) -> Result<(), SourceError> {
        debug!("Testing Bitcoin RPC connection");

        let request = RpcRequest {
            jsonrpc: "1.0",
            id: "test".to_string(),
            method: "getblockcount".to_string(),
            params: vec![],
        };

        let response = self
            .client
            .post(&self.config.url)
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            error!("Connection test failed with status: {}", response.status());
            return Err(SourceError::InvalidResponse(format!(
                "Bitcoin Core returned status {}",
                response.status()
            )));
        }

        let result: RpcResponse = response.json().await?;

        if let Some(error) = result.error {
            return Err(SourceError::RpcError {
                code: error.code,
                message: error.message,
            });
        }

        if result.result.is_none() {
            return Err(SourceError::InvalidResponse("empty getblockcount result".to_string()));
        }

        info!("Bitcoin RPC connection successful");
        Ok(())
    }
}

#[async_trait]
impl FeeSource for BitcoinRpcClient {
    fn id(&self) -> SourceId {
        SourceId::new("bitcoind")
    }

    async fn fetch(&self) -> Result<RawEstimate, SourceError> {
        info!("Fetching smart fee estimates from Bitcoin Core");

        let raw = self.estimate_smart_fees().await?;
        let rates = normalize(&raw, UnitConversion::MultiplyBy(BTC_PER_KVB_TO_SAT_PER_VB))?;

        debug!("Bitcoin Core returned {} fee targets", rates.len());
        Ok(RawEstimate::new(self.id(), rates, Utc::now()))
    }
}
