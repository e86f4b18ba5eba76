use coiny_fees::FeeError;
use thiserror::Error;

/// Errors raised while fetching from a fee provider.
///
/// Any of these makes the provider count as unavailable for the current pass.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("RPC error: {message}")]
    RpcError { code: i32, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid fee data: {0}")]
    InvalidData(#[from] FeeError),

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}
