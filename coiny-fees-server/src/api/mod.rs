//! HTTP API endpoints for the fee service

mod error;
mod fee_endpoint;
mod models;

pub use error::ApiError;
pub use fee_endpoint::{get_fees, get_raw_fees, publish_fees, update_fees};
pub use models::{FeesQuery, FeesResponse, PublishResponse, RawEstimateResponse, UpdateResponse};
