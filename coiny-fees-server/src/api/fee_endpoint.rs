use axum::{
    extract::{Query, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::models::{
    FeesQuery, FeesResponse, PublishResponse, RawEstimateResponse, UpdateResponse,
};
use crate::service::FeeService;

/// GET /fees - Returns the stored fee table, plus any `?targets=` resolved against it
pub async fn get_fees(
    Query(query): Query<FeesQuery>,
    State(service): State<Arc<FeeService>>,
) -> Result<Json<FeesResponse>, ApiError> {
    let extra = query.extra_targets()?;
    info!("Received request for fee estimates");

    let view = service.current_fees(&extra).await.inspect_err(|err| {
        warn!("Failed to read fee estimates: {}", err);
    })?;

    debug!("Returning fee estimates for {} targets", view.fees.len());
    Ok(Json(FeesResponse::from(view)))
}

/// GET|POST /fees/update - Recomputes the fee table unless the cache is fresh
pub async fn update_fees(
    State(service): State<Arc<FeeService>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    info!("Received fee update request");

    let outcome = service.refresh().await?;
    Ok(Json(UpdateResponse::from(outcome)))
}

/// POST /publish - Publishes a summary if fees moved significantly
pub async fn publish_fees(
    State(service): State<Arc<FeeService>>,
) -> Result<Json<PublishResponse>, ApiError> {
    info!("Received publish request");

    let outcome = service.publish().await?;
    Ok(Json(PublishResponse::from(outcome)))
}

/// GET /fees/raw - Returns the source tables behind the stored fees
pub async fn get_raw_fees(
    State(service): State<Arc<FeeService>>,
) -> Result<Json<Vec<RawEstimateResponse>>, ApiError> {
    let raw = service.raw_estimates().await?;
    Ok(Json(raw.into_iter().map(RawEstimateResponse::from).collect()))
}

#[cfg(test)]
#[path = "fee_endpoint_tests.rs"]
mod tests;
