//! Fee aggregation service

mod fee_service;

pub use fee_service::{FeeService, FeeView, PublishOutcome, RefreshOutcome, ServiceError};
