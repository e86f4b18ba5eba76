use chrono::{DateTime, Utc};
use coiny_fees::{
    fee_for, BlendDiagnostic, CacheGate, CanonicalFeeTable, ChangeDetector, FeeAggregator,
    FeeError, FeeSummary, GateState, PublishedTable, RawEstimate, PUBLISHED_TARGETS,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::persistence::{PersistenceError, RecordStore};
use crate::price::{PriceClient, PriceSource};
use crate::publisher::{PublishError, Publisher, PublisherClient};
use crate::sources::{FeeSource, SourceClient};

/// Fee service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Fee error: {0}")]
    FeeError(#[from] FeeError),

    #[error("Persistence error: {0}")]
    PersistenceError(#[from] PersistenceError),

    #[error("Publish error: {0}")]
    PublishError(#[from] PublishError),

    #[error("No fee estimates have been computed yet")]
    NotReady,
}

/// Result of asking the cache gate for fresh fees
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Sources were queried and a new table was stored
    Updated {
        table: CanonicalFeeTable,
        diagnostics: Vec<BlendDiagnostic>,
    },
    /// The refresh interval has not elapsed yet
    Wait { remaining: chrono::Duration },
}

/// Result of a publication decision
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Published { table: CanonicalFeeTable, text: String },
    Unchanged,
}

/// The stored fees as served to readers
#[derive(Debug, Clone, PartialEq)]
pub struct FeeView {
    pub computed_at: Option<DateTime<Utc>>,
    pub fees: BTreeMap<u32, f64>,
}

/// Service that aggregates, caches and publishes fee estimates
///
/// The service keeps no fee state of its own: every call reads the cache record
/// from the store and writes back a whole replacement. Two concurrent stale
/// refreshes may both hit the sources; the last write wins.
pub struct FeeService {
    primary: Arc<SourceClient>,
    secondary: Arc<SourceClient>,
    records: Arc<RecordStore>,
    price: PriceClient,
    publisher: PublisherClient,
    aggregator: FeeAggregator,
    gate: CacheGate,
    detector: ChangeDetector,
    source_timeout: Duration,
    price_timeout: Duration,
    publish_timeout: Duration,
    last_price: RwLock<Option<f64>>,
}

impl FeeService {
    /// Default per-source fetch timeout
    pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default bound on a BTC price lookup
    pub const DEFAULT_PRICE_TIMEOUT: Duration = Duration::from_secs(5);
    /// Default bound on handing a summary to the publisher
    pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a new fee service
    pub fn new(
        primary: SourceClient,
        secondary: SourceClient,
        records: RecordStore,
        price: PriceClient,
        publisher: PublisherClient,
    ) -> Self {
        Self {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            records: Arc::new(records),
            price,
            publisher,
            aggregator: FeeAggregator::new(),
            gate: CacheGate::new(),
            detector: ChangeDetector::new(),
            source_timeout: Self::DEFAULT_SOURCE_TIMEOUT,
            price_timeout: Self::DEFAULT_PRICE_TIMEOUT,
            publish_timeout: Self::DEFAULT_PUBLISH_TIMEOUT,
            last_price: RwLock::new(None),
        }
    }

    pub fn with_gate(mut self, gate: CacheGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_detector(mut self, detector: ChangeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub fn with_price_timeout(mut self, timeout: Duration) -> Self {
        self.price_timeout = timeout;
        self
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn primary(&self) -> &SourceClient {
        &self.primary
    }

    pub fn secondary(&self) -> &SourceClient {
        &self.secondary
    }

    /// Runs `publish` on a fixed schedule
    pub async fn start(&self, interval_secs: u64) -> Result<(), ServiceError> {
        let mut interval = interval(Duration::from_secs(interval_secs));

        info!("Starting fee scheduler with {}s interval", interval_secs);

        loop {
            interval.tick().await;

            match self.publish().await {
                Ok(PublishOutcome::Published { .. }) => info!("Scheduled run published new fees"),
                Ok(PublishOutcome::Unchanged) => debug!("Scheduled run found no significant change"),
                // Continue running despite errors
                Err(e) => error!("Scheduled fee run failed: {}", e),
            }
        }
    }

    /// Recomputes the fee table if the cache gate is stale.
    ///
    /// A fresh gate returns the remaining wait time without contacting any
    /// source. A stale gate fetches both sources concurrently, blends them and
    /// replaces the stored record.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ServiceError> {
        let record = self.records.load_record()?;

        if let GateState::Fresh { remaining } = self.gate.state(&record, Utc::now()) {
            debug!("Fee cache is fresh, {}s remaining", remaining.num_seconds());
            return Ok(RefreshOutcome::Wait { remaining });
        }

        debug!("Fee cache is stale, querying sources");

        let (primary, secondary) = tokio::join!(
            self.fetch_source(&self.primary),
            self.fetch_source(&self.secondary)
        );

        let aggregation = self
            .aggregator
            .aggregate(primary.as_ref(), secondary.as_ref())
            .inspect_err(|e| error!("Fee aggregation failed: {}", e))?;

        for diagnostic in &aggregation.diagnostics {
            warn!("{}", diagnostic);
        }

        let next = record.with_computation(aggregation.canonical.clone(), aggregation.raw, Utc::now());
        self.records.save_record(&next)?;

        info!("Updated fees: {}", aggregation.canonical);

        Ok(RefreshOutcome::Updated {
            table: aggregation.canonical,
            diagnostics: aggregation.diagnostics,
        })
    }

    /// Refreshes the cache if needed and publishes when fees moved enough.
    ///
    /// The last published table is only replaced after the publisher accepted
    /// the post.
    pub async fn publish(&self) -> Result<PublishOutcome, ServiceError> {
        self.refresh().await?;

        let record = self.records.load_record()?;
        let current = record
            .last_canonical_table
            .as_ref()
            .ok_or(ServiceError::NotReady)?;

        let Some(table) = self
            .detector
            .should_publish(current, record.last_published_table.as_ref())
        else {
            info!("The last publication is already up to date");
            return Ok(PublishOutcome::Unchanged);
        };

        let price = self.current_price().await;
        let text = FeeSummary::new(&table, price).to_string();

        match tokio::time::timeout(self.publish_timeout, self.publisher.publish(&text)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "Publisher timed out after {}ms",
                    self.publish_timeout.as_millis()
                );
                return Err(PublishError::TimedOut(self.publish_timeout).into());
            }
        }

        let next = record.with_published(PublishedTable::from(table.clone()));
        self.records.save_record(&next)?;

        info!("Published new fee summary");
        Ok(PublishOutcome::Published { table, text })
    }

    /// Returns the stored fees for the published targets plus any extra targets.
    ///
    /// Extra targets are answered with the target resolver. Never contacts the
    /// sources.
    pub async fn current_fees(&self, extra_targets: &[u32]) -> Result<FeeView, ServiceError> {
        let record = self.records.load_record()?;
        let computed_at = record.last_computed_at();
        let table = record.last_canonical_table.ok_or(ServiceError::NotReady)?;

        let mut targets = PUBLISHED_TARGETS.to_vec();
        targets.extend_from_slice(extra_targets);
        let fees = fee_for(&targets, table.as_table())?;

        Ok(FeeView { computed_at, fees })
    }

    /// Returns the raw source estimates behind the stored table
    pub async fn raw_estimates(&self) -> Result<Vec<RawEstimate>, ServiceError> {
        Ok(self.records.load_record()?.last_raw_estimates)
    }

    /// Fetches one source, treating errors and timeouts as a missing source
    async fn fetch_source(&self, source: &SourceClient) -> Option<RawEstimate> {
        let id = source.id();

        match tokio::time::timeout(self.source_timeout, source.fetch()).await {
            Ok(Ok(estimate)) => {
                debug!("Fee source {} returned {} targets", id, estimate.rates.len());
                Some(estimate)
            }
            Ok(Err(e)) => {
                warn!("Fee source {} unavailable: {}", id, e);
                None
            }
            Err(_) => {
                warn!(
                    "Fee source {} timed out after {}ms",
                    id,
                    self.source_timeout.as_millis()
                );
                None
            }
        }
    }

    /// Current BTC price, falling back to the last known price
    async fn current_price(&self) -> f64 {
        let reason = match tokio::time::timeout(self.price_timeout, self.price.current_price()).await
        {
            Ok(Ok(price)) => {
                *self.last_price.write().await = Some(price);
                return price;
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {}ms", self.price_timeout.as_millis()),
        };

        let fallback = self.last_price.read().await.unwrap_or(0.0);
        warn!("Failed to fetch BTC price, using {}: {}", fallback, reason);
        fallback
    }
}

#[cfg(test)]
#[path = "fee_service_tests.rs"]
mod tests;
