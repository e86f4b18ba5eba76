use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{
    change_detector::PublishedTable,
    error::{FeeError, Result},
    fee_table::{CanonicalFeeTable, RawEstimate},
};

/// Everything remembered between two aggregation passes.
///
/// The record is owned by the caller and persisted externally. Every pass takes
/// the current record and hands back a replacement; nothing here is mutated in
/// place by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Unix time in milliseconds of the last successful aggregation
    pub last_computed_at_millis: Option<i64>,

    /// Normalized source tables used by the last aggregation
    pub last_raw_estimates: Vec<RawEstimate>,

    /// Result of the last aggregation
    pub last_canonical_table: Option<CanonicalFeeTable>,

    /// Table (or error marker) that was last published
    pub last_published_table: Option<PublishedTable>,
}

impl CacheRecord {
    /// Creates an empty record, as seen on a cold start.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record that replaces this one after an aggregation pass.
    ///
    /// The last published table is carried over untouched.
    pub fn with_computation(
        &self,
        canonical: CanonicalFeeTable,
        raw: Vec<RawEstimate>,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            last_computed_at_millis: Some(computed_at.timestamp_millis()),
            last_raw_estimates: raw,
            last_canonical_table: Some(canonical),
            last_published_table: self.last_published_table.clone(),
        }
    }

    /// Returns the record that replaces this one after a successful publication.
    pub fn with_published(&self, published: PublishedTable) -> Self {
        Self {
            last_published_table: Some(published),
            ..self.clone()
        }
    }

    /// When the last aggregation happened, if ever.
    pub fn last_computed_at(&self) -> Option<DateTime<Utc>> {
        self.last_computed_at_millis
            .and_then(DateTime::<Utc>::from_timestamp_millis)
    }
}

/// Whether the cached table may still be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// The refresh interval has elapsed; recompute now.
    Stale,
    /// Still within the refresh interval; wait before recomputing.
    Fresh { remaining: Duration },
}

impl fmt::Display for GateState {
    /// Formats a fresh state as `Wait 4 minutes and 10 seconds`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateState::Stale => f.write_str("Stale"),
            GateState::Fresh { remaining } => write!(
                f,
                "Wait {} minutes and {} seconds",
                remaining.num_minutes(),
                remaining.num_seconds() % 60
            ),
        }
    }
}

/// Throttles recomputation to at most once per refresh interval.
///
/// Two states, driven purely by wall-clock time: `Stale` when the interval since
/// `last_computed_at_millis` has elapsed (or nothing was ever computed), and
/// `Fresh` otherwise. Only a stale gate may contact the fee sources.
///
/// # Example
/// ```
/// use chrono::{Duration, Utc};
/// use coiny_fees::{CacheGate, CacheRecord, GateState};
///
/// let gate = CacheGate::new();
/// let now = Utc::now();
///
/// // Cold start: nothing computed yet
/// assert_eq!(gate.state(&CacheRecord::new(), now), GateState::Stale);
///
/// let record = CacheRecord {
///     last_computed_at_millis: Some((now - Duration::minutes(4)).timestamp_millis()),
///     ..CacheRecord::new()
/// };
/// assert_eq!(
///     gate.state(&record, now),
///     GateState::Fresh { remaining: Duration::minutes(6) }
/// );
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CacheGate {
    refresh_interval: Duration,
}

impl CacheGate {
    /// Default refresh interval of ten minutes.
    pub const DEFAULT_REFRESH_INTERVAL_SECS: i64 = 10 * 60;

    /// Creates a gate with the default ten minute interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gate with a custom refresh interval.
    pub fn with_interval(refresh_interval: Duration) -> Result<Self> {
        if refresh_interval <= Duration::zero() {
            return Err(FeeError::invalid_config("refresh interval must be positive"));
        }
        Ok(Self { refresh_interval })
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Evaluates the gate for a record at the given instant.
    pub fn state(&self, record: &CacheRecord, now: DateTime<Utc>) -> GateState {
        let interval_millis = self.refresh_interval.num_milliseconds();
        let now_millis = now.timestamp_millis();
        let last_millis = record
            .last_computed_at_millis
            .unwrap_or(now_millis - interval_millis);

        let elapsed = now_millis.saturating_sub(last_millis);
        if elapsed >= interval_millis {
            return GateState::Stale;
        }

        // A timestamp from the future still waits at most one full interval
        let remaining = (interval_millis - elapsed).min(interval_millis);
        GateState::Fresh {
            remaining: Duration::milliseconds(remaining),
        }
    }
}

impl Default for CacheGate {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::seconds(Self::DEFAULT_REFRESH_INTERVAL_SECS),
        }
    }
}
