use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{FeeError, Result};

/// Confirmation targets (in blocks) that every published table carries.
pub const PUBLISHED_TARGETS: [u32; 9] = [2, 4, 6, 12, 24, 48, 144, 504, 1008];

/// Returns the human readable time label for a published target.
///
/// Blocks are assumed to arrive every ten minutes on average.
pub fn target_label(target: u32) -> Option<&'static str> {
    match target {
        2 => Some("20 min"),
        4 => Some("40 min"),
        6 => Some("60 min"),
        12 => Some("2 hours"),
        24 => Some("4 hours"),
        48 => Some("8 hours"),
        144 => Some("24 hours"),
        504 => Some("3 days"),
        1008 => Some("7 days"),
        _ => None,
    }
}

/// Fee rates in sat/vB keyed by confirmation target in blocks.
///
/// Keys are whatever a provider chose to estimate, so they are usually sparse
/// and differ between sources. Serializes as a JSON object keyed by the decimal
/// target, e.g. `{"2": 10.0, "6": 4.0}`.
///
/// # Example
/// ```
/// use coiny_fees::FeeTable;
///
/// let table = FeeTable::from_iter([(2, 10.0), (6, 4.0), (144, 1.0)]);
/// assert_eq!(table.get(6), Some(4.0));
/// assert_eq!(table.min_target(), Some(2));
/// assert!(table.is_rank_ordered());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeeTable {
    rates: BTreeMap<u32, f64>,
}

impl FeeTable {
    /// Creates an empty fee table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing map of target to fee rate.
    pub fn from_rates(rates: BTreeMap<u32, f64>) -> Self {
        Self { rates }
    }

    /// Inserts or replaces the fee rate for a target.
    pub fn insert(&mut self, target: u32, fee_rate: f64) {
        self.rates.insert(target, fee_rate);
    }

    /// Gets the fee rate for an exact target.
    pub fn get(&self, target: u32) -> Option<f64> {
        self.rates.get(&target).copied()
    }

    pub fn contains(&self, target: u32) -> bool {
        self.rates.contains_key(&target)
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Returns all targets in ascending order.
    pub fn targets(&self) -> Vec<u32> {
        self.rates.keys().copied().collect()
    }

    /// Returns all fee rates ordered by ascending target.
    pub fn fee_rates(&self) -> Vec<f64> {
        self.rates.values().copied().collect()
    }

    /// Iterates over `(target, fee_rate)` pairs by ascending target.
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.rates.iter().map(|(&target, &fee)| (target, fee))
    }

    /// The smallest (fastest) target present.
    pub fn min_target(&self) -> Option<u32> {
        self.rates.keys().next().copied()
    }

    /// The largest (slowest) target present.
    pub fn max_target(&self) -> Option<u32> {
        self.rates.keys().next_back().copied()
    }

    /// True when fee rates never increase as the target grows.
    pub fn is_rank_ordered(&self) -> bool {
        self.rates
            .values()
            .zip(self.rates.values().skip(1))
            .all(|(faster, slower)| faster >= slower)
    }

    pub fn into_rates(self) -> BTreeMap<u32, f64> {
        self.rates
    }
}

impl FromIterator<(u32, f64)> for FeeTable {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self {
            rates: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for FeeTable {
    /// Formats the table as `{2: 10, 6: 4}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (idx, (target, fee)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{target}: {fee}")?;
        }
        write!(f, "}}")
    }
}

/// The blended, published fee table.
///
/// A canonical table always has a fee for every target in [`PUBLISHED_TARGETS`]
/// and is rank-order consistent: sorted by ascending target its fee rates are
/// non-increasing. Both properties are checked on construction, including when
/// the table is deserialized from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FeeTable", into = "FeeTable")]
pub struct CanonicalFeeTable {
    table: FeeTable,
}

impl CanonicalFeeTable {
    /// Validates a fee table and promotes it to a canonical table.
    pub fn new(table: FeeTable) -> Result<Self> {
        if let Some(missing) = PUBLISHED_TARGETS.iter().find(|&&t| !table.contains(t)) {
            return Err(FeeError::all_sources_missing(*missing));
        }
        if !table.is_rank_ordered() {
            return Err(FeeError::invalid_input(format!(
                "fee rates must not increase with the confirmation target: {table}"
            )));
        }
        Ok(Self { table })
    }

    /// Gets the fee rate for an exact target.
    pub fn get(&self, target: u32) -> Option<f64> {
        self.table.get(target)
    }

    pub fn as_table(&self) -> &FeeTable {
        &self.table
    }

    pub fn into_table(self) -> FeeTable {
        self.table
    }
}

impl TryFrom<FeeTable> for CanonicalFeeTable {
    type Error = FeeError;

    fn try_from(table: FeeTable) -> Result<Self> {
        Self::new(table)
    }
}

impl From<CanonicalFeeTable> for FeeTable {
    fn from(canonical: CanonicalFeeTable) -> Self {
        canonical.table
    }
}

impl fmt::Display for CanonicalFeeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.table.fmt(f)
    }
}

/// Identifies the provider a raw estimate came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized fee table as reported by one provider.
///
/// Only kept for diagnostics and as the "last raw blob" in the cache record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEstimate {
    /// Provider that produced the estimate
    pub source: SourceId,

    /// Fee rates in sat/vB, as fetched (not reordered)
    pub rates: FeeTable,

    /// When the provider was queried
    pub fetched_at: DateTime<Utc>,
}

impl RawEstimate {
    /// Creates a new raw estimate.
    pub fn new(source: SourceId, rates: FeeTable, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source,
            rates,
            fetched_at,
        }
    }
}
