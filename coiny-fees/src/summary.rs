use std::fmt;

use crate::fee_table::{target_label, CanonicalFeeTable, PUBLISHED_TARGETS};

/// Virtual size of the reference transaction used for the USD column.
pub const REFERENCE_TX_VBYTES: f64 = 263.0;

const SATS_PER_BTC: f64 = 100_000_000.0;

/// The human readable text that gets published.
///
/// Nine lines, one per published target, each with a time label, the fee rate
/// and what the reference transaction would cost in USD:
///
/// ```text
/// 20 min 10 sat/vB ($1.58)
/// 40 min 9 sat/vB ($1.42)
/// ...
/// ```
#[derive(Debug, Clone)]
pub struct FeeSummary<'a> {
    table: &'a CanonicalFeeTable,
    usd_per_btc: f64,
}

impl<'a> FeeSummary<'a> {
    pub fn new(table: &'a CanonicalFeeTable, usd_per_btc: f64) -> Self {
        Self { table, usd_per_btc }
    }

    /// USD cost of the reference transaction at the given fee rate.
    pub fn usd_cost(&self, fee_rate: f64) -> f64 {
        fee_rate * REFERENCE_TX_VBYTES * self.usd_per_btc / SATS_PER_BTC
    }
}

impl fmt::Display for FeeSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, target) in PUBLISHED_TARGETS.iter().enumerate() {
            // canonical tables always carry every published target
            let fee_rate = self.table.get(*target).unwrap_or_default();
            let label = target_label(*target).unwrap_or_default();

            if idx > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{label} {fee_rate} sat/vB (${:.2})",
                self.usd_cost(fee_rate)
            )?;
        }
        Ok(())
    }
}
