use std::collections::BTreeMap;

use crate::{
    error::{FeeError, Result},
    fee_table::FeeTable,
};

/// Resolves arbitrary confirmation targets against a sparse fee table.
///
/// Providers only estimate a handful of targets, so a request for, say, 7
/// blocks has to be answered from a neighbouring tier. Each requested target is
/// answered with the fee of the largest table target that is not slower than the
/// request. Requests faster than the table's fastest tier are clamped up to it.
///
/// # Arguments
/// * `requested` - Confirmation targets to resolve, in any order; duplicates are
///   collapsed
/// * `table` - A non-empty fee table
///
/// # Returns
/// Exactly one fee rate per distinct requested target, keyed by the requested
/// target.
///
/// # Example
/// ```
/// use coiny_fees::{fee_for, FeeTable};
///
/// let table = FeeTable::from_iter([(2, 10.0), (6, 4.0), (144, 1.0)]);
/// let fees = fee_for(&[1, 7, 1008], &table).unwrap();
/// assert_eq!(fees[&1], 10.0);
/// assert_eq!(fees[&7], 4.0);
/// assert_eq!(fees[&1008], 1.0);
/// ```
pub fn fee_for(requested: &[u32], table: &FeeTable) -> Result<BTreeMap<u32, f64>> {
    let min_target = table
        .min_target()
        .ok_or_else(|| FeeError::invalid_input("cannot resolve targets against an empty fee table"))?;

    let mut targets = requested.to_vec();
    targets.sort_unstable();
    targets.dedup();

    let mut tiers: Vec<(u32, f64)> = table.iter().collect();
    tiers.reverse();

    let mut resolved = BTreeMap::new();
    for target in targets {
        if target == 0 {
            return Err(FeeError::invalid_input("confirmation target must be at least 1 block"));
        }

        let lookup = target.max(min_target);
        let fee_rate = tiers
            .iter()
            .find(|(tier, _)| lookup >= *tier)
            .map(|(_, fee)| *fee)
            .ok_or_else(|| FeeError::all_sources_missing(target))?;

        resolved.insert(target, fee_rate);
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> FeeTable {
        FeeTable::from_iter([(2, 20.0), (6, 12.0), (12, 8.0), (144, 2.0), (504, 1.0)])
    }

    #[test]
    fn test_exact_tiers() {
        let fees = fee_for(&[2, 6, 12, 144, 504], &sample_table()).unwrap();
        assert_eq!(fees.values().copied().collect::<Vec<_>>(), vec![20.0, 12.0, 8.0, 2.0, 1.0]);
    }

    #[test]
    fn test_between_tiers_uses_faster_tier() {
        let fees = fee_for(&[4, 24, 48], &sample_table()).unwrap();
        assert_eq!(fees[&4], 20.0);
        assert_eq!(fees[&24], 8.0);
        assert_eq!(fees[&48], 8.0);
    }

    #[test]
    fn test_below_minimum_is_clamped() {
        let fees = fee_for(&[1], &sample_table()).unwrap();
        assert_eq!(fees[&1], 20.0);
    }

    #[test]
    fn test_beyond_maximum_uses_slowest_tier() {
        let fees = fee_for(&[1008, 5000], &sample_table()).unwrap();
        assert_eq!(fees[&1008], 1.0);
        assert_eq!(fees[&5000], 1.0);
    }

    #[test]
    fn test_unsorted_and_duplicate_requests() {
        let fees = fee_for(&[144, 2, 144, 6], &sample_table()).unwrap();
        assert_eq!(fees.len(), 3);
        assert_eq!(fees.keys().copied().collect::<Vec<_>>(), vec![2, 6, 144]);
    }

    #[test]
    fn test_empty_table_is_rejected() {
        assert!(matches!(
            fee_for(&[2], &FeeTable::new()),
            Err(FeeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_zero_target_is_rejected() {
        assert!(matches!(
            fee_for(&[0], &sample_table()),
            Err(FeeError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_request() {
        assert!(fee_for(&[], &sample_table()).unwrap().is_empty());
    }
}
