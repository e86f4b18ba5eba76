use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::{
    error::{FeeError, Result},
    fee_table::FeeTable,
};

/// Scales the agreement ratio between two sources into a blending weight.
///
/// Larger values pull the blend towards the cheaper estimate when the sources
/// agree.
pub const CONFIDENCE_SCALE: f64 = 150.0;

/// Re-pairs targets and fees by rank.
///
/// Targets sorted ascending are paired positionally with fee rates sorted
/// descending, so estimator noise such as a 6 block estimate costing more than
/// a 2 block estimate is smoothed out without dropping any data point.
///
/// # Example
/// ```
/// use coiny_fees::{reorder, FeeTable};
///
/// let noisy = FeeTable::from_iter([(2, 8.0), (6, 9.0), (144, 1.0)]);
/// let ordered = reorder(&noisy);
/// assert_eq!(ordered.fee_rates(), vec![9.0, 8.0, 1.0]);
/// ```
pub fn reorder(table: &FeeTable) -> FeeTable {
    let mut fee_rates = table.fee_rates();
    fee_rates.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));

    table.targets().into_iter().zip(fee_rates).collect()
}

/// Which of the two sources has a value for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetPair {
    Matched(f64, f64),
    OnlyA(f64),
    OnlyB(f64),
    Neither,
}

impl TargetPair {
    /// Looks a target up in both tables.
    pub fn lookup(a: &FeeTable, b: &FeeTable, target: u32) -> Self {
        match (a.get(target), b.get(target)) {
            (Some(a), Some(b)) => TargetPair::Matched(a, b),
            (Some(a), None) => TargetPair::OnlyA(a),
            (None, Some(b)) => TargetPair::OnlyB(b),
            (None, None) => TargetPair::Neither,
        }
    }
}

/// Which side of a blend was missing a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendSide {
    Primary,
    Secondary,
}

impl fmt::Display for BlendSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendSide::Primary => f.write_str("primary"),
            BlendSide::Secondary => f.write_str("secondary"),
        }
    }
}

/// Non-fatal observations made while blending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlendDiagnostic {
    /// One source had no value for a target; the other source's value was used.
    MissingCounterpart {
        target: u32,
        missing: BlendSide,
        fallback: f64,
    },
}

impl fmt::Display for BlendDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlendDiagnostic::MissingCounterpart {
                target,
                missing,
                fallback,
            } => write!(
                f,
                "{missing} fee missing for target {target} (fallback: {fallback})"
            ),
        }
    }
}

/// Result of blending two fee tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Blend {
    /// Blended and rank reordered table
    pub table: FeeTable,

    /// Fallbacks taken while blending
    pub diagnostics: Vec<BlendDiagnostic>,

    /// The primary input, kept for observability
    pub primary: FeeTable,

    /// The secondary input, kept for observability
    pub secondary: FeeTable,
}

/// Confidence weighted average of two estimates for the same target.
///
/// The closer the two values, the larger `lvl` and the closer the result sits
/// to the cheaper estimate. When they diverge sharply the result stays near the
/// more expensive one. Rounded to the nearest whole sat/vB.
pub fn blend_pair(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    let min = a.min(b);
    if max <= 0.0 {
        return 0.0;
    }

    let lvl = min / max * CONFIDENCE_SCALE;
    let soft = (max + min * lvl) / (1.0 + lvl);
    soft.round()
}

/// Merges two fee tables over the given targets.
///
/// Targets present in both tables are blended with [`blend_pair`]. A target
/// present in only one table takes that value unchanged and records a
/// [`BlendDiagnostic`]. A target present in neither fails the whole blend with
/// [`FeeError::AllSourcesMissing`]; a partial table is never returned.
///
/// # Example
/// ```
/// use coiny_fees::{blend, FeeTable};
///
/// let a = FeeTable::from_iter([(2, 10.0), (6, 5.0), (144, 1.0)]);
/// let b = FeeTable::from_iter([(2, 12.0), (6, 4.0), (144, 2.0)]);
/// let blended = blend(&a, &b, &[2, 6, 144]).unwrap();
/// assert_eq!(blended.table.fee_rates(), vec![10.0, 4.0, 1.0]);
/// assert!(blended.diagnostics.is_empty());
/// ```
pub fn blend(a: &FeeTable, b: &FeeTable, targets: &[u32]) -> Result<Blend> {
    let mut merged = FeeTable::new();
    let mut diagnostics = Vec::new();

    for &target in targets {
        let fee_rate = match TargetPair::lookup(a, b, target) {
            TargetPair::Matched(a, b) => blend_pair(a, b),
            TargetPair::OnlyA(a) => {
                diagnostics.push(BlendDiagnostic::MissingCounterpart {
                    target,
                    missing: BlendSide::Secondary,
                    fallback: a,
                });
                a
            }
            TargetPair::OnlyB(b) => {
                diagnostics.push(BlendDiagnostic::MissingCounterpart {
                    target,
                    missing: BlendSide::Primary,
                    fallback: b,
                });
                b
            }
            TargetPair::Neither => return Err(FeeError::all_sources_missing(target)),
        };
        merged.insert(target, fee_rate);
    }

    Ok(Blend {
        table: reorder(&merged),
        diagnostics,
        primary: a.clone(),
        secondary: b.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_repairs_inversion() {
        let table = FeeTable::from_iter([(2, 5.0), (6, 7.0), (12, 6.0), (144, 1.0)]);
        let ordered = reorder(&table);

        assert_eq!(ordered.targets(), vec![2, 6, 12, 144]);
        assert_eq!(ordered.fee_rates(), vec![7.0, 6.0, 5.0, 1.0]);
        assert!(ordered.is_rank_ordered());
    }

    #[test]
    fn test_reorder_keeps_ordered_table() {
        let table = FeeTable::from_iter([(2, 10.0), (6, 4.0), (144, 1.0)]);
        assert_eq!(reorder(&table), table);
    }

    #[test]
    fn test_reorder_empty() {
        assert!(reorder(&FeeTable::new()).is_empty());
    }

    #[test]
    fn test_blend_pair_known_values() {
        // lvl = 10/12*150 = 125, soft = (12 + 1250) / 126 ~ 10.02
        assert_eq!(blend_pair(10.0, 12.0), 10.0);
        // lvl = 4/5*150 = 120, soft = (5 + 480) / 121 ~ 4.01
        assert_eq!(blend_pair(5.0, 4.0), 4.0);
        // lvl = 75, soft = (2 + 75) / 76 ~ 1.01
        assert_eq!(blend_pair(1.0, 2.0), 1.0);
    }

    #[test]
    fn test_blend_pair_divergent_sources_stay_expensive() {
        // lvl = 1/100*150 = 1.5, soft = (100 + 1.5) / 2.5 = 40.6
        assert_eq!(blend_pair(1.0, 100.0), 41.0);
    }

    #[test]
    fn test_blend_pair_is_symmetric() {
        assert_eq!(blend_pair(3.0, 17.0), blend_pair(17.0, 3.0));
    }

    #[test]
    fn test_blend_pair_zero() {
        assert_eq!(blend_pair(0.0, 0.0), 0.0);
        // min of zero gives lvl 0 so the blend takes the max
        assert_eq!(blend_pair(0.0, 3.0), 3.0);
    }

    #[test]
    fn test_target_pair_lookup() {
        let a = FeeTable::from_iter([(2, 1.0), (6, 2.0)]);
        let b = FeeTable::from_iter([(2, 3.0), (12, 4.0)]);

        assert_eq!(TargetPair::lookup(&a, &b, 2), TargetPair::Matched(1.0, 3.0));
        assert_eq!(TargetPair::lookup(&a, &b, 6), TargetPair::OnlyA(2.0));
        assert_eq!(TargetPair::lookup(&a, &b, 12), TargetPair::OnlyB(4.0));
        assert_eq!(TargetPair::lookup(&a, &b, 144), TargetPair::Neither);
    }

    #[test]
    fn test_blend_single_source_fallback() {
        let a = FeeTable::from_iter([(2, 10.0), (6, 5.0)]);
        let b = FeeTable::from_iter([(2, 12.0)]);

        let result = blend(&a, &b, &[2, 6]).unwrap();
        assert_eq!(result.table.get(6), Some(5.0));
        assert_eq!(
            result.diagnostics,
            vec![BlendDiagnostic::MissingCounterpart {
                target: 6,
                missing: BlendSide::Secondary,
                fallback: 5.0,
            }]
        );
    }

    #[test]
    fn test_blend_fails_when_target_missing_everywhere() {
        let a = FeeTable::from_iter([(2, 10.0)]);
        let b = FeeTable::from_iter([(2, 12.0)]);

        match blend(&a, &b, &[2, 6]) {
            Err(FeeError::AllSourcesMissing { target }) => assert_eq!(target, 6),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_blend_reorders_result() {
        // Primary-only 6 block value would otherwise exceed the 2 block blend
        let a = FeeTable::from_iter([(2, 10.0), (6, 20.0)]);
        let b = FeeTable::from_iter([(2, 10.0)]);

        let result = blend(&a, &b, &[2, 6]).unwrap();
        assert_eq!(result.table.fee_rates(), vec![20.0, 10.0]);
        assert!(result.table.is_rank_ordered());
    }

    #[test]
    fn test_blend_keeps_inputs() {
        let a = FeeTable::from_iter([(2, 10.0)]);
        let b = FeeTable::from_iter([(2, 12.0)]);

        let result = blend(&a, &b, &[2]).unwrap();
        assert_eq!(result.primary, a);
        assert_eq!(result.secondary, b);
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = BlendDiagnostic::MissingCounterpart {
            target: 6,
            missing: BlendSide::Primary,
            fallback: 5.0,
        };
        assert_eq!(
            diagnostic.to_string(),
            "primary fee missing for target 6 (fallback: 5)"
        );
    }
}
