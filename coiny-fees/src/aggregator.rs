use crate::{
    blender::{blend, reorder, BlendDiagnostic},
    error::{FeeError, Result},
    fee_table::{CanonicalFeeTable, FeeTable, RawEstimate, PUBLISHED_TARGETS},
    target_resolver::fee_for,
};

/// Outcome of one aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// The blended table for every published target
    pub canonical: CanonicalFeeTable,

    /// Fallbacks taken while blending
    pub diagnostics: Vec<BlendDiagnostic>,

    /// Source tables that contributed, as fetched
    pub raw: Vec<RawEstimate>,
}

/// Combines a primary and a secondary estimate into a canonical fee table.
///
/// Each available source is rank reordered and then lifted onto the published
/// targets with the target resolver, because providers only estimate sparse
/// targets. The two lifted tables are then blended. A source that failed (or
/// returned an empty table) simply contributes nothing, and the blend falls back
/// to the other source for every target.
#[derive(Debug, Clone)]
pub struct FeeAggregator {
    targets: Vec<u32>,
}

impl FeeAggregator {
    /// Creates an aggregator for the published targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets every aggregation covers, ascending.
    pub fn targets(&self) -> &[u32] {
        &self.targets
    }

    /// Runs one aggregation pass.
    ///
    /// # Errors
    /// [`FeeError::AllSourcesUnavailable`] when neither source produced data.
    pub fn aggregate(
        &self,
        primary: Option<&RawEstimate>,
        secondary: Option<&RawEstimate>,
    ) -> Result<Aggregation> {
        let primary = primary.filter(|estimate| !estimate.rates.is_empty());
        let secondary = secondary.filter(|estimate| !estimate.rates.is_empty());

        if primary.is_none() && secondary.is_none() {
            return Err(FeeError::AllSourcesUnavailable);
        }

        let primary_table = self.lift(primary)?;
        let secondary_table = self.lift(secondary)?;

        let blended = blend(&primary_table, &secondary_table, &self.targets)?;
        let canonical = CanonicalFeeTable::new(blended.table)?;

        let raw = primary.into_iter().chain(secondary).cloned().collect();

        Ok(Aggregation {
            canonical,
            diagnostics: blended.diagnostics,
            raw,
        })
    }

    fn lift(&self, estimate: Option<&RawEstimate>) -> Result<FeeTable> {
        match estimate {
            Some(estimate) => {
                let ordered = reorder(&estimate.rates);
                Ok(FeeTable::from_rates(fee_for(&self.targets, &ordered)?))
            }
            None => Ok(FeeTable::new()),
        }
    }
}

impl Default for FeeAggregator {
    fn default() -> Self {
        Self {
            targets: PUBLISHED_TARGETS.to_vec(),
        }
    }
}
