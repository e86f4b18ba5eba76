use serde::{Deserialize, Serialize};

use crate::{error::FeeError, fee_table::CanonicalFeeTable, FeeTable};

/// The table that was last published, or the error marker stored in its place.
///
/// Stored as untagged JSON: either a plain fee table or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublishedTable {
    Failed { error: String },
    Fees(FeeTable),
}

impl PublishedTable {
    /// The published fee table, if this is not an error marker.
    pub fn fees(&self) -> Option<&FeeTable> {
        match self {
            PublishedTable::Fees(table) => Some(table),
            PublishedTable::Failed { .. } => None,
        }
    }
}

impl From<CanonicalFeeTable> for PublishedTable {
    fn from(table: CanonicalFeeTable) -> Self {
        PublishedTable::Fees(table.into_table())
    }
}

impl From<&FeeError> for PublishedTable {
    fn from(err: &FeeError) -> Self {
        PublishedTable::Failed {
            error: err.to_string(),
        }
    }
}

/// Decides whether a freshly computed table differs enough from the last
/// published one to be worth publishing again.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector {
    threshold: f64,
}

impl ChangeDetector {
    /// Relative change in either direction that triggers a publication.
    pub const DEFAULT_THRESHOLD: f64 = 0.1;

    /// Creates a detector with the default ±10% band.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detector with a custom relative threshold.
    pub fn with_threshold(threshold: f64) -> crate::Result<Self> {
        if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
            return Err(FeeError::invalid_config(format!(
                "change threshold must be between 0 and 1, got {threshold}"
            )));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Returns the new table when it should be published, `None` otherwise.
    ///
    /// Without a usable last publication the new table is always published.
    /// Otherwise every target of the last publication is compared through
    /// `last / new`; a single ratio outside `[1 - threshold, 1 + threshold]`
    /// publishes the whole table.
    pub fn should_publish(
        &self,
        new_table: &CanonicalFeeTable,
        last_published: Option<&PublishedTable>,
    ) -> Option<CanonicalFeeTable> {
        let last = match last_published.and_then(PublishedTable::fees) {
            Some(last) if !last.is_empty() => last,
            _ => return Some(new_table.clone()),
        };

        let changed = last
            .iter()
            .any(|(target, last_fee)| self.has_changed(last_fee, new_table.get(target)));

        changed.then(|| new_table.clone())
    }

    fn has_changed(&self, last_fee: f64, new_fee: Option<f64>) -> bool {
        let Some(new_fee) = new_fee else {
            return true;
        };
        if new_fee == 0.0 {
            return last_fee != 0.0;
        }

        let ratio = last_fee / new_fee;
        ratio < 1.0 - self.threshold || ratio > 1.0 + self.threshold
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PUBLISHED_TARGETS;

    fn canonical(fees: [f64; 9]) -> CanonicalFeeTable {
        CanonicalFeeTable::new(PUBLISHED_TARGETS.iter().copied().zip(fees).collect()).unwrap()
    }

    fn base() -> CanonicalFeeTable {
        canonical([100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0])
    }

    #[test]
    fn test_publishes_without_history() {
        let detector = ChangeDetector::new();
        assert_eq!(detector.should_publish(&base(), None), Some(base()));
    }

    #[test]
    fn test_publishes_over_empty_history() {
        let detector = ChangeDetector::new();
        let empty = PublishedTable::Fees(FeeTable::new());
        assert!(detector.should_publish(&base(), Some(&empty)).is_some());
    }

    #[test]
    fn test_publishes_over_error_marker() {
        let detector = ChangeDetector::new();
        let failed = PublishedTable::Failed {
            error: "Undefined fees".to_string(),
        };
        assert!(detector.should_publish(&base(), Some(&failed)).is_some());
    }

    #[test]
    fn test_small_changes_are_suppressed() {
        let detector = ChangeDetector::new();
        let last = PublishedTable::from(base());
        // 100/95 ~ 1.053 and 20/21 ~ 0.952 both stay inside the band
        let new_table = canonical([95.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 21.0]);
        assert_eq!(detector.should_publish(&new_table, Some(&last)), None);
    }

    #[test]
    fn test_identical_table_is_suppressed() {
        let detector = ChangeDetector::new();
        let last = PublishedTable::from(base());
        assert_eq!(detector.should_publish(&base(), Some(&last)), None);
    }

    #[test]
    fn test_single_target_change_publishes_everything() {
        let detector = ChangeDetector::new();
        let last = PublishedTable::from(base());
        // 20/25 = 0.8 for the 7 day target only
        let new_table = canonical([100.0, 90.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 25.0]);
        assert_eq!(
            detector.should_publish(&new_table, Some(&last)),
            Some(new_table)
        );
    }

    #[test]
    fn test_drop_in_fees_publishes() {
        let detector = ChangeDetector::new();
        let last = PublishedTable::from(base());
        // 100/80 = 1.25
        let new_table = canonical([80.0, 80.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0]);
        assert!(detector.should_publish(&new_table, Some(&last)).is_some());
    }

    #[test]
    fn test_zero_fees() {
        let detector = ChangeDetector::new();
        let zeros = canonical([0.0; 9]);
        let last_zero = PublishedTable::from(zeros.clone());
        assert_eq!(detector.should_publish(&zeros, Some(&last_zero)), None);

        let last = PublishedTable::from(canonical([1.0; 9]));
        assert!(detector.should_publish(&zeros, Some(&last)).is_some());
    }

    #[test]
    fn test_target_missing_from_new_table_publishes() {
        let detector = ChangeDetector::new();
        let mut last = base().into_table();
        last.insert(3, 95.0);
        let last = PublishedTable::Fees(last);
        assert!(detector.should_publish(&base(), Some(&last)).is_some());
    }

    #[test]
    fn test_custom_threshold() {
        let detector = ChangeDetector::with_threshold(0.5).unwrap();
        let last = PublishedTable::from(base());
        let new_table = canonical([80.0, 80.0, 80.0, 70.0, 60.0, 50.0, 40.0, 30.0, 20.0]);
        assert_eq!(detector.should_publish(&new_table, Some(&last)), None);

        assert!(ChangeDetector::with_threshold(0.0).is_err());
        assert!(ChangeDetector::with_threshold(1.5).is_err());
    }

    #[test]
    fn test_published_table_json_forms() {
        let marker: PublishedTable = serde_json::from_str(r#"{"error":"Undefined fees"}"#).unwrap();
        assert!(marker.fees().is_none());

        let fees: PublishedTable = serde_json::from_str(r#"{"2":10,"6":4}"#).unwrap();
        assert_eq!(fees.fees().and_then(|t| t.get(6)), Some(4.0));

        let empty: PublishedTable = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.fees().map(FeeTable::len), Some(0));
    }
}
