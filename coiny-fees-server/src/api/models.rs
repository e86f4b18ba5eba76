use chrono::{DateTime, Utc};
use coiny_fees::{BlendDiagnostic, CanonicalFeeTable, GateState, RawEstimate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::ApiError;
use crate::service::{FeeView, PublishOutcome, RefreshOutcome};

/// Query parameters for `GET /fees`
#[derive(Debug, Default, Deserialize)]
pub struct FeesQuery {
    /// Comma separated extra targets, e.g. `3,7,100`
    pub targets: Option<String>,
}

impl FeesQuery {
    /// Parses the extra targets, rejecting anything that is not a positive integer
    pub fn extra_targets(&self) -> Result<Vec<u32>, ApiError> {
        let Some(raw) = self.targets.as_deref() else {
            return Ok(Vec::new());
        };

        raw.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<u32>() {
                Ok(target) if target > 0 => Ok(target),
                _ => Err(ApiError::BadRequest(format!("invalid target: {part}"))),
            })
            .collect()
    }
}

/// Response for `GET /fees`
#[derive(Debug, Serialize, Deserialize)]
pub struct FeesResponse {
    /// ISO 8601 time of the aggregation that produced these fees
    pub computed_at: Option<String>,

    /// Fee rate in sat/vB keyed by confirmation target
    pub fees: BTreeMap<u32, f64>,
}

impl From<FeeView> for FeesResponse {
    fn from(view: FeeView) -> Self {
        Self {
            computed_at: view.computed_at.map(format_timestamp),
            fees: view.fees,
        }
    }
}

/// Response for `GET|POST /fees/update`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum UpdateResponse {
    Updated {
        fees: BTreeMap<u32, f64>,
        diagnostics: Vec<String>,
    },
    Wait {
        remaining_secs: i64,
        message: String,
    },
}

impl From<RefreshOutcome> for UpdateResponse {
    fn from(outcome: RefreshOutcome) -> Self {
        match outcome {
            RefreshOutcome::Updated { table, diagnostics } => UpdateResponse::Updated {
                fees: table_to_map(&table),
                diagnostics: diagnostics.iter().map(BlendDiagnostic::to_string).collect(),
            },
            RefreshOutcome::Wait { remaining } => {
                // Round up so a client never polls a moment too early
                let remaining_secs = (remaining.num_milliseconds() + 999) / 1000;
                UpdateResponse::Wait {
                    remaining_secs,
                    message: GateState::Fresh {
                        remaining: chrono::Duration::seconds(remaining_secs),
                    }
                    .to_string(),
                }
            }
        }
    }
}

/// Response for `POST /publish`
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PublishResponse {
    Published {
        fees: BTreeMap<u32, f64>,
        text: String,
    },
    Unchanged,
}

impl From<PublishOutcome> for PublishResponse {
    fn from(outcome: PublishOutcome) -> Self {
        match outcome {
            PublishOutcome::Published { table, text } => PublishResponse::Published {
                fees: table_to_map(&table),
                text,
            },
            PublishOutcome::Unchanged => PublishResponse::Unchanged,
        }
    }
}

/// One entry of `GET /fees/raw`
#[derive(Debug, Serialize, Deserialize)]
pub struct RawEstimateResponse {
    pub source: String,
    pub fetched_at: String,
    pub fees: BTreeMap<u32, f64>,
}

impl From<RawEstimate> for RawEstimateResponse {
    fn from(estimate: RawEstimate) -> Self {
        Self {
            source: estimate.source.to_string(),
            fetched_at: format_timestamp(estimate.fetched_at),
            fees: estimate.rates.into_rates(),
        }
    }
}

fn table_to_map(table: &CanonicalFeeTable) -> BTreeMap<u32, f64> {
    table.as_table().iter().collect()
}

/// Format timestamp to ISO 8601 with milliseconds and UTC timezone
fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    // Format: "2025-01-20T12:00:00.000Z"
    timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coiny_fees::{BlendSide, PUBLISHED_TARGETS};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn canonical() -> CanonicalFeeTable {
        CanonicalFeeTable::new(PUBLISHED_TARGETS.iter().map(|&t| (t, 2.0)).collect()).unwrap()
    }

    #[test]
    fn test_parse_targets() {
        let query = FeesQuery {
            targets: Some("3, 7,,100".to_string()),
        };
        assert_eq!(query.extra_targets().unwrap(), vec![3, 7, 100]);

        assert!(FeesQuery::default().extra_targets().unwrap().is_empty());
    }

    #[test]
    fn test_parse_targets_rejects_garbage() {
        for bad in ["0", "-1", "abc", "1.5"] {
            let query = FeesQuery {
                targets: Some(bad.to_string()),
            };
            assert!(
                matches!(query.extra_targets(), Err(ApiError::BadRequest(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_wait_response_shape() {
        let response = UpdateResponse::from(RefreshOutcome::Wait {
            remaining: chrono::Duration::milliseconds(250_500),
        });

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "wait",
                "remaining_secs": 251,
                "message": "Wait 4 minutes and 11 seconds"
            })
        );
    }

    #[test]
    fn test_wait_message_matches_whole_seconds() {
        let response = UpdateResponse::from(RefreshOutcome::Wait {
            remaining: chrono::Duration::milliseconds(59_001),
        });

        let UpdateResponse::Wait {
            remaining_secs,
            message,
        } = response
        else {
            panic!("expected a wait response");
        };
        assert_eq!(remaining_secs, 60);
        assert_eq!(message, "Wait 1 minutes and 0 seconds");
    }

    #[test]
    fn test_updated_response_shape() {
        let response = UpdateResponse::from(RefreshOutcome::Updated {
            table: canonical(),
            diagnostics: vec![BlendDiagnostic::MissingCounterpart {
                target: 2,
                missing: BlendSide::Primary,
                fallback: 2.0,
            }],
        });

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], "updated");
        assert_eq!(value["fees"]["1008"], 2.0);
        assert_eq!(value["diagnostics"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_unchanged_response_shape() {
        let value = serde_json::to_value(PublishResponse::from(PublishOutcome::Unchanged)).unwrap();
        assert_eq!(value, json!({"status": "unchanged"}));
    }

    #[test]
    fn test_format_timestamp() {
        let timestamp = DateTime::parse_from_rfc3339("2025-01-20T12:00:00.123Z")
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(format_timestamp(timestamp), "2025-01-20T12:00:00.123Z");
    }
}
