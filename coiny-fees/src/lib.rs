//! Coiny Fees - Bitcoin fee aggregation library
//!
//! This library blends the fee estimates of two independent estimators into a
//! single published fee table, throttles how often that table is recomputed and
//! decides when a new table differs enough from the last published one to be
//! worth publishing again.
//!
//! # Features
//! - Normalization of provider units to sat/vB, always rounding up
//! - Rank reordering so faster targets never cost less than slower ones
//! - Confidence weighted blending with single-source fallback
//! - Resolution of arbitrary targets against sparse provider tables
//! - A time based cache gate and a ±10% change detector
//!
//! # Example
//! ```
//! use chrono::Utc;
//! use coiny_fees::{
//!     ChangeDetector, FeeAggregator, FeeSummary, FeeTable, RawEstimate, SourceId,
//! };
//!
//! let bitgo = RawEstimate::new(
//!     SourceId::new("bitgo"),
//!     FeeTable::from_iter([(2, 10.0), (6, 5.0), (144, 1.0)]),
//!     Utc::now(),
//! );
//! let esplora = RawEstimate::new(
//!     SourceId::new("esplora"),
//!     FeeTable::from_iter([(2, 12.0), (6, 4.0), (144, 2.0)]),
//!     Utc::now(),
//! );
//!
//! let aggregation = FeeAggregator::new()
//!     .aggregate(Some(&bitgo), Some(&esplora))
//!     .expect("at least one source is available");
//! assert_eq!(aggregation.canonical.get(2), Some(10.0));
//!
//! // Nothing was published before, so the new table is published
//! let detector = ChangeDetector::new();
//! if let Some(table) = detector.should_publish(&aggregation.canonical, None) {
//!     println!("{}", FeeSummary::new(&table, 60_000.0));
//! }
//! ```

// Public modules
pub mod error;

// Data structures
mod fee_table;

// Engine
mod aggregator;
mod blender;
mod cache_gate;
mod change_detector;
mod normalizer;
mod summary;
mod target_resolver;

// Public exports
pub use aggregator::{Aggregation, FeeAggregator};
pub use blender::{
    blend, blend_pair, reorder, Blend, BlendDiagnostic, BlendSide, TargetPair, CONFIDENCE_SCALE,
};
pub use cache_gate::{CacheGate, CacheRecord, GateState};
pub use change_detector::{ChangeDetector, PublishedTable};
pub use error::{FeeError, Result};
pub use fee_table::{
    target_label, CanonicalFeeTable, FeeTable, RawEstimate, SourceId, PUBLISHED_TARGETS,
};
pub use normalizer::{normalize, UnitConversion};
pub use summary::{FeeSummary, REFERENCE_TX_VBYTES};
pub use target_resolver::fee_for;
