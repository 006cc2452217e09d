//! Lead qualification scoring
//!
//! Two pure layers: the metric scorer turns channel statistics into
//! named deltas, the aggregator folds those plus classifier deltas into
//! a verdict. Nothing here touches the network or the store, so the
//! whole rubric is unit-testable.

pub mod aggregator;
pub mod metric_scorer;

pub use aggregator::{aggregate, classification_deltas, Verdict};
pub use metric_scorer::score_metrics;
