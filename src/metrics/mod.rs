//! LRP evaluation metrics.
//!
//! This module provides the evaluation pipeline for object detection results:
//!
//! - `LrpParams` - Evaluation configuration (tau, score thresholds, filters)
//! - `evaluate_image` / `ImageEvaluation` - Per-image detection matching
//! - `LrpAccumulator` - Per-category LRP curves and optimal thresholds
//! - `LrpSummary` - moLRP and component means, report formatting
//! - `LrpEvaluator` - Runs the three stages in order

mod params;
mod evaluation;
mod accumulator;
mod summary;
mod evaluator;

pub use params::LrpParams;
pub use evaluation::{evaluate_image, DetectionOutcome, ImageEvaluation, ALL_CATEGORIES};
pub use accumulator::{lrp_error, CategoryCurve, LrpAccumulator, OptimalLrp};
pub use summary::{CategorySummary, LrpSummary};
pub use evaluator::LrpEvaluator;
