//! # lrp-eval - Localization-Recall-Precision evaluation
//!
//! Evaluates COCO-style object detection results with the LRP
//! (Localization-Recall-Precision) error, an alternative to mAP that folds
//! localization quality, false positives and false negatives into a single
//! score per class.
//!
//! ## Features
//!
//! - COCO annotation loading and indexing (images, categories, boxes, crowd regions)
//! - Detection results loading with validation against the ground truth
//! - COCO-compatible greedy matching at a configurable IoU threshold `tau`
//! - Per-class LRP curves over score thresholds and LRP-optimal operating points
//! - moLRP summary with localization / FP / FN components
//!
//! ## Example
//!
//! ```rust,ignore
//! use lrp_eval::{CocoDataset, LrpEvaluator};
//!
//! let gt = CocoDataset::from_path("annotations/instances_val2017.json")?;
//! let dt = gt.load_results("results/detections.json")?;
//!
//! let mut eval = LrpEvaluator::new(&gt, &dt, 0.5)?;
//! eval.evaluate()?;
//! eval.accumulate()?;
//! let summary = eval.summarize(false)?;
//! println!("{}", summary);
//! ```

// Internal modules (ports of the pycocotools evaluation primitives)
pub(crate) mod internal;

// Public modules
pub mod bbox;
pub mod dataset;
pub mod matching;
pub mod metrics;
pub mod utils;

// Re-exports for convenience
pub use bbox::BBox;
pub use dataset::{Annotation, AnnotationId, Category, CategoryId, CocoDataset, DetectionRecord, ImageId, ImageInfo};
pub use metrics::{
    evaluate_image, CategoryCurve, CategorySummary, DetectionOutcome, ImageEvaluation, LrpAccumulator,
    LrpEvaluator, LrpParams, LrpSummary, OptimalLrp,
};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while loading data or evaluating detections
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid annotation: {0}")]
        InvalidAnnotation(String),

        #[error("Invalid results: {0}")]
        InvalidResults(String),

        #[error("evaluate() must be called before accumulate()")]
        NotEvaluated,

        #[error("accumulate() must be called before summarize()")]
        NotAccumulated,

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }

    /// Result type for lrp-eval operations
    pub type Result<T> = std::result::Result<T, Error>;
}
