//! COCO dataset loading and indexing.
//!
//! This module provides the two input stores of an evaluation:
//!
//! - `CocoDataset` - ground truth annotations indexed by image and category
//! - `DetectionRecord` / `CocoDataset::load_results` - detection results
//!   attached to a ground truth dataset

mod annotations;
mod results;

pub use annotations::{Annotation, Category, CocoDataset, ImageInfo};
pub use results::DetectionRecord;

/// COCO image identifier.
pub type ImageId = i64;

/// COCO category identifier.
pub type CategoryId = i64;

/// COCO annotation identifier.
pub type AnnotationId = u64;
