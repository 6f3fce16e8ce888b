//! COCO evaluation primitives.
//!
//! Behavior follows pycocotools (`maskUtils.iou` for boxes and the
//! `evaluateImg` greedy matcher) so scores line up with the reference API.

mod iou;

pub use iou::*;
