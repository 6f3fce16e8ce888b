//! Detection results attached to a ground truth dataset.

use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::{Annotation, AnnotationId, CategoryId, CocoDataset, ImageId};
use crate::bbox::BBox;
use crate::utils::warn_once;
use crate::{Error, Result};

/// One entry of a COCO results file.
///
/// Reads `{"image_id": 42, "category_id": 18, "bbox": [x, y, w, h], "score": 0.93}`.
/// Extra fields such as `segmentation` are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: BBox,
    pub score: f64,
}

impl DetectionRecord {
    pub fn new(image_id: ImageId, category_id: CategoryId, bbox: BBox, score: f64) -> Self {
        Self {
            image_id,
            category_id,
            bbox,
            score,
        }
    }
}

impl CocoDataset {
    /// Load a results file and attach it to this ground truth.
    pub fn load_results<P: AsRef<Path>>(&self, path: P) -> Result<CocoDataset> {
        let path = path.as_ref();
        let start = Instant::now();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read results file {}: {}", path.display(), e),
            ))
        })?;
        let results = self.load_results_from_str(&content)?;
        info!(
            "loaded {} detections from {} in {:.2?}",
            results.num_annotations(),
            path.display(),
            start.elapsed()
        );
        Ok(results)
    }

    /// Parse a JSON results array and attach it to this ground truth.
    pub fn load_results_from_str(&self, content: &str) -> Result<CocoDataset> {
        let records: Vec<DetectionRecord> = serde_json::from_str(content)?;
        self.load_results_from_records(records)
    }

    /// Attach parsed detections to this ground truth.
    ///
    /// Detections get ids `1..=N` in input order, their box area, and
    /// `iscrowd = false`. Every detection must reference an image and a
    /// category of the ground truth and carry a finite score.
    pub fn load_results_from_records(&self, records: Vec<DetectionRecord>) -> Result<CocoDataset> {
        if records.is_empty() {
            warn!("results contain no detections");
        }

        let mut annotations = Vec::with_capacity(records.len());
        for (idx, record) in records.into_iter().enumerate() {
            if self.image(record.image_id).is_none() {
                return Err(Error::InvalidResults(format!(
                    "results do not correspond to the ground truth: unknown image id {}",
                    record.image_id
                )));
            }
            if self.category(record.category_id).is_none() {
                return Err(Error::InvalidResults(format!(
                    "unknown category id {} for detection on image {}",
                    record.category_id, record.image_id
                )));
            }
            if !record.score.is_finite() {
                return Err(Error::InvalidResults(format!(
                    "non-finite score {} for detection on image {}",
                    record.score, record.image_id
                )));
            }
            if record.bbox.area() <= 0.0 {
                warn_once("results contain boxes with zero area");
            }

            let id = (idx + 1) as AnnotationId;
            annotations.push(
                Annotation::new(id, record.image_id, record.category_id, record.bbox)
                    .with_score(record.score),
            );
        }

        CocoDataset::from_parts(
            self.images().cloned().collect(),
            self.categories().cloned().collect(),
            annotations,
        )
    }
}
