//! Ground truth annotation store for COCO-format files.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};

use super::{AnnotationId, CategoryId, ImageId};
use crate::bbox::BBox;
use crate::{Error, Result};

/// Image entry of a COCO file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub id: ImageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ImageInfo {
    pub fn new(id: ImageId) -> Self {
        Self {
            id,
            width: None,
            height: None,
            file_name: None,
        }
    }
}

/// Category entry of a COCO file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl Category {
    pub fn new(id: CategoryId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            supercategory: None,
        }
    }
}

/// A ground truth box or, in a results dataset, a scored detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,
    pub bbox: BBox,
    /// Area used for area-range filtering. Defaults to the box area.
    pub area: f64,
    /// Crowd regions are never counted as misses and absorb overlapping detections.
    pub iscrowd: bool,
    /// Explicitly ignored ground truth.
    pub ignore: bool,
    /// Confidence, present on detections only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Annotation {
    /// Create a plain (non-crowd, non-ignored) ground truth annotation.
    pub fn new(id: AnnotationId, image_id: ImageId, category_id: CategoryId, bbox: BBox) -> Self {
        Self {
            id,
            image_id,
            category_id,
            bbox,
            area: bbox.area(),
            iscrowd: false,
            ignore: false,
            score: None,
        }
    }

    /// Mark the annotation as a crowd region.
    pub fn crowd(mut self) -> Self {
        self.iscrowd = true;
        self
    }

    /// Attach a detection confidence.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Override the area used for range filtering.
    pub fn with_area(mut self, area: f64) -> Self {
        self.area = area;
        self
    }
}

// ============================================================================
// COCO JSON schema
// ============================================================================

#[derive(Debug, Deserialize)]
struct CocoFile {
    #[serde(default)]
    images: Vec<ImageInfo>,
    #[serde(default)]
    categories: Vec<Category>,
    #[serde(default)]
    annotations: Vec<RawAnnotation>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    id: AnnotationId,
    image_id: ImageId,
    category_id: CategoryId,
    bbox: BBox,
    #[serde(default)]
    area: Option<f64>,
    #[serde(default, deserialize_with = "flag")]
    iscrowd: bool,
    #[serde(default, deserialize_with = "flag")]
    ignore: bool,
    #[serde(default)]
    score: Option<f64>,
}

impl From<RawAnnotation> for Annotation {
    fn from(raw: RawAnnotation) -> Self {
        Self {
            id: raw.id,
            image_id: raw.image_id,
            category_id: raw.category_id,
            bbox: raw.bbox,
            area: raw.area.unwrap_or_else(|| raw.bbox.area()),
            iscrowd: raw.iscrowd,
            ignore: raw.ignore,
            score: raw.score,
        }
    }
}

/// COCO stores flags as `0`/`1`; accept booleans too.
fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
    })
}

// ============================================================================
// Indexed dataset
// ============================================================================

/// An indexed COCO dataset.
///
/// Holds either ground truth annotations or, when produced by
/// [`CocoDataset::load_results`], scored detections sharing the ground
/// truth's images and categories.
#[derive(Debug, Clone, Default)]
pub struct CocoDataset {
    images: BTreeMap<ImageId, ImageInfo>,
    categories: BTreeMap<CategoryId, Category>,
    /// Annotations in file order.
    annotations: Vec<Annotation>,
    ann_index: HashMap<AnnotationId, usize>,
    img_to_anns: HashMap<ImageId, Vec<usize>>,
    img_cat_to_anns: HashMap<(ImageId, CategoryId), Vec<usize>>,
    cat_to_imgs: HashMap<CategoryId, BTreeSet<ImageId>>,
}

impl CocoDataset {
    /// Load and index a COCO annotation file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let start = Instant::now();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read annotation file {}: {}", path.display(), e),
            ))
        })?;
        let dataset = Self::from_json_str(&content)?;
        info!(
            "loaded {} images, {} categories, {} annotations from {} in {:.2?}",
            dataset.num_images(),
            dataset.num_categories(),
            dataset.num_annotations(),
            path.display(),
            start.elapsed()
        );
        Ok(dataset)
    }

    /// Parse and index COCO JSON content.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CocoFile = serde_json::from_str(content)?;
        Self::from_parts(
            file.images,
            file.categories,
            file.annotations.into_iter().map(Annotation::from).collect(),
        )
    }

    /// Build and index a dataset from already-parsed parts.
    ///
    /// Fails on duplicate image, category or annotation ids and on
    /// annotations that reference unknown images or categories.
    pub fn from_parts(
        images: Vec<ImageInfo>,
        categories: Vec<Category>,
        annotations: Vec<Annotation>,
    ) -> Result<Self> {
        let mut dataset = Self::default();

        for image in images {
            let id = image.id;
            if dataset.images.insert(id, image).is_some() {
                return Err(Error::InvalidAnnotation(format!("duplicate image id {}", id)));
            }
        }
        for category in categories {
            let id = category.id;
            if dataset.categories.insert(id, category).is_some() {
                return Err(Error::InvalidAnnotation(format!("duplicate category id {}", id)));
            }
        }

        for (idx, ann) in annotations.iter().enumerate() {
            if !dataset.images.contains_key(&ann.image_id) {
                return Err(Error::InvalidAnnotation(format!(
                    "annotation {} references unknown image {}",
                    ann.id, ann.image_id
                )));
            }
            if !dataset.categories.contains_key(&ann.category_id) {
                return Err(Error::InvalidAnnotation(format!(
                    "annotation {} references unknown category {}",
                    ann.id, ann.category_id
                )));
            }
            if dataset.ann_index.insert(ann.id, idx).is_some() {
                return Err(Error::InvalidAnnotation(format!("duplicate annotation id {}", ann.id)));
            }

            dataset.img_to_anns.entry(ann.image_id).or_default().push(idx);
            dataset
                .img_cat_to_anns
                .entry((ann.image_id, ann.category_id))
                .or_default()
                .push(idx);
            dataset
                .cat_to_imgs
                .entry(ann.category_id)
                .or_default()
                .insert(ann.image_id);
        }
        dataset.annotations = annotations;

        debug!(
            "index created: {} images, {} categories, {} annotations",
            dataset.images.len(),
            dataset.categories.len(),
            dataset.annotations.len()
        );
        Ok(dataset)
    }

    /// All image ids, ascending.
    pub fn image_ids(&self) -> Vec<ImageId> {
        self.images.keys().copied().collect()
    }

    /// All category ids, ascending.
    pub fn category_ids(&self) -> Vec<CategoryId> {
        self.categories.keys().copied().collect()
    }

    /// Images that contain at least one annotation of every given category.
    ///
    /// An empty filter returns every image.
    pub fn image_ids_for_categories(&self, category_ids: &[CategoryId]) -> Vec<ImageId> {
        let mut ids: BTreeSet<ImageId> = self.images.keys().copied().collect();
        for cat in category_ids {
            let with_cat = self.cat_to_imgs.get(cat).cloned().unwrap_or_default();
            ids = ids.intersection(&with_cat).copied().collect();
        }
        ids.into_iter().collect()
    }

    /// Annotation ids matching every given filter, in file order.
    ///
    /// Empty id filters and `None` mean "no filter". The area range is
    /// exclusive at both ends.
    pub fn annotation_ids(
        &self,
        image_ids: &[ImageId],
        category_ids: &[CategoryId],
        area_range: Option<(f64, f64)>,
        iscrowd: Option<bool>,
    ) -> Vec<AnnotationId> {
        let candidates: Vec<&Annotation> = if image_ids.is_empty() {
            self.annotations.iter().collect()
        } else {
            let mut idxs: Vec<usize> = image_ids
                .iter()
                .filter_map(|id| self.img_to_anns.get(id))
                .flatten()
                .copied()
                .collect();
            idxs.sort_unstable();
            idxs.dedup();
            idxs.into_iter().map(|i| &self.annotations[i]).collect()
        };

        candidates
            .into_iter()
            .filter(|a| category_ids.is_empty() || category_ids.contains(&a.category_id))
            .filter(|a| area_range.map_or(true, |(lo, hi)| a.area > lo && a.area < hi))
            .filter(|a| iscrowd.map_or(true, |c| a.iscrowd == c))
            .map(|a| a.id)
            .collect()
    }

    /// Annotations of one image and category, in file order.
    pub fn annotations_for(&self, image_id: ImageId, category_id: CategoryId) -> Vec<&Annotation> {
        self.img_cat_to_anns
            .get(&(image_id, category_id))
            .map(|idxs| idxs.iter().map(|&i| &self.annotations[i]).collect())
            .unwrap_or_default()
    }

    /// All annotations of one image regardless of category, in file order.
    pub fn annotations_for_image(&self, image_id: ImageId) -> Vec<&Annotation> {
        self.img_to_anns
            .get(&image_id)
            .map(|idxs| idxs.iter().map(|&i| &self.annotations[i]).collect())
            .unwrap_or_default()
    }

    pub fn annotation(&self, id: AnnotationId) -> Option<&Annotation> {
        self.ann_index.get(&id).map(|&i| &self.annotations[i])
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    pub fn image(&self, id: ImageId) -> Option<&ImageInfo> {
        self.images.get(&id)
    }

    pub fn images(&self) -> impl Iterator<Item = &ImageInfo> {
        self.images.values()
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn num_images(&self) -> usize {
        self.images.len()
    }

    pub fn num_categories(&self) -> usize {
        self.categories.len()
    }

    pub fn num_annotations(&self) -> usize {
        self.annotations.len()
    }
}
