//! Per-image matching of detections against ground truth.

use serde::Serialize;

use super::LrpParams;
use crate::dataset::{Annotation, AnnotationId, CategoryId, CocoDataset, ImageId};
use crate::internal::cocoeval::iou_matrix;
use crate::matching::{get_unmatched, match_detections_to_ground_truth};

/// Category id used when categories are pooled (`use_categories = false`).
pub const ALL_CATEGORIES: CategoryId = -1;

/// Score assumed for detections that carry none.
const DEFAULT_SCORE: f64 = 1.0;

/// How a single detection was judged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectionOutcome {
    /// Matched a non-ignored ground truth with the given IoU.
    TruePositive { iou: f64 },
    /// Matched nothing.
    FalsePositive,
    /// Matched an ignored ground truth (crowd, flagged, or out of area range),
    /// or matched nothing while itself out of area range.
    Ignored,
}

/// Matching results of one image and category.
///
/// Detections are stored in descending score order, ground truths with the
/// non-ignored ones first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageEvaluation {
    pub image_id: ImageId,
    pub category_id: CategoryId,

    pub dt_ids: Vec<AnnotationId>,
    pub dt_scores: Vec<f64>,
    /// Matched ground truth id per detection.
    pub dt_matches: Vec<Option<AnnotationId>>,
    /// IoU with the matched ground truth, 0 when unmatched.
    pub dt_ious: Vec<f64>,
    pub dt_ignore: Vec<bool>,

    pub gt_ids: Vec<AnnotationId>,
    pub gt_ignore: Vec<bool>,
    /// Matched detection id per ground truth.
    pub gt_matches: Vec<Option<AnnotationId>>,
}

impl ImageEvaluation {
    /// Classify detection `i`.
    pub fn outcome(&self, i: usize) -> DetectionOutcome {
        if self.dt_ignore[i] {
            DetectionOutcome::Ignored
        } else if self.dt_matches[i].is_some() {
            DetectionOutcome::TruePositive { iou: self.dt_ious[i] }
        } else {
            DetectionOutcome::FalsePositive
        }
    }

    pub fn num_detections(&self) -> usize {
        self.dt_ids.len()
    }

    pub fn num_true_positives(&self) -> usize {
        (0..self.num_detections())
            .filter(|&i| matches!(self.outcome(i), DetectionOutcome::TruePositive { .. }))
            .count()
    }

    pub fn num_false_positives(&self) -> usize {
        (0..self.num_detections())
            .filter(|&i| self.outcome(i) == DetectionOutcome::FalsePositive)
            .count()
    }

    /// Number of ground truths that count towards recall.
    pub fn num_ground_truths(&self) -> usize {
        self.gt_ignore.iter().filter(|&&ig| !ig).count()
    }

    /// Non-ignored ground truths left without a detection.
    pub fn num_false_negatives(&self) -> usize {
        get_unmatched(&self.gt_matches)
            .into_iter()
            .filter(|&g| !self.gt_ignore[g])
            .count()
    }
}

/// Match the detections of one image and category against its ground truth.
///
/// Returns `None` when the image has neither ground truths nor detections
/// for the category. With `use_categories = false` the category is ignored
/// and every annotation of the image takes part.
pub fn evaluate_image(
    gt: &CocoDataset,
    dt: &CocoDataset,
    image_id: ImageId,
    category_id: CategoryId,
    params: &LrpParams,
) -> Option<ImageEvaluation> {
    let (gts, mut dts) = if params.use_categories {
        (
            gt.annotations_for(image_id, category_id),
            dt.annotations_for(image_id, category_id),
        )
    } else {
        (
            gt.annotations_for_image(image_id),
            dt.annotations_for_image(image_id),
        )
    };

    if gts.is_empty() && dts.is_empty() {
        return None;
    }

    // Non-ignored ground truths first (stable)
    let mut gts: Vec<(&Annotation, bool)> = gts
        .into_iter()
        .map(|g| (g, g.ignore || g.iscrowd || !params.area_in_range(g.area)))
        .collect();
    gts.sort_by_key(|&(_, ignored)| ignored);

    // Highest score first (stable), capped at max_dets
    dts.sort_by(|a, b| score_of(b).total_cmp(&score_of(a)));
    dts.truncate(params.max_dets);

    let gt_boxes: Vec<_> = gts.iter().map(|(g, _)| g.bbox).collect();
    let gt_crowd: Vec<bool> = gts.iter().map(|(g, _)| g.iscrowd).collect();
    let gt_ignore: Vec<bool> = gts.iter().map(|&(_, ignored)| ignored).collect();
    let dt_boxes: Vec<_> = dts.iter().map(|d| d.bbox).collect();

    let ious = iou_matrix(&dt_boxes, &gt_boxes, &gt_crowd);
    let matched = match_detections_to_ground_truth(&ious, &gt_ignore, &gt_crowd, params.tau);

    let dt_ignore: Vec<bool> = dts
        .iter()
        .zip(&matched.dt_matches)
        .map(|(d, m)| match m {
            Some(g) => gt_ignore[*g],
            None => !params.area_in_range(d.area),
        })
        .collect();

    Some(ImageEvaluation {
        image_id,
        category_id,
        dt_ids: dts.iter().map(|d| d.id).collect(),
        dt_scores: dts.iter().map(|d| score_of(d)).collect(),
        dt_matches: matched
            .dt_matches
            .iter()
            .map(|m| m.map(|g| gts[g].0.id))
            .collect(),
        dt_ious: matched.dt_ious,
        dt_ignore,
        gt_ids: gts.iter().map(|(g, _)| g.id).collect(),
        gt_ignore,
        gt_matches: matched
            .gt_matches
            .iter()
            .map(|m| m.map(|d| dts[d].id))
            .collect(),
    })
}

fn score_of(ann: &Annotation) -> f64 {
    ann.score.unwrap_or(DEFAULT_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::dataset::{Category, DetectionRecord, ImageInfo};
    use approx::assert_relative_eq;

    fn dataset(gts: Vec<Annotation>) -> CocoDataset {
        CocoDataset::from_parts(
            vec![ImageInfo::new(1), ImageInfo::new(2)],
            vec![Category::new(1, "person"), Category::new(2, "car")],
            gts,
        )
        .unwrap()
    }

    fn results(gt: &CocoDataset, records: Vec<(ImageId, CategoryId, [f64; 4], f64)>) -> CocoDataset {
        let records = records
            .into_iter()
            .map(|(img, cat, b, s)| DetectionRecord::new(img, cat, BBox::new(b[0], b[1], b[2], b[3]), s))
            .collect();
        gt.load_results_from_records(records).unwrap()
    }

    #[test]
    fn test_empty_pair_is_none() {
        let gt = dataset(vec![]);
        let dt = results(&gt, vec![]);
        assert!(evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).is_none());
    }

    #[test]
    fn test_true_and_false_positive() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0))]);
        let dt = results(
            &gt,
            vec![
                (1, 1, [0.0, 0.0, 10.0, 8.0], 0.9),
                (1, 1, [50.0, 50.0, 10.0, 10.0], 0.8),
            ],
        );

        let eval = evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).unwrap();
        assert_eq!(eval.dt_ids, vec![1, 2]);
        assert_eq!(eval.dt_matches, vec![Some(1), None]);
        assert_eq!(eval.gt_matches, vec![Some(1)]);
        assert_relative_eq!(eval.dt_ious[0], 0.8, epsilon = 1e-10);
        assert_eq!(eval.outcome(1), DetectionOutcome::FalsePositive);
        assert_eq!(eval.num_true_positives(), 1);
        assert_eq!(eval.num_false_positives(), 1);
        assert_eq!(eval.num_false_negatives(), 0);
    }

    #[test]
    fn test_detections_sorted_by_score() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0))]);
        let dt = results(
            &gt,
            vec![
                (1, 1, [0.0, 0.0, 10.0, 10.0], 0.3),
                (1, 1, [0.0, 0.0, 10.0, 9.0], 0.7),
            ],
        );

        let eval = evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).unwrap();
        // The higher-scored but less accurate box wins the match
        assert_eq!(eval.dt_ids, vec![2, 1]);
        assert_eq!(eval.dt_scores, vec![0.7, 0.3]);
        assert_eq!(eval.dt_matches, vec![Some(1), None]);
    }

    #[test]
    fn test_max_dets_truncates_lowest_scores() {
        let gt = dataset(vec![]);
        let dt = results(
            &gt,
            (0..5).map(|i| (1, 1, [i as f64 * 20.0, 0.0, 10.0, 10.0], 0.1 * (i + 1) as f64)).collect(),
        );
        let mut params = LrpParams::default();
        params.max_dets = 2;

        let eval = evaluate_image(&gt, &dt, 1, 1, &params).unwrap();
        assert_eq!(eval.dt_ids, vec![5, 4]);
    }

    #[test]
    fn test_crowd_detections_are_ignored() {
        let gt = dataset(vec![
            Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 100.0, 100.0)).crowd(),
            Annotation::new(2, 1, 1, BBox::new(200.0, 200.0, 10.0, 10.0)),
        ]);
        let dt = results(
            &gt,
            vec![
                (1, 1, [10.0, 10.0, 10.0, 10.0], 0.9),
                (1, 1, [30.0, 30.0, 10.0, 10.0], 0.8),
            ],
        );

        let eval = evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).unwrap();
        // Regular gt comes first
        assert_eq!(eval.gt_ids, vec![2, 1]);
        assert_eq!(eval.gt_ignore, vec![false, true]);
        assert_eq!(eval.dt_matches, vec![Some(1), Some(1)]);
        assert_eq!(eval.outcome(0), DetectionOutcome::Ignored);
        assert_eq!(eval.outcome(1), DetectionOutcome::Ignored);
        assert_eq!(eval.num_ground_truths(), 1);
        assert_eq!(eval.num_false_negatives(), 1);
    }

    #[test]
    fn test_area_range_ignores_small_objects() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 4.0, 4.0))]);
        let dt = results(
            &gt,
            vec![
                (1, 1, [0.0, 0.0, 4.0, 4.0], 0.9),
                (1, 1, [50.0, 50.0, 2.0, 2.0], 0.8),
            ],
        );
        let mut params = LrpParams::default();
        params.area_range = [32.0, 1e10];

        let eval = evaluate_image(&gt, &dt, 1, 1, &params).unwrap();
        assert_eq!(eval.gt_ignore, vec![true]);
        // Matched to an ignored gt, and unmatched but too small
        assert_eq!(eval.dt_ignore, vec![true, true]);
        assert_eq!(eval.num_false_positives(), 0);
    }

    #[test]
    fn test_equal_scores_keep_file_order() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0))]);
        let dt = results(
            &gt,
            vec![
                (1, 1, [0.0, 0.0, 10.0, 9.0], 0.5),
                (1, 1, [0.0, 0.0, 10.0, 10.0], 0.5),
            ],
        );

        let eval = evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).unwrap();
        // The first detection in file order takes the gt even though the second overlaps more
        assert_eq!(eval.dt_ids, vec![1, 2]);
        assert_eq!(eval.dt_matches, vec![Some(1), None]);
        assert_eq!(eval.gt_matches, vec![Some(1)]);
        assert_eq!(eval.outcome(1), DetectionOutcome::FalsePositive);
    }

    #[test]
    fn test_flagged_ground_truth_is_ignored() {
        let mut flagged = Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0));
        flagged.ignore = true;
        let gt = dataset(vec![
            flagged,
            Annotation::new(2, 1, 1, BBox::new(100.0, 100.0, 10.0, 10.0)),
        ]);
        let dt = results(&gt, vec![(1, 1, [0.0, 0.0, 10.0, 10.0], 0.9)]);

        let eval = evaluate_image(&gt, &dt, 1, 1, &LrpParams::default()).unwrap();
        assert_eq!(eval.gt_ids, vec![2, 1]);
        assert_eq!(eval.gt_ignore, vec![false, true]);
        assert_eq!(eval.dt_matches, vec![Some(1)]);
        assert_eq!(eval.outcome(0), DetectionOutcome::Ignored);
        assert_eq!(eval.num_ground_truths(), 1);
        assert_eq!(eval.num_false_positives(), 0);
        assert_eq!(eval.num_false_negatives(), 1);
    }

    #[test]
    fn test_categories_are_separate() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0))]);
        let dt = results(&gt, vec![(1, 2, [0.0, 0.0, 10.0, 10.0], 0.9)]);
        let params = LrpParams::default();

        let person = evaluate_image(&gt, &dt, 1, 1, &params).unwrap();
        assert_eq!(person.num_detections(), 0);
        assert_eq!(person.num_false_negatives(), 1);

        let car = evaluate_image(&gt, &dt, 1, 2, &params).unwrap();
        assert_eq!(car.num_false_positives(), 1);
    }

    #[test]
    fn test_pooled_categories_match_across_labels() {
        let gt = dataset(vec![Annotation::new(1, 1, 1, BBox::new(0.0, 0.0, 10.0, 10.0))]);
        let dt = results(&gt, vec![(1, 2, [0.0, 0.0, 10.0, 10.0], 0.9)]);
        let mut params = LrpParams::default();
        params.use_categories = false;

        let eval = evaluate_image(&gt, &dt, 1, ALL_CATEGORIES, &params).unwrap();
        assert_eq!(eval.category_id, ALL_CATEGORIES);
        assert_eq!(eval.num_true_positives(), 1);
    }
}
