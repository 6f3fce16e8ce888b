//! LRP accumulation across images.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;

use super::{DetectionOutcome, ImageEvaluation, LrpParams};
use crate::dataset::CategoryId;

/// LRP at the best score threshold of a category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OptimalLrp {
    /// Score threshold achieving the minimum LRP.
    pub threshold: f64,
    /// Optimal LRP (oLRP).
    pub lrp: f64,
    /// Mean localization error `1 - IoU` of the true positives. Undefined without true positives.
    pub loc: Option<f64>,
    /// `FP / (TP + FP)`. Undefined without detections.
    pub fp_rate: Option<f64>,
    /// `FN / n_gt`.
    pub fn_rate: f64,
    pub num_tp: usize,
    pub num_fp: usize,
    pub num_fn: usize,
}

/// LRP and its components for every score threshold of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCurve {
    pub category_id: CategoryId,
    /// Non-ignored ground truths.
    pub n_gt: usize,
    pub thresholds: Vec<f64>,
    pub lrp: Vec<f64>,
    pub loc: Vec<Option<f64>>,
    pub fp_rate: Vec<Option<f64>>,
    pub fn_rate: Vec<f64>,
    pub num_tp: Vec<usize>,
    pub num_fp: Vec<usize>,
    pub num_fn: Vec<usize>,
    pub optimal: OptimalLrp,
}

impl CategoryCurve {
    fn at(&self, idx: usize) -> OptimalLrp {
        OptimalLrp {
            threshold: self.thresholds[idx],
            lrp: self.lrp[idx],
            loc: self.loc[idx],
            fp_rate: self.fp_rate[idx],
            fn_rate: self.fn_rate[idx],
            num_tp: self.num_tp[idx],
            num_fp: self.num_fp[idx],
            num_fn: self.num_fn[idx],
        }
    }
}

/// LRP error of one operating point.
///
/// `LRP = (Σ(1 - IoU) / (1 - tau) + FP + FN) / (TP + FP + FN)`, which is 0
/// for a perfect detector and 1 when nothing useful is found. Returns 0
/// when there is nothing to count.
pub fn lrp_error(loc_sum: f64, num_tp: usize, num_fp: usize, num_fn: usize, tau: f64) -> f64 {
    let total = num_tp + num_fp + num_fn;
    if total == 0 {
        return 0.0;
    }
    (loc_sum / (1.0 - tau) + num_fp as f64 + num_fn as f64) / total as f64
}

/// Per-category LRP curves built from per-image evaluations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LrpAccumulator {
    tau: f64,
    thresholds: Vec<f64>,
    category_ids: Vec<CategoryId>,
    /// `None` for categories without non-ignored ground truth.
    curves: Vec<Option<CategoryCurve>>,
}

/// A non-ignored detection flattened across images.
struct ScoredDetection {
    score: f64,
    /// `Some(1 - IoU)` for a true positive.
    loc_error: Option<f64>,
}

impl LrpAccumulator {
    /// Accumulate image evaluations into per-category curves.
    ///
    /// # Arguments
    /// * `evaluations` - Per image/category results, in image order within a category
    /// * `category_ids` - Categories to report, in output order
    /// * `params` - Evaluation parameters (tau and score thresholds)
    pub fn accumulate(
        evaluations: &[ImageEvaluation],
        category_ids: &[CategoryId],
        params: &LrpParams,
    ) -> Self {
        let mut by_category: HashMap<CategoryId, Vec<&ImageEvaluation>> = HashMap::new();
        for eval in evaluations {
            by_category.entry(eval.category_id).or_default().push(eval);
        }

        let curves = category_ids
            .iter()
            .map(|&cat| {
                let evals = by_category.get(&cat).map(Vec::as_slice).unwrap_or(&[]);
                let curve = category_curve(cat, evals, params);
                match &curve {
                    Some(c) => debug!(
                        "category {}: n_gt={} oLRP={:.4} at s={:.2}",
                        cat, c.n_gt, c.optimal.lrp, c.optimal.threshold
                    ),
                    None => debug!("category {}: no ground truth, skipped", cat),
                }
                curve
            })
            .collect();

        Self {
            tau: params.tau,
            thresholds: params.score_thresholds.clone(),
            category_ids: category_ids.to_vec(),
            curves,
        }
    }

    pub fn tau(&self) -> f64 {
        self.tau
    }

    pub fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }

    pub fn category_ids(&self) -> &[CategoryId] {
        &self.category_ids
    }

    /// Curve of a category, `None` if unknown or without ground truth.
    pub fn curve(&self, category_id: CategoryId) -> Option<&CategoryCurve> {
        self.category_ids
            .iter()
            .position(|&c| c == category_id)
            .and_then(|i| self.curves[i].as_ref())
    }

    /// All categories with their curve, in output order.
    pub fn curves(&self) -> impl Iterator<Item = (CategoryId, Option<&CategoryCurve>)> {
        self.category_ids
            .iter()
            .copied()
            .zip(self.curves.iter().map(Option::as_ref))
    }

    /// Number of categories that have a curve.
    pub fn num_evaluated_categories(&self) -> usize {
        self.curves.iter().filter(|c| c.is_some()).count()
    }
}

fn category_curve(
    category_id: CategoryId,
    evaluations: &[&ImageEvaluation],
    params: &LrpParams,
) -> Option<CategoryCurve> {
    let n_gt: usize = evaluations.iter().map(|e| e.num_ground_truths()).sum();
    if n_gt == 0 {
        return None;
    }

    let mut detections: Vec<ScoredDetection> = evaluations
        .iter()
        .flat_map(|e| {
            (0..e.num_detections()).filter_map(move |i| match e.outcome(i) {
                DetectionOutcome::TruePositive { iou } => Some(ScoredDetection {
                    score: e.dt_scores[i],
                    loc_error: Some(1.0 - iou),
                }),
                DetectionOutcome::FalsePositive => Some(ScoredDetection {
                    score: e.dt_scores[i],
                    loc_error: None,
                }),
                DetectionOutcome::Ignored => None,
            })
        })
        .collect();
    detections.sort_by(|a, b| b.score.total_cmp(&a.score));

    // Prefix sums over the score-sorted detections
    let mut cum_tp = Vec::with_capacity(detections.len() + 1);
    let mut cum_loc = Vec::with_capacity(detections.len() + 1);
    cum_tp.push(0usize);
    cum_loc.push(0.0f64);
    for det in &detections {
        let (tp, loc) = match det.loc_error {
            Some(err) => (1, err),
            None => (0, 0.0),
        };
        cum_tp.push(cum_tp[cum_tp.len() - 1] + tp);
        cum_loc.push(cum_loc[cum_loc.len() - 1] + loc);
    }

    let n = params.score_thresholds.len();
    let mut curve = CategoryCurve {
        category_id,
        n_gt,
        thresholds: params.score_thresholds.clone(),
        lrp: Vec::with_capacity(n),
        loc: Vec::with_capacity(n),
        fp_rate: Vec::with_capacity(n),
        fn_rate: Vec::with_capacity(n),
        num_tp: Vec::with_capacity(n),
        num_fp: Vec::with_capacity(n),
        num_fn: Vec::with_capacity(n),
        optimal: OptimalLrp {
            threshold: 0.0,
            lrp: 1.0,
            loc: None,
            fp_rate: None,
            fn_rate: 1.0,
            num_tp: 0,
            num_fp: 0,
            num_fn: n_gt,
        },
    };

    for &s in &params.score_thresholds {
        let kept = detections.partition_point(|d| d.score >= s);
        let tp = cum_tp[kept];
        let fp = kept - tp;
        let fn_ = n_gt.saturating_sub(tp);
        let loc_sum = cum_loc[kept];

        curve.lrp.push(lrp_error(loc_sum, tp, fp, fn_, params.tau));
        curve.loc.push((tp > 0).then(|| loc_sum / tp as f64));
        curve.fp_rate.push((kept > 0).then(|| fp as f64 / kept as f64));
        curve.fn_rate.push(fn_ as f64 / n_gt as f64);
        curve.num_tp.push(tp);
        curve.num_fp.push(fp);
        curve.num_fn.push(fn_);
    }

    // First minimum wins, i.e. the lowest threshold among ties
    let best = curve
        .lrp
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v < curve.lrp[best] { i } else { best });
    curve.optimal = curve.at(best);

    Some(curve)
}
