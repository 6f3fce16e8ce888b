//! Detection-to-ground-truth matching.

use nalgebra::DMatrix;

/// Outcome of matching one image's detections against its ground truths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    /// Matched ground truth index for each detection.
    pub dt_matches: Vec<Option<usize>>,
    /// IoU with the matched ground truth, 0 when unmatched.
    pub dt_ious: Vec<f64>,
    /// Matched detection index for each ground truth. Crowd regions keep
    /// the last detection they absorbed.
    pub gt_matches: Vec<Option<usize>>,
}

/// Greedily match detections to ground truths the way COCO does.
///
/// Detections are visited in row order, which the caller sorts by
/// descending score. Each detection takes the ground truth with the highest
/// IoU at or above `tau` that is still free. Crowd regions never become
/// unavailable. Once a regular ground truth has been selected, ignored ones
/// are not considered, so ground truths must be ordered with non-ignored
/// entries first.
///
/// # Arguments
/// * `ious` - IoU matrix (n_detections x n_ground_truths)
/// * `gt_ignore` - Ignore flag per ground truth
/// * `gt_crowd` - Crowd flag per ground truth
/// * `tau` - Minimum IoU for a valid match
pub fn match_detections_to_ground_truth(
    ious: &DMatrix<f64>,
    gt_ignore: &[bool],
    gt_crowd: &[bool],
    tau: f64,
) -> MatchResult {
    let n_detections = ious.nrows();
    let n_gts = ious.ncols();

    let mut result = MatchResult {
        dt_matches: vec![None; n_detections],
        dt_ious: vec![0.0; n_detections],
        gt_matches: vec![None; n_gts],
    };

    if n_detections == 0 || n_gts == 0 {
        return result;
    }

    let threshold = tau.min(1.0 - 1e-10);

    for d in 0..n_detections {
        let mut best_iou = threshold;
        let mut best: Option<usize> = None;

        for g in 0..n_gts {
            // Already taken, unless it is a crowd region
            if result.gt_matches[g].is_some() && !gt_crowd[g] {
                continue;
            }
            // A regular match beats any ignored ground truth that follows
            if let Some(m) = best {
                if !gt_ignore[m] && gt_ignore[g] {
                    break;
                }
            }
            if ious[(d, g)] < best_iou {
                continue;
            }
            best_iou = ious[(d, g)];
            best = Some(g);
        }

        if let Some(g) = best {
            result.dt_matches[d] = Some(g);
            result.dt_ious[d] = ious[(d, g)];
            result.gt_matches[g] = Some(d);
        }
    }

    result
}

/// Get unmatched indices from a per-item match list.
pub fn get_unmatched<T>(matches: &[Option<T>]) -> Vec<usize> {
    matches
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_none())
        .map(|(i, _)| i)
        .collect()
}
