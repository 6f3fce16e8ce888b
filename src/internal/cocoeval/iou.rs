//! IoU (Intersection over Union) matrices for box evaluation.

use nalgebra::DMatrix;

use crate::bbox::BBox;

/// Compute the IoU matrix between detections and ground truths.
///
/// # Arguments
/// * `dts` - Detection boxes
/// * `gts` - Ground truth boxes
/// * `is_crowd` - Per ground truth crowd flag; crowd columns use the
///   detection area as the union
///
/// # Returns
/// IoU matrix of shape (n_dt, n_gt)
pub fn iou_matrix(dts: &[BBox], gts: &[BBox], is_crowd: &[bool]) -> DMatrix<f64> {
    let n = dts.len();
    let m = gts.len();

    if n == 0 || m == 0 {
        return DMatrix::zeros(n, m);
    }

    DMatrix::from_fn(n, m, |i, j| {
        if is_crowd.get(j).copied().unwrap_or(false) {
            dts[i].crowd_iou(&gts[j])
        } else {
            dts[i].iou(&gts[j])
        }
    })
}
