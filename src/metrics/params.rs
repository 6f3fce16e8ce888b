//! Evaluation parameters.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dataset::{CategoryId, ImageId};
use crate::utils::{is_strictly_increasing, linspace_thresholds};
use crate::{Error, Result};

/// Parameters of an LRP evaluation.
///
/// Every field has a default, so a JSON config only needs to name what it
/// changes:
///
/// ```json
/// { "tau": 0.75, "max_dets": 300 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LrpParams {
    /// IoU threshold for a valid localization, in (0, 1).
    pub tau: f64,

    /// Score thresholds swept when searching for the LRP-optimal operating point.
    pub score_thresholds: Vec<f64>,

    /// Maximum detections kept per image and category (highest scores first).
    pub max_dets: usize,

    /// Object area range `[min, max]`. Ground truths outside it are ignored.
    pub area_range: [f64; 2],

    /// Images to evaluate. Empty means every ground truth image.
    pub image_ids: Vec<ImageId>,

    /// Categories to evaluate. Empty means every ground truth category.
    pub category_ids: Vec<CategoryId>,

    /// When false, categories are pooled and evaluated as one class.
    pub use_categories: bool,
}

impl Default for LrpParams {
    fn default() -> Self {
        Self {
            tau: 0.5,
            score_thresholds: linspace_thresholds(0.0, 1.0, 0.01, 2),
            max_dets: 100,
            area_range: [0.0, 1e10],
            image_ids: Vec::new(),
            category_ids: Vec::new(),
            use_categories: true,
        }
    }
}

impl LrpParams {
    /// Default parameters with the given IoU threshold.
    pub fn with_tau(tau: f64) -> Self {
        Self {
            tau,
            ..Self::default()
        }
    }

    /// Load parameters from a JSON config file. Missing fields keep their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let params: Self = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.tau > 0.0 && self.tau < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "tau must be in (0, 1), got {}",
                self.tau
            )));
        }

        if self.score_thresholds.is_empty() {
            return Err(Error::InvalidConfig(
                "score_thresholds must not be empty".to_string(),
            ));
        }
        if self
            .score_thresholds
            .iter()
            .any(|s| !(0.0..=1.0).contains(s))
        {
            return Err(Error::InvalidConfig(
                "score_thresholds must lie in [0, 1]".to_string(),
            ));
        }
        if !is_strictly_increasing(&self.score_thresholds) {
            return Err(Error::InvalidConfig(
                "score_thresholds must be strictly increasing".to_string(),
            ));
        }

        if self.max_dets == 0 {
            return Err(Error::InvalidConfig("max_dets must be positive".to_string()));
        }

        let [lo, hi] = self.area_range;
        if lo.is_nan() || hi.is_nan() || lo > hi {
            return Err(Error::InvalidConfig(format!(
                "area_range must be an ordered pair, got [{}, {}]",
                lo, hi
            )));
        }

        Ok(())
    }

    /// Whether an area falls inside the configured range (inclusive).
    pub fn area_in_range(&self, area: f64) -> bool {
        area >= self.area_range[0] && area <= self.area_range[1]
    }
}
