//! Summary metrics and report formatting.

use std::fmt;

use serde::Serialize;

use super::evaluation::ALL_CATEGORIES;
use super::LrpAccumulator;
use crate::dataset::{CategoryId, CocoDataset};
use crate::utils::{mean, mean_defined};
use crate::Result;

const RULE: &str = "------------------------------------------------------------------------";

/// LRP-optimal results of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category_id: CategoryId,
    pub name: String,
    pub n_gt: usize,
    /// `None` when the category has no ground truth.
    pub olrp: Option<f64>,
    pub olrp_loc: Option<f64>,
    pub olrp_fp: Option<f64>,
    pub olrp_fn: Option<f64>,
    /// LRP-optimal score threshold.
    pub threshold: Option<f64>,
}

/// Dataset-level LRP results.
///
/// Means run over categories with ground truth. The localization and FP
/// means only include categories where those components are defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LrpSummary {
    pub tau: f64,
    pub molrp: Option<f64>,
    pub molrp_loc: Option<f64>,
    pub molrp_fp: Option<f64>,
    pub molrp_fn: Option<f64>,
    pub mean_threshold: Option<f64>,
    /// Categories that contributed to the means.
    pub num_evaluated_categories: usize,
    pub categories: Vec<CategorySummary>,
}

impl LrpSummary {
    /// Reduce accumulated curves to summary metrics.
    ///
    /// # Arguments
    /// * `acc` - Accumulated per-category curves
    /// * `gt` - Ground truth dataset, used for category names
    pub fn from_accumulator(acc: &LrpAccumulator, gt: &CocoDataset) -> Self {
        let categories: Vec<CategorySummary> = acc
            .curves()
            .map(|(category_id, curve)| {
                let name = if category_id == ALL_CATEGORIES {
                    "all".to_string()
                } else {
                    gt.category(category_id)
                        .map(|c| c.name.clone())
                        .unwrap_or_else(|| category_id.to_string())
                };
                match curve {
                    Some(c) => CategorySummary {
                        category_id,
                        name,
                        n_gt: c.n_gt,
                        olrp: Some(c.optimal.lrp),
                        olrp_loc: c.optimal.loc,
                        olrp_fp: c.optimal.fp_rate,
                        olrp_fn: Some(c.optimal.fn_rate),
                        threshold: Some(c.optimal.threshold),
                    },
                    None => CategorySummary {
                        category_id,
                        name,
                        n_gt: 0,
                        olrp: None,
                        olrp_loc: None,
                        olrp_fp: None,
                        olrp_fn: None,
                        threshold: None,
                    },
                }
            })
            .collect();

        let evaluated: Vec<&CategorySummary> =
            categories.iter().filter(|c| c.olrp.is_some()).collect();

        Self {
            tau: acc.tau(),
            molrp: mean(evaluated.iter().filter_map(|c| c.olrp)),
            molrp_loc: mean_defined(evaluated.iter().map(|c| c.olrp_loc)),
            molrp_fp: mean_defined(evaluated.iter().map(|c| c.olrp_fp)),
            molrp_fn: mean(evaluated.iter().filter_map(|c| c.olrp_fn)),
            mean_threshold: mean(evaluated.iter().filter_map(|c| c.threshold)),
            num_evaluated_categories: evaluated.len(),
            categories,
        }
    }

    /// Summary of one category by id.
    pub fn category(&self, category_id: CategoryId) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.category_id == category_id)
    }

    /// Format the summary, with a per-category table when `detailed`.
    pub fn report(&self, detailed: bool) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail
        let _ = self.write_report(&mut out, detailed);
        out
    }

    /// Serialize the summary as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn write_report(&self, out: &mut impl fmt::Write, detailed: bool) -> fmt::Result {
        writeln!(out, "{}", RULE)?;
        writeln!(out, " LRP evaluation (tau = {:.2})", self.tau)?;
        writeln!(out, "{}", RULE)?;
        writeln!(out, " moLRP             = {}", fmt_opt(self.molrp))?;
        writeln!(out, " moLRP_LocComp     = {}", fmt_opt(self.molrp_loc))?;
        writeln!(out, " moLRP_FPComp      = {}", fmt_opt(self.molrp_fp))?;
        writeln!(out, " moLRP_FNComp      = {}", fmt_opt(self.molrp_fn))?;
        writeln!(out, " mean s*           = {}", fmt_opt(self.mean_threshold))?;
        writeln!(
            out,
            " categories        = {} evaluated / {} total",
            self.num_evaluated_categories,
            self.categories.len()
        )?;
        writeln!(out, "{}", RULE)?;

        if detailed {
            writeln!(
                out,
                " {:<24} {:>7} {:>8} {:>8} {:>8} {:>8} {:>6}",
                "category", "n_gt", "oLRP", "Loc", "FP", "FN", "s*"
            )?;
            for c in &self.categories {
                writeln!(
                    out,
                    " {:<24} {:>7} {:>8} {:>8} {:>8} {:>8} {:>6}",
                    truncate(&c.name, 24),
                    c.n_gt,
                    fmt_opt(c.olrp),
                    fmt_opt(c.olrp_loc),
                    fmt_opt(c.olrp_fp),
                    fmt_opt(c.olrp_fn),
                    c.threshold.map_or_else(|| "n/a".to_string(), |t| format!("{:.2}", t)),
                )?;
            }
            writeln!(out, "{}", RULE)?;
        }
        Ok(())
    }
}

impl fmt::Display for LrpSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_report(f, false)
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v))
}

fn truncate(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Category, ImageInfo};
    use crate::metrics::{ImageEvaluation, LrpParams};
    use approx::assert_relative_eq;

    fn gt() -> CocoDataset {
        CocoDataset::from_parts(
            vec![ImageInfo::new(1)],
            vec![Category::new(1, "person"), Category::new(2, "car"), Category::new(3, "dog")],
            vec![],
        )
        .unwrap()
    }

    fn eval(category_id: CategoryId, scores: Vec<f64>, ious: Vec<Option<f64>>, n_gt: usize) -> ImageEvaluation {
        let n = scores.len();
        ImageEvaluation {
            image_id: 1,
            category_id,
            dt_ids: (1..=n as u64).collect(),
            dt_scores: scores,
            dt_matches: ious.iter().map(|m| m.map(|_| 1)).collect(),
            dt_ious: ious.iter().map(|m| m.unwrap_or(0.0)).collect(),
            dt_ignore: vec![false; n],
            gt_ids: (1..=n_gt as u64).collect(),
            gt_ignore: vec![false; n_gt],
            gt_matches: vec![None; n_gt],
        }
    }

    fn summary() -> LrpSummary {
        let evals = vec![
            // person: one perfect TP -> oLRP 0
            eval(1, vec![0.9], vec![Some(1.0)], 1),
            // car: no detections -> oLRP 1
            eval(2, vec![], vec![], 2),
            // dog: no ground truth -> excluded
            eval(3, vec![0.5], vec![None], 0),
        ];
        let acc = LrpAccumulator::accumulate(&evals, &[1, 2, 3], &LrpParams::default());
        LrpSummary::from_accumulator(&acc, &gt())
    }

    #[test]
    fn test_means_skip_missing_categories() {
        let s = summary();
        assert_eq!(s.num_evaluated_categories, 2);
        assert_relative_eq!(s.molrp.unwrap(), 0.5);
        assert_relative_eq!(s.molrp_fn.unwrap(), 0.5);
        // Only person has true positives / detections
        assert_relative_eq!(s.molrp_loc.unwrap(), 0.0);
        assert_relative_eq!(s.molrp_fp.unwrap(), 0.0);
    }

    #[test]
    fn test_category_entries() {
        let s = summary();
        let dog = s.category(3).unwrap();
        assert_eq!(dog.name, "dog");
        assert_eq!(dog.olrp, None);

        let car = s.category(2).unwrap();
        assert_eq!(car.olrp, Some(1.0));
        assert_eq!(car.olrp_loc, None);
        assert_eq!(car.n_gt, 2);
    }

    #[test]
    fn test_empty_summary() {
        let acc = LrpAccumulator::accumulate(&[], &[1], &LrpParams::default());
        let s = LrpSummary::from_accumulator(&acc, &gt());
        assert_eq!(s.molrp, None);
        assert!(s.report(false).contains("moLRP             = n/a"));
    }

    #[test]
    fn test_report_detail_levels() {
        let s = summary();
        let short = s.report(false);
        assert!(short.contains("moLRP             = 0.5000"));
        assert!(!short.contains("person"));
        assert_eq!(short, s.to_string());

        let detailed = s.report(true);
        assert!(detailed.contains("person"));
        assert!(detailed.contains("car"));
        assert!(detailed.contains("n/a"));
    }

    #[test]
    fn test_to_json() {
        let json = summary().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["num_evaluated_categories"], 2);
        assert_eq!(value["categories"][2]["olrp"], serde_json::Value::Null);
    }
}
