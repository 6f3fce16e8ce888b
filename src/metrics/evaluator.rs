//! Evaluation driver: evaluate, accumulate, summarize.

use std::time::Instant;

use log::{info, warn};

use super::evaluation::ALL_CATEGORIES;
use super::{evaluate_image, ImageEvaluation, LrpAccumulator, LrpParams, LrpSummary};
use crate::dataset::{CategoryId, CocoDataset, ImageId};
use crate::{Error, Result};

/// LRP evaluation of a results dataset against its ground truth.
///
/// The three stages must run in order: [`evaluate`](Self::evaluate),
/// [`accumulate`](Self::accumulate), then [`summarize`](Self::summarize).
/// Re-running `evaluate` discards an earlier accumulation.
#[derive(Debug)]
pub struct LrpEvaluator<'a> {
    gt: &'a CocoDataset,
    dt: &'a CocoDataset,
    params: LrpParams,
    image_ids: Vec<ImageId>,
    category_ids: Vec<CategoryId>,
    evaluations: Option<Vec<ImageEvaluation>>,
    accumulation: Option<LrpAccumulator>,
}

impl<'a> LrpEvaluator<'a> {
    /// Create an evaluator with default parameters and the given IoU threshold.
    pub fn new(gt: &'a CocoDataset, dt: &'a CocoDataset, tau: f64) -> Result<Self> {
        Self::with_params(gt, dt, LrpParams::with_tau(tau))
    }

    /// Create an evaluator with explicit parameters.
    pub fn with_params(gt: &'a CocoDataset, dt: &'a CocoDataset, params: LrpParams) -> Result<Self> {
        params.validate()?;

        let image_ids = if params.image_ids.is_empty() {
            gt.image_ids()
        } else {
            sorted_unique(&params.image_ids)
        };
        let unknown = image_ids.iter().filter(|&&id| gt.image(id).is_none()).count();
        if unknown > 0 {
            warn!("{} requested image ids are not in the ground truth", unknown);
        }

        let category_ids = if !params.use_categories {
            vec![ALL_CATEGORIES]
        } else if params.category_ids.is_empty() {
            gt.category_ids()
        } else {
            sorted_unique(&params.category_ids)
        };

        Ok(Self {
            gt,
            dt,
            params,
            image_ids,
            category_ids,
            evaluations: None,
            accumulation: None,
        })
    }

    pub fn params(&self) -> &LrpParams {
        &self.params
    }

    /// Images taking part in the evaluation, ascending.
    pub fn image_ids(&self) -> &[ImageId] {
        &self.image_ids
    }

    /// Categories taking part in the evaluation, ascending.
    pub fn category_ids(&self) -> &[CategoryId] {
        &self.category_ids
    }

    /// Per image/category matches, available after `evaluate`.
    pub fn image_evaluations(&self) -> Option<&[ImageEvaluation]> {
        self.evaluations.as_deref()
    }

    /// Accumulated curves, available after `accumulate`.
    pub fn accumulation(&self) -> Option<&LrpAccumulator> {
        self.accumulation.as_ref()
    }

    /// Match detections to ground truth on every image and category.
    ///
    /// Fails with `Error::InvalidConfig` when there is no image or no
    /// category to evaluate.
    pub fn evaluate(&mut self) -> Result<&[ImageEvaluation]> {
        if self.image_ids.is_empty() {
            return Err(Error::InvalidConfig("no images to evaluate".to_string()));
        }
        if self.category_ids.is_empty() {
            return Err(Error::InvalidConfig("no categories to evaluate".to_string()));
        }

        let start = Instant::now();
        info!(
            "evaluating {} images x {} categories (tau = {})",
            self.image_ids.len(),
            self.category_ids.len(),
            self.params.tau
        );

        let mut evaluations = Vec::new();
        for &cat in &self.category_ids {
            for &img in &self.image_ids {
                if let Some(eval) = evaluate_image(self.gt, self.dt, img, cat, &self.params) {
                    evaluations.push(eval);
                }
            }
        }

        info!(
            "evaluate done: {} image/category pairs in {:.2?}",
            evaluations.len(),
            start.elapsed()
        );
        self.accumulation = None;
        Ok(self.evaluations.insert(evaluations).as_slice())
    }

    /// Build per-category LRP curves from the image evaluations.
    pub fn accumulate(&mut self) -> Result<&LrpAccumulator> {
        let evaluations = self.evaluations.as_deref().ok_or(Error::NotEvaluated)?;

        let start = Instant::now();
        let acc = LrpAccumulator::accumulate(evaluations, &self.category_ids, &self.params);
        info!(
            "accumulate done: {} of {} categories with ground truth in {:.2?}",
            acc.num_evaluated_categories(),
            self.category_ids.len(),
            start.elapsed()
        );
        Ok(self.accumulation.insert(acc))
    }

    /// Compute and log summary metrics.
    ///
    /// # Arguments
    /// * `detailed` - Also log the per-category table
    pub fn summarize(&self, detailed: bool) -> Result<LrpSummary> {
        let acc = self.accumulation.as_ref().ok_or(Error::NotAccumulated)?;
        let summary = LrpSummary::from_accumulator(acc, self.gt);
        info!("\n{}", summary.report(detailed));
        Ok(summary)
    }

    /// Run all three stages.
    pub fn run(&mut self, detailed: bool) -> Result<LrpSummary> {
        self.evaluate()?;
        self.accumulate()?;
        self.summarize(detailed)
    }
}

fn sorted_unique<T: Ord + Copy>(ids: &[T]) -> Vec<T> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}
