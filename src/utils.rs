//! Utility functions for lrp-eval.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::OnceLock;

use log::warn;

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Log a warning message only once per process.
///
/// Subsequent calls with the same message are ignored.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    if let Ok(mut guard) = warned.lock() {
        if guard.insert(message.to_string()) {
            warn!("{}", message);
        }
    }
}

/// Evenly spaced thresholds from `start` to `end` inclusive, rounded to
/// `decimals` places so that e.g. `0.07` is exactly `0.07`.
///
/// # Arguments
/// * `start` - First threshold
/// * `end` - Last threshold
/// * `step` - Spacing between thresholds (must be positive)
/// * `decimals` - Rounding precision
pub fn linspace_thresholds(start: f64, end: f64, step: f64, decimals: i32) -> Vec<f64> {
    if !(step > 0.0) || end < start {
        return vec![start];
    }
    let count = ((end - start) / step).round() as usize + 1;
    let scale = 10f64.powi(decimals);
    (0..count)
        .map(|i| {
            let t = start + (end - start) * i as f64 / (count - 1).max(1) as f64;
            (t * scale).round() / scale
        })
        .collect()
}

/// Mean of the values, `None` for an empty input.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Mean of the defined (`Some`) values only.
pub fn mean_defined<I: IntoIterator<Item = Option<f64>>>(values: I) -> Option<f64> {
    mean(values.into_iter().flatten())
}

/// Check that a slice is strictly increasing.
pub fn is_strictly_increasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] < w[1])
}
