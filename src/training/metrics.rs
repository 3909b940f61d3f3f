//! Binary classification metrics logged for every candidate
//!
//! Conventions: class 1 is positive; precision, recall and f1 are 0.0 when
//! their denominator is zero; ROC AUC is the Mann-Whitney statistic with tied
//! scores counted as one half, and 0.5 when `y_true` holds a single class.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Names of the metrics logged on every candidate run.
pub const METRIC_NAMES: [&str; 5] = ["accuracy", "precision", "recall", "f1", "roc_auc"];

/// Default ranking metric.
pub const DEFAULT_RANKING_METRIC: &str = "f1";

/// The fixed metric set of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Fraction of correct labels
    pub accuracy: f64,
    /// TP / (TP + FP)
    pub precision: f64,
    /// TP / (TP + FN)
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Area under the ROC curve
    pub roc_auc: f64,
}

impl MetricSet {
    /// `(name, value)` pairs in [`METRIC_NAMES`] order.
    #[must_use]
    pub const fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1),
            ("roc_auc", self.roc_auc),
        ]
    }
}

/// Whether `name` is one of the logged metrics.
#[must_use]
pub fn is_known_metric(name: &str) -> bool {
    METRIC_NAMES.contains(&name)
}

/// Compute the metric set.
///
/// # Errors
///
/// Returns `InvalidInput` if the slices are empty or differ in length.
#[allow(clippy::cast_precision_loss)]
pub fn compute_metrics(y_true: &[u8], y_pred: &[u8], y_proba: &[f64]) -> Result<MetricSet> {
    if y_true.is_empty() || y_true.len() != y_pred.len() || y_true.len() != y_proba.len() {
        return Err(Error::InvalidInput(format!(
            "metric inputs must be non-empty and aligned (true={}, pred={}, proba={})",
            y_true.len(),
            y_pred.len(),
            y_proba.len()
        )));
    }

    let (mut tp, mut fp, mut fn_, mut tn) = (0usize, 0usize, 0usize, 0usize);
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == 1, p == 1) {
            (true, true) => tp += 1,
            (false, true) => fp += 1,
            (true, false) => fn_ += 1,
            (false, false) => tn += 1,
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Ok(MetricSet {
        accuracy: ratio(tp + tn, y_true.len()),
        precision,
        recall,
        f1,
        roc_auc: roc_auc(y_true, y_proba),
    })
}

#[allow(clippy::cast_precision_loss)]
fn roc_auc(y_true: &[u8], y_proba: &[f64]) -> f64 {
    let n_pos = y_true.iter().filter(|&&y| y == 1).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..y_proba.len()).collect();
    order.sort_by(|&a, &b| y_proba[a].total_cmp(&y_proba[b]));

    // Average 1-based ranks over runs of tied scores.
    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && y_proba[order[end]] == y_proba[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives_in_run = order[start..end].iter().filter(|&&i| y_true[i] == 1).count();
        rank_sum_pos += avg_rank * positives_in_run as f64;
        start = end;
    }

    let (p, n) = (n_pos as f64, n_neg as f64);
    (rank_sum_pos - p * (p + 1.0) / 2.0) / (p * n)
}
