//! Confusion counts, F-beta and ranking metrics for binary calls.

use serde::Serialize;

use crate::error::CalibrateError;

/// Confusion-matrix counts of a binary decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BinaryConfusion {
    /// Positives called positive.
    pub tp: usize,
    /// Negatives called positive.
    pub fp: usize,
    /// Negatives called negative.
    pub tn: usize,
    /// Positives called negative.
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl BinaryConfusion {
    /// Count outcomes of `predicted` against `truth`.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::LengthMismatch`] when the slices differ in length.
    pub fn from_predictions(truth: &[bool], predicted: &[bool]) -> Result<Self, CalibrateError> {
        check_lengths(truth.len(), predicted.len())?;
        let mut counts = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            counts.record(t, p);
        }
        Ok(counts)
    }

    /// Count outcomes of the decision `score > threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::LengthMismatch`] when the slices differ in length.
    pub fn at_threshold(truth: &[bool], scores: &[f64], threshold: f64) -> Result<Self, CalibrateError> {
        check_lengths(truth.len(), scores.len())?;
        let mut counts = Self::default();
        for (&t, &s) in truth.iter().zip(scores) {
            counts.record(t, s > threshold);
        }
        Ok(counts)
    }

    fn record(&mut self, truth: bool, called: bool) {
        match (truth, called) {
            (true, true) => self.tp += 1,
            (false, true) => self.fp += 1,
            (false, false) => self.tn += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    /// Number of decisions counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    /// TP / (TP + FP), 0.0 when nothing was called.
    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN), 0.0 when there are no positives.
    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Harmonic mean of precision and recall.
    #[must_use]
    pub fn f1(&self) -> f64 {
        self.fbeta(1.0)
    }

    /// `(1 + b²)·P·R / (b²·P + R)`, 0.0 when the denominator is zero.
    #[must_use]
    pub fn fbeta(&self, beta: f64) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        let b2 = beta * beta;
        let denominator = b2 * p + r;
        if denominator == 0.0 {
            0.0
        } else {
            (1.0 + b2) * p * r / denominator
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn check_lengths(n_truth: usize, n_scores: usize) -> Result<(), CalibrateError> {
    if n_truth == n_scores {
        Ok(())
    } else {
        Err(CalibrateError::LengthMismatch { n_truth, n_scores })
    }
}

fn require_both_classes(truth: &[bool], metric: &'static str) -> Result<usize, CalibrateError> {
    let n_positive = truth.iter().filter(|&&t| t).count();
    if n_positive == 0 || n_positive == truth.len() {
        return Err(CalibrateError::DegenerateMetric {
            metric,
            only: n_positive > 0,
        });
    }
    Ok(n_positive)
}

/// Area under the precision-recall curve as the step-wise sum
/// `Σ (Rₙ − Rₙ₋₁)·Pₙ` over distinct score thresholds, highest first.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`CalibrateError::LengthMismatch`] | slices differ in length |
/// | [`CalibrateError::DegenerateMetric`] | labels hold a single class (or none) |
pub fn average_precision(truth: &[bool], scores: &[f64]) -> Result<f64, CalibrateError> {
    check_lengths(truth.len(), scores.len())?;
    let n_positive = require_both_classes(truth, "average precision")?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut tp, mut fp) = (0usize, 0usize);
    let mut previous_recall = 0.0;
    let mut area = 0.0;
    let mut i = 0;
    while i < order.len() {
        let value = scores[order[i]];
        while i < order.len() && scores[order[i]] == value {
            if truth[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        let recall = tp as f64 / n_positive as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        area += (recall - previous_recall) * precision;
        previous_recall = recall;
    }
    Ok(area)
}

/// Area under the ROC curve via the rank-sum statistic, ties sharing their
/// average rank.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`CalibrateError::LengthMismatch`] | slices differ in length |
/// | [`CalibrateError::DegenerateMetric`] | labels hold a single class (or none) |
pub fn roc_auc(truth: &[bool], scores: &[f64]) -> Result<f64, CalibrateError> {
    check_lengths(truth.len(), scores.len())?;
    let n_positive = require_both_classes(truth, "ROC AUC")?;
    let n_negative = truth.len() - n_positive;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j share their mean
        let rank = (i + 1 + j) as f64 / 2.0;
        positive_rank_sum += rank * order[i..j].iter().filter(|&&k| truth[k]).count() as f64;
        i = j;
    }
    let u = positive_rank_sum - (n_positive * (n_positive + 1)) as f64 / 2.0;
    Ok(u / (n_positive * n_negative) as f64)
}
