//! Binary classification report for a hold-out set.

use std::fmt;

use crate::error::ForestError;

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// Precision: TP / (TP + FP). 0.0 if nothing was predicted as this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if the class has no true samples.
    pub recall: f64,
    /// Harmonic mean of precision and recall. 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
        let support = tp + fn_;
        let recall = if support == 0 { 0.0 } else { tp as f64 / support as f64 };
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };
        Self {
            precision,
            recall,
            f1,
            support,
        }
    }
}

/// Per-class metrics for `false`/`true` labels plus overall accuracy.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Metrics treating `false` as the class of interest.
    pub negative: ClassMetrics,
    /// Metrics treating `true` as the class of interest.
    pub positive: ClassMetrics,
    /// Proportion of correct predictions.
    pub accuracy: f64,
}

impl ClassificationReport {
    /// Build a report from true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | zero labels provided |
    /// | [`ForestError::LabelCountMismatch`] | slices differ in length |
    pub fn from_labels(truth: &[bool], predicted: &[bool]) -> Result<Self, ForestError> {
        if truth.is_empty() {
            return Err(ForestError::EmptyDataset);
        }
        if truth.len() != predicted.len() {
            return Err(ForestError::LabelCountMismatch {
                n_rows: predicted.len(),
                n_labels: truth.len(),
            });
        }
        let (mut tp, mut fp, mut tn, mut fn_) = (0usize, 0usize, 0usize, 0usize);
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }
        Ok(Self {
            negative: ClassMetrics::from_counts(tn, fn_, fp),
            positive: ClassMetrics::from_counts(tp, fp, fn_),
            accuracy: (tp + tn) as f64 / truth.len() as f64,
        })
    }

    /// Unweighted mean of the two classes' metrics.
    #[must_use]
    pub fn macro_avg(&self) -> ClassMetrics {
        ClassMetrics {
            precision: (self.negative.precision + self.positive.precision) / 2.0,
            recall: (self.negative.recall + self.positive.recall) / 2.0,
            f1: (self.negative.f1 + self.positive.f1) / 2.0,
            support: self.negative.support + self.positive.support,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (name, m) in [("False", &self.negative), ("True", &self.positive)] {
            writeln!(
                f,
                "{name:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total = self.negative.support + self.positive.support;
        writeln!(f, "{:>12} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, total)?;
        let avg = self.macro_avg();
        writeln!(
            f,
            "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
            "macro avg", avg.precision, avg.recall, avg.f1, avg.support
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_counts() {
        // tp=2 fp=1 tn=3 fn=1
        let truth = [true, true, true, false, false, false, false];
        let predicted = [true, true, false, true, false, false, false];
        let report = ClassificationReport::from_labels(&truth, &predicted).unwrap();

        assert!((report.positive.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.positive.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.positive.support, 3);
        assert!((report.negative.precision - 3.0 / 4.0).abs() < 1e-12);
        assert!((report.negative.recall - 3.0 / 4.0).abs() < 1e-12);
        assert_eq!(report.negative.support, 4);
        assert!((report.accuracy - 5.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn no_positives_gives_zero_metrics() {
        let report = ClassificationReport::from_labels(&[false, false], &[false, false]).unwrap();
        assert_eq!(report.positive.support, 0);
        assert_eq!(report.positive.recall, 0.0);
        assert_eq!(report.positive.f1, 0.0);
        assert_eq!(report.accuracy, 1.0);
    }

    #[test]
    fn empty_labels_error() {
        assert!(matches!(
            ClassificationReport::from_labels(&[], &[]),
            Err(ForestError::EmptyDataset)
        ));
    }

    #[test]
    fn display_has_one_row_per_class() {
        let report = ClassificationReport::from_labels(&[true, false], &[true, true]).unwrap();
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("True"));
        assert!(text.contains("macro avg"));
    }
}
