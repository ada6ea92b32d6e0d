//! Evaluation summaries and the per-partition metrics table.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use somasieve_io::{LedgerEntry, MergedRecord, MetricValue, RunLedger};
use tracing::{info, instrument, warn};

use crate::error::CalibrateError;
use crate::metrics::{BinaryConfusion, average_precision, roc_auc};

/// Reported in place of a ranking metric that is undefined for the labels.
pub const DEGENERATE_METRIC: f64 = -1.0;

/// Called-set quality of one partition at its operating threshold.
///
/// Built from the records' `call` flags, so it reflects thresholding and
/// any filtering already applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdMetrics {
    /// Threshold the calls were made at.
    pub threshold: f64,
    /// Records evaluated.
    pub n_records: usize,
    /// Records called.
    pub n_called: usize,
    /// Records labeled positive.
    pub n_true: usize,
    /// Confusion counts of the calls.
    pub confusion: BinaryConfusion,
    /// F-beta weight used for `fbeta`.
    pub beta: f64,
}

impl ThresholdMetrics {
    /// Tabulate the calls in `records`.
    #[must_use]
    pub fn from_records(records: &[MergedRecord], threshold: f64, beta: f64) -> Self {
        let mut confusion = BinaryConfusion::default();
        for r in records {
            match (r.is_positive(), r.call) {
                (true, true) => confusion.tp += 1,
                (false, true) => confusion.fp += 1,
                (false, false) => confusion.tn += 1,
                (true, false) => confusion.fn_ += 1,
            }
        }
        Self {
            threshold,
            n_records: records.len(),
            n_called: confusion.tp + confusion.fp,
            n_true: confusion.tp + confusion.fn_,
            confusion,
            beta,
        }
    }

    /// F-beta of the calls.
    #[must_use]
    pub fn fbeta(&self) -> f64 {
        self.confusion.fbeta(self.beta)
    }

    /// Column names matching the [`Display`](fmt::Display) layout.
    #[must_use]
    pub fn header() -> String {
        format!(
            "{:>7} {:>7} {:>7} {:>6} {:>6} {:>6} {:>5} {:>5} {:>5} {:>8}",
            "thresh", "n", "called", "true", "tp", "fn", "prec", "rec", "f1", "fbeta"
        )
    }
}

impl fmt::Display for ThresholdMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.confusion;
        write!(
            f,
            "{:>7.4} {:>7} {:>7} {:>6} {:>6} {:>6} {:>5.3} {:>5.3} {:>5.3} {:>8.6}",
            self.threshold,
            self.n_records,
            self.n_called,
            self.n_true,
            c.tp,
            c.fn_,
            c.precision(),
            c.recall(),
            c.f1(),
            self.fbeta()
        )
    }
}

/// Run-level evaluation of scores against labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Positive labels.
    pub n_true: usize,
    /// Negative labels.
    pub n_false: usize,
    /// Confusion counts at `score > 0`.
    pub confusion: BinaryConfusion,
    /// Precision at `score > 0`.
    pub precision: f64,
    /// Recall at `score > 0`.
    pub recall: f64,
    /// F1 at `score > 0`.
    pub f1: f64,
    /// Average precision, [`DEGENERATE_METRIC`] on single-class labels.
    pub auprc: f64,
    /// ROC AUC, [`DEGENERATE_METRIC`] on single-class labels.
    pub auroc: f64,
}

impl EvaluationSummary {
    /// Ledger metric columns.
    #[must_use]
    pub fn metrics(&self) -> BTreeMap<String, MetricValue> {
        let c = &self.confusion;
        let count = |n: usize| MetricValue::Count(n as u64);
        BTreeMap::from([
            ("Precision".to_string(), MetricValue::Score(self.precision)),
            ("Recall".to_string(), MetricValue::Score(self.recall)),
            ("F1".to_string(), MetricValue::Score(self.f1)),
            ("TN".to_string(), count(c.tn)),
            ("FP".to_string(), count(c.fp)),
            ("FN".to_string(), count(c.fn_)),
            ("TP".to_string(), count(c.tp)),
            ("All".to_string(), count(c.total())),
            ("AUPRC".to_string(), MetricValue::Score(self.auprc)),
            ("AUROC".to_string(), MetricValue::Score(self.auroc)),
        ])
    }
}

/// Summarizes a scored record stream and appends it to the run ledger.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReporter {
    run_id: String,
    train_samples: Vec<String>,
    valid_samples: Vec<String>,
    hyperparameters: String,
}

impl EvaluationReporter {
    /// Reporter for the run `run_id`.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    /// Record the samples the scorer was trained and calibrated on.
    #[must_use]
    pub fn with_partitions(mut self, train: Vec<String>, valid: Vec<String>) -> Self {
        self.train_samples = train;
        self.valid_samples = valid;
        self
    }

    /// Record the scorer's hyperparameters.
    #[must_use]
    pub fn with_hyperparameters(mut self, hyperparameters: impl Into<String>) -> Self {
        self.hyperparameters = hyperparameters.into();
        self
    }

    /// Compute the summary; unlabeled records count as negatives.
    ///
    /// Ranking metrics undefined for the labels are logged and reported as
    /// [`DEGENERATE_METRIC`].
    ///
    /// # Errors
    ///
    /// Never in practice: truth and scores are built from the same records.
    pub fn summarize(&self, records: &[MergedRecord]) -> Result<EvaluationSummary, CalibrateError> {
        let truth: Vec<bool> = records.iter().map(MergedRecord::is_positive).collect();
        let scores: Vec<f64> = records.iter().map(|r| r.score).collect();
        let confusion = BinaryConfusion::at_threshold(&truth, &scores, 0.0)?;
        let n_true = confusion.tp + confusion.fn_;

        Ok(EvaluationSummary {
            n_true,
            n_false: records.len() - n_true,
            confusion,
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            auprc: recover(average_precision(&truth, &scores))?,
            auroc: recover(roc_auc(&truth, &scores))?,
        })
    }

    /// Ledger line for `summary`.
    #[must_use]
    pub fn ledger_entry(&self, summary: &EvaluationSummary) -> LedgerEntry {
        LedgerEntry {
            run_id: self.run_id.clone(),
            train_samples: self.train_samples.clone(),
            valid_samples: self.valid_samples.clone(),
            hyperparameters: self.hyperparameters.clone(),
            n_true: summary.n_true,
            n_false: summary.n_false,
            metrics: summary.metrics(),
        }
    }

    /// Summarize `records` and append the result to `ledger`.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::Io`] when the ledger cannot be written.
    #[instrument(skip_all, fields(run_id = %self.run_id, n_records = records.len()))]
    pub fn report(
        &self,
        records: &[MergedRecord],
        ledger: &RunLedger,
    ) -> Result<EvaluationSummary, CalibrateError> {
        let summary = self.summarize(records)?;
        ledger.append(&self.ledger_entry(&summary))?;
        info!(
            n_true = summary.n_true,
            n_false = summary.n_false,
            precision = summary.precision,
            recall = summary.recall,
            auprc = summary.auprc,
            auroc = summary.auroc,
            "evaluation summary"
        );
        Ok(summary)
    }
}

fn recover(metric: Result<f64, CalibrateError>) -> Result<f64, CalibrateError> {
    match metric {
        Err(e @ CalibrateError::DegenerateMetric { .. }) => {
            warn!(error = %e, "ranking metric reported as {DEGENERATE_METRIC}");
            Ok(DEGENERATE_METRIC)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use somasieve_io::{FilterTag, Locus};
    use tempfile::TempDir;

    fn scored(pos: u64, label: bool, score: f64) -> MergedRecord {
        MergedRecord {
            locus: Locus {
                sample: "S1".into(),
                chrom: "chr1".into(),
                pos,
                ref_allele: "A".into(),
                alt_allele: "G".into(),
            },
            replicate: None,
            tag: Some(FilterTag::new(if label { "somatic" } else { "SNP" })),
            label: Some(label),
            score,
            call: false,
            evidence: None,
        }
    }

    #[test]
    fn summary_at_zero_cutoff() {
        let records = vec![
            scored(1, false, 0.1),
            scored(2, false, 0.4),
            scored(3, true, 0.35),
            scored(4, true, 0.8),
            scored(5, true, -1.00001),
        ];
        let s = EvaluationReporter::new("r").summarize(&records).unwrap();
        assert_eq!((s.n_true, s.n_false), (3, 2));
        assert_eq!(s.confusion, BinaryConfusion { tp: 2, fp: 2, tn: 0, fn_: 1 });
        assert!((s.precision - 0.5).abs() < 1e-12);
        assert!((s.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!(s.auroc > 0.0 && s.auprc > 0.0);
    }

    #[test]
    fn single_class_degrades_ranking_metrics() {
        let records = vec![scored(1, false, 0.1), scored(2, false, 0.0)];
        let s = EvaluationReporter::new("r").summarize(&records).unwrap();
        assert_eq!(s.auprc, DEGENERATE_METRIC);
        assert_eq!(s.auroc, DEGENERATE_METRIC);
        assert_eq!(s.precision, 0.0);
        assert_eq!(s.recall, 0.0);
    }

    #[test]
    fn report_appends_ledger_line() {
        let dir = TempDir::new().unwrap();
        let ledger = RunLedger::new(&dir.path().join("ledger.tsv"), dir.path());
        let reporter = EvaluationReporter::new("run7")
            .with_partitions(vec!["T1".into()], vec!["V1".into(), "V2".into()])
            .with_hyperparameters("n_estimators=500");
        reporter
            .report(&[scored(1, true, 0.9), scored(2, false, 0.0)], &ledger)
            .unwrap();

        let text = std::fs::read_to_string(dir.path().join("ledger.tsv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "run_id\ttrain_samples\tvalid_samples\thyperparameters\tn_true\tn_false\t\
             AUPRC\tAUROC\tAll\tF1\tFN\tFP\tPrecision\tRecall\tTN\tTP"
        );
        assert_eq!(
            lines[1],
            "run7\tT1\tV1,V2\tn_estimators=500\t1\t1\t1.0000\t1.0000\t2\t1.0000\t0\t0\t1.0000\t1.0000\t1\t1"
        );
    }

    #[test]
    fn metrics_table_row_layout() {
        let mut records = vec![scored(1, true, 0.9), scored(2, false, 0.02), scored(3, true, 0.01)];
        for r in &mut records {
            r.call = r.score > 0.015;
        }
        let m = ThresholdMetrics::from_records(&records, 0.015, 5.0);
        assert_eq!((m.n_records, m.n_called, m.n_true), (3, 2, 2));
        let row = m.to_string();
        assert_eq!(row.split_whitespace().count(), 10);
        assert_eq!(ThresholdMetrics::header().split_whitespace().count(), 10);
    }
}
