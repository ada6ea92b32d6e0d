//! Append-only run ledger shared by evaluation runs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::IoError;
use crate::publish::publish;

/// Sample lists longer than this are written to a side file.
const INLINE_SAMPLE_LIMIT: usize = 10;

/// A metric value in the ledger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    /// Integral count, written as is.
    Count(u64),
    /// Ratio or score, written with 4 decimals.
    Score(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Score(v) => write!(f, "{v:.4}"),
        }
    }
}

/// One run's line in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// Run identity.
    pub run_id: String,
    /// Samples the model was trained on.
    pub train_samples: Vec<String>,
    /// Samples the threshold was calibrated on.
    pub valid_samples: Vec<String>,
    /// Hyperparameter description.
    pub hyperparameters: String,
    /// Number of positive labels evaluated.
    pub n_true: usize,
    /// Number of negative labels evaluated.
    pub n_false: usize,
    /// Metrics, written in key order.
    pub metrics: BTreeMap<String, MetricValue>,
}

/// Appends tab-delimited records to a ledger file shared across runs.
///
/// Line layout: run id, train samples, valid samples, hyperparameters,
/// true and false label counts, then metric values in key order. A header
/// naming the columns is written when the file is created. Sample lists
/// with fewer than 10 entries are written inline, comma-separated;
/// longer lists are written one sample per line to `train_samples.txt` /
/// `valid_samples.txt` in the run directory and the ledger records the
/// file name.
pub struct RunLedger {
    path: PathBuf,
    run_dir: PathBuf,
}

impl RunLedger {
    /// Create a ledger appending to `path`, with side files in `run_dir`.
    pub fn new(path: &Path, run_dir: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            run_dir: run_dir.to_path_buf(),
        }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::OutputDirCreate`] | Ledger or run directory cannot be created |
    /// | [`IoError::WriteFile`] | Ledger or side file cannot be written |
    #[instrument(skip_all, fields(path = %self.path.display(), run_id = %entry.run_id))]
    pub fn append(&self, entry: &LedgerEntry) -> Result<(), IoError> {
        let train = self.sample_field(&entry.train_samples, "train_samples.txt")?;
        let valid = self.sample_field(&entry.valid_samples, "valid_samples.txt")?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| IoError::OutputDirCreate {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let is_new = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| IoError::write(&self.path, e))?;
        let mut out = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .from_writer(file);

        if is_new {
            let fixed = [
                "run_id",
                "train_samples",
                "valid_samples",
                "hyperparameters",
                "n_true",
                "n_false",
            ];
            let header = fixed
                .into_iter()
                .map(str::to_string)
                .chain(entry.metrics.keys().cloned());
            out.write_record(header)
                .map_err(|e| IoError::write(&self.path, e.into()))?;
        }
        let fields = [
            entry.run_id.clone(),
            train,
            valid,
            entry.hyperparameters.clone(),
            entry.n_true.to_string(),
            entry.n_false.to_string(),
        ]
        .into_iter()
        .chain(entry.metrics.values().map(ToString::to_string));
        out.write_record(fields)
            .map_err(|e| IoError::write(&self.path, e.into()))?;
        out.flush().map_err(|e| IoError::write(&self.path, e))?;
        info!(n_metrics = entry.metrics.len(), "ledger entry appended");
        Ok(())
    }

    fn sample_field(&self, samples: &[String], side_file: &str) -> Result<String, IoError> {
        if samples.len() < INLINE_SAMPLE_LIMIT {
            return Ok(samples.join(","));
        }
        let path = self.run_dir.join(side_file);
        publish(&path, |w| {
            for sample in samples {
                writeln!(w, "{sample}")?;
            }
            Ok(())
        })?;
        Ok(side_file.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(run_id: &str, n_train: usize) -> LedgerEntry {
        let mut metrics = BTreeMap::new();
        metrics.insert("AUROC".to_string(), MetricValue::Score(0.912_345));
        metrics.insert("TP".to_string(), MetricValue::Count(12));
        LedgerEntry {
            run_id: run_id.into(),
            train_samples: (0..n_train).map(|i| format!("T{i}")).collect(),
            valid_samples: vec!["V1".into()],
            hyperparameters: "n_estimators=500".into(),
            n_true: 12,
            n_false: 30,
            metrics,
        }
    }

    #[test]
    fn appends_header_once_and_formats_metrics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("all_runs_summary.tsv");
        let ledger = RunLedger::new(&path, dir.path());
        ledger.append(&entry("run1", 2)).unwrap();
        ledger.append(&entry("run2", 2)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "run_id\ttrain_samples\tvalid_samples\thyperparameters\tn_true\tn_false\tAUROC\tTP"
        );
        assert_eq!(lines[1], "run1\tT0,T1\tV1\tn_estimators=500\t12\t30\t0.9123\t12");
        assert!(lines[2].starts_with("run2\t"));
    }

    #[test]
    fn long_sample_lists_go_to_side_file() {
        let dir = TempDir::new().unwrap();
        let run_dir = dir.path().join("run");
        let ledger = RunLedger::new(&dir.path().join("ledger.tsv"), &run_dir);
        ledger.append(&entry("run1", 12)).unwrap();

        let text = std::fs::read_to_string(dir.path().join("ledger.tsv")).unwrap();
        assert!(text.lines().nth(1).unwrap().contains("\ttrain_samples.txt\tV1\t"));
        let side = std::fs::read_to_string(run_dir.join("train_samples.txt")).unwrap();
        assert_eq!(side.lines().count(), 12);
    }

    #[test]
    fn hyperparameters_with_tabs_stay_one_field() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.tsv");
        let mut odd = entry("run1", 1);
        odd.hyperparameters = "criterion=entropy\tmax_depth=None".into();
        let ledger = RunLedger::new(&path, dir.path());
        ledger.append(&odd).unwrap();
        ledger.append(&entry("run2", 1)).unwrap();

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .unwrap();
        assert_eq!(reader.headers().unwrap().len(), 8);
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][3], "criterion=entropy\tmax_depth=None");
        assert_eq!(&rows[1][0], "run2");
    }
}
