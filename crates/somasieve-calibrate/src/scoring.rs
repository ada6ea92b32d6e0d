//! Scoring merged records and turning scores into binary calls.

use rayon::prelude::*;
use somasieve_forest::Forest;
use somasieve_io::{EvidenceFeature, MergedRecord};
use tracing::{debug, instrument};

use crate::error::CalibrateError;

/// Rows per parallel scoring chunk.
const CHUNK: usize = 4096;

/// Anything that maps evidence rows to positive-class scores.
pub trait Scorer: Sync {
    /// One score per row, in row order.
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn score_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, CalibrateError>;
}

impl Scorer for Forest {
    fn score_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, CalibrateError> {
        Ok(self.predict_proba_batch(rows)?)
    }
}

/// Assign a score to every record from its evidence on `features`.
///
/// Records without evidence are scored on the imputed sentinels.
///
/// # Errors
///
/// Propagates scorer failures, e.g. a feature-count mismatch.
#[instrument(skip_all, fields(n_records = records.len(), n_features = features.len()))]
pub fn score_records<S: Scorer + ?Sized>(
    scorer: &S,
    records: &mut [MergedRecord],
    features: &[EvidenceFeature],
) -> Result<(), CalibrateError> {
    records
        .par_chunks_mut(CHUNK)
        .try_for_each(|chunk| -> Result<(), CalibrateError> {
            let rows: Vec<Vec<f64>> = chunk.iter().map(|r| r.feature_row(features)).collect();
            let scores = scorer.score_rows(&rows)?;
            if scores.len() != rows.len() {
                return Err(CalibrateError::LengthMismatch {
                    n_truth: rows.len(),
                    n_scores: scores.len(),
                });
            }
            for (record, score) in chunk.iter_mut().zip(scores) {
                record.score = score;
            }
            Ok(())
        })?;
    debug!("records scored");
    Ok(())
}

/// Set `call = score > threshold` on every record; returns the number called.
pub fn apply_threshold(records: &mut [MergedRecord], threshold: f64) -> usize {
    let mut n_called = 0;
    for record in records.iter_mut() {
        record.call = record.score > threshold;
        n_called += usize::from(record.call);
    }
    debug!(threshold, n_called, n_records = records.len(), "threshold applied");
    n_called
}
