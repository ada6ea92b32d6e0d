//! Error types for somasieve-calibrate.

use somasieve_forest::ForestError;
use somasieve_io::IoError;

/// Errors from scoring, threshold calibration, filtering, training and
/// evaluation.
#[derive(Debug, thiserror::Error)]
pub enum CalibrateError {
    /// Returned when the sweep range or step is unusable.
    #[error("invalid threshold sweep: start {start}, end {end}, step {step}")]
    InvalidSweep {
        /// First swept threshold.
        start: f64,
        /// Last swept threshold (inclusive).
        end: f64,
        /// Distance between thresholds.
        step: f64,
    },

    /// Returned when the F-beta weight is not a positive finite number.
    #[error("beta must be positive and finite, got {beta}")]
    InvalidBeta {
        /// The invalid beta.
        beta: f64,
    },

    /// Returned when the hold-out proportion is outside (0, 1).
    #[error("hold-out fraction must be in (0, 1), got {fraction}")]
    InvalidHoldout {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when truth and score/prediction slices differ in length.
    #[error("length mismatch: {n_truth} labels but {n_scores} scores")]
    LengthMismatch {
        /// Number of labels.
        n_truth: usize,
        /// Number of scores or predictions.
        n_scores: usize,
    },

    /// Returned when a ranking metric is computed on single-class labels.
    ///
    /// The evaluation reporter recovers from this by reporting -1.
    #[error("{metric} is undefined when every label is {only}")]
    DegenerateMetric {
        /// Metric name.
        metric: &'static str,
        /// The single label value present.
        only: bool,
    },

    /// Returned when filtering leaves nothing to write.
    #[error("all {class} candidates for model {model} were filtered out")]
    EmptyResult {
        /// Model identity.
        model: String,
        /// Variant class.
        class: String,
    },

    /// Returned when a training set has no records.
    #[error("no {partition} records for model {model} ({class})")]
    EmptyTrainingSet {
        /// Model identity.
        model: String,
        /// Variant class.
        class: String,
        /// Partition name.
        partition: &'static str,
    },

    /// Classifier failure.
    #[error(transparent)]
    Forest(#[from] ForestError),

    /// Table or artifact failure.
    #[error(transparent)]
    Io(#[from] IoError),
}

impl CalibrateError {
    /// `true` for an absent model or threshold artifact.
    #[must_use]
    pub fn is_missing_artifact(&self) -> bool {
        match self {
            Self::Forest(e) => e.is_missing_file(),
            Self::Io(e) => matches!(
                e,
                IoError::MissingArtifact { .. } | IoError::MissingThreshold { .. }
            ),
            _ => false,
        }
    }
}
