//! Scoring, threshold calibration, call filtering and evaluation.
//!
//! A [`ModelTrainer`] fits one forest per model identity and variant class;
//! [`score_records`] and [`apply_threshold`] turn its probabilities into
//! calls; the [`ThresholdCalibrator`] picks the F-beta-optimal threshold on a
//! validation set; the [`CallFilter`] drops biologically implausible calls;
//! the [`EvaluationReporter`] summarizes scores against labels into the run
//! ledger.

mod call_filter;
mod error;
mod metrics;
mod report;
mod scoring;
mod threshold;
mod trainer;

pub use call_filter::{CallFilter, FilterCounts};
pub use error::CalibrateError;
pub use metrics::{BinaryConfusion, average_precision, roc_auc};
pub use report::{DEGENERATE_METRIC, EvaluationReporter, EvaluationSummary, ThresholdMetrics};
pub use scoring::{Scorer, apply_threshold, score_records};
pub use threshold::{Calibration, SweepPoint, ThresholdCalibrator, ThresholdSweep};
pub use trainer::{ModelTrainer, TrainedModel, default_grid};
