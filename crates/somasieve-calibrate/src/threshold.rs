//! F-beta threshold sweep on a labeled validation set.

use serde::Serialize;
use somasieve_io::{MergedRecord, ModelName, ThresholdTable, VariantClass};
use tracing::{info, instrument, warn};

use crate::error::CalibrateError;
use crate::metrics::BinaryConfusion;

/// Swept thresholds are rounded to this many decimals so that index-based
/// enumeration yields exactly `0.001, 0.002, ...`.
const THRESHOLD_DECIMALS: i32 = 12;

/// The thresholds to try and the F-beta weight to score them with.
///
/// # Defaults
///
/// | Parameter | Default |
/// |-----------|---------|
/// | `start`   | 0.001   |
/// | `end`     | 0.050 (inclusive) |
/// | `step`    | 0.001   |
/// | `beta`    | 5.0     |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThresholdSweep {
    start: f64,
    end: f64,
    step: f64,
    beta: f64,
}

impl Default for ThresholdSweep {
    fn default() -> Self {
        Self {
            start: 0.001,
            end: 0.050,
            step: 0.001,
            beta: 5.0,
        }
    }
}

impl ThresholdSweep {
    /// Sweep with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the threshold range.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::InvalidSweep`] unless
    /// `0 < start <= end < 1` and `step > 0`, all finite.
    pub fn with_range(mut self, start: f64, end: f64, step: f64) -> Result<Self, CalibrateError> {
        self.start = start;
        self.end = end;
        self.step = step;
        self.validate()?;
        Ok(self)
    }

    /// Replace the F-beta weight.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::InvalidBeta`] for non-positive or non-finite values.
    pub fn with_beta(mut self, beta: f64) -> Result<Self, CalibrateError> {
        self.beta = beta;
        self.validate()?;
        Ok(self)
    }

    /// Check a deserialized sweep.
    ///
    /// # Errors
    ///
    /// As for [`with_range`](Self::with_range) and [`with_beta`](Self::with_beta).
    pub fn validate(&self) -> Result<(), CalibrateError> {
        let (start, end, step) = (self.start, self.end, self.step);
        let finite = start.is_finite() && end.is_finite() && step.is_finite();
        if !finite || start <= 0.0 || end >= 1.0 || start > end || step <= 0.0 {
            return Err(CalibrateError::InvalidSweep { start, end, step });
        }
        if !(self.beta.is_finite() && self.beta > 0.0) {
            return Err(CalibrateError::InvalidBeta { beta: self.beta });
        }
        Ok(())
    }

    /// F-beta weight.
    #[must_use]
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Smallest swept threshold, used when nothing beats zero.
    #[must_use]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Thresholds in ascending order, `end` included.
    #[must_use]
    pub fn thresholds(&self) -> Vec<f64> {
        let scale = 10f64.powi(THRESHOLD_DECIMALS);
        // tolerate float error in (end - start) / step
        let n = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..n)
            .map(|i| ((self.start + i as f64 * self.step) * scale).round() / scale)
            .collect()
    }
}

/// F-beta at one swept threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    /// Threshold tried.
    pub threshold: f64,
    /// F-beta of `score > threshold`.
    pub fbeta: f64,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    /// Selected threshold.
    pub threshold: f64,
    /// F-beta at the selected threshold.
    pub fbeta: f64,
    /// Every swept point, ascending.
    pub curve: Vec<SweepPoint>,
}

/// Picks the swept threshold maximizing F-beta.
///
/// The first maximum wins, so ties resolve to the smallest threshold.
/// Validation sets holding a single class (or nothing) score 0 at every
/// threshold and calibrate to the smallest swept value.
#[derive(Debug, Clone, Default)]
pub struct ThresholdCalibrator {
    sweep: ThresholdSweep,
}

impl ThresholdCalibrator {
    /// Calibrator over `sweep`.
    #[must_use]
    pub fn new(sweep: ThresholdSweep) -> Self {
        Self { sweep }
    }

    /// The sweep in use.
    #[must_use]
    pub fn sweep(&self) -> &ThresholdSweep {
        &self.sweep
    }

    /// Sweep over parallel truth/score slices.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::LengthMismatch`] when the slices differ in length.
    pub fn calibrate(&self, truth: &[bool], scores: &[f64]) -> Result<Calibration, CalibrateError> {
        if truth.len() != scores.len() {
            return Err(CalibrateError::LengthMismatch {
                n_truth: truth.len(),
                n_scores: scores.len(),
            });
        }
        let n_positive = truth.iter().filter(|&&t| t).count();
        let degenerate = n_positive == 0 || n_positive == truth.len();
        if degenerate {
            warn!(
                n_records = truth.len(),
                n_positive, "single-class validation set, every threshold scores 0"
            );
        }

        let mut curve = Vec::new();
        for threshold in self.sweep.thresholds() {
            let fbeta = if degenerate {
                0.0
            } else {
                BinaryConfusion::at_threshold(truth, scores, threshold)?.fbeta(self.sweep.beta)
            };
            curve.push(SweepPoint { threshold, fbeta });
        }

        let mut best = SweepPoint {
            threshold: self.sweep.start,
            fbeta: 0.0,
        };
        for point in &curve {
            if point.fbeta > best.fbeta {
                best = *point;
            }
        }
        Ok(Calibration {
            threshold: best.threshold,
            fbeta: best.fbeta,
            curve,
        })
    }

    /// Sweep over labeled records; unlabeled records count as negatives.
    ///
    /// # Errors
    ///
    /// See [`calibrate`](Self::calibrate).
    pub fn calibrate_records(&self, records: &[MergedRecord]) -> Result<Calibration, CalibrateError> {
        let truth: Vec<bool> = records.iter().map(MergedRecord::is_positive).collect();
        let scores: Vec<f64> = records.iter().map(|r| r.score).collect();
        self.calibrate(&truth, &scores)
    }

    /// Calibrate on `records` and store the result for `(model, class)`.
    ///
    /// The table is updated in memory only; the caller saves it.
    ///
    /// # Errors
    ///
    /// See [`calibrate`](Self::calibrate); also [`somasieve_io::IoError::InvalidThreshold`].
    #[instrument(skip_all, fields(%model, %class, n_records = records.len()))]
    pub fn calibrate_into(
        &self,
        records: &[MergedRecord],
        table: &mut ThresholdTable,
        model: &ModelName,
        class: VariantClass,
    ) -> Result<Calibration, CalibrateError> {
        let calibration = self.calibrate_records(records)?;
        let previous = table.set(model, class, calibration.threshold)?;
        info!(
            threshold = calibration.threshold,
            fbeta = calibration.fbeta,
            previous = ?previous,
            "threshold calibrated"
        );
        Ok(calibration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sweep_enumerates_fifty_exact_thresholds() {
        let t = ThresholdSweep::new().thresholds();
        assert_eq!(t.len(), 50);
        assert_eq!(t[0], 0.001);
        assert_eq!(t[26], 0.027);
        assert_eq!(t[49], 0.05);
    }

    #[test]
    fn invalid_sweeps_rejected() {
        assert!(ThresholdSweep::new().with_range(0.0, 0.05, 0.001).is_err());
        assert!(ThresholdSweep::new().with_range(0.05, 0.01, 0.001).is_err());
        assert!(ThresholdSweep::new().with_range(0.01, 0.05, 0.0).is_err());
        assert!(matches!(
            ThresholdSweep::new().with_beta(-1.0),
            Err(CalibrateError::InvalidBeta { .. })
        ));
    }

    #[test]
    fn picks_separating_threshold() {
        let truth = [true, true, false, false, false];
        let scores = [0.04, 0.03, 0.02, 0.01, 0.005];
        let c = ThresholdCalibrator::default().calibrate(&truth, &scores).unwrap();
        // 0.020 up to 0.029 all separate perfectly; the first wins
        assert_eq!(c.threshold, 0.02);
        assert!((c.fbeta - 1.0).abs() < 1e-12);
        assert!(c.curve.iter().all(|p| p.fbeta <= c.fbeta));
    }

    #[test]
    fn only_negatives_scores_zero_everywhere() {
        let truth = [false; 4];
        let scores = [0.9, 0.5, 0.02, 0.0];
        let c = ThresholdCalibrator::default().calibrate(&truth, &scores).unwrap();
        assert_eq!(c.threshold, 0.001);
        assert_eq!(c.fbeta, 0.0);
        assert!(c.curve.iter().all(|p| p.fbeta == 0.0));
    }

    #[test]
    fn calibration_is_deterministic() {
        let truth = [true, false, true, false, true, false];
        let scores = [0.012, 0.011, 0.3, 0.045, 0.002, 0.0];
        let calibrator = ThresholdCalibrator::default();
        let a = calibrator.calibrate(&truth, &scores).unwrap();
        let b = calibrator.calibrate(&truth, &scores).unwrap();
        assert_eq!(a, b);
    }
}
