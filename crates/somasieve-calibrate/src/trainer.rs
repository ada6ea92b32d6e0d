//! Grid-searched model fitting for one variant class.

use somasieve_forest::{
    ClassificationReport, FeatureImportances, Forest, GridSearch, Hyperparameters, MaxFeatures,
    ParamGrid, ParamSpace, SplitCriterion, train_test_split,
};
use somasieve_io::{MergedRecord, ModelName, VariantClass};
use tracing::{info, instrument};

use crate::error::CalibrateError;

/// Default search grid for a variant class.
///
/// Point mutations get larger, deeper ensembles than indels; both search
/// entropy splits over `sqrt`/`log2` feature sampling with and without
/// bootstrap.
#[must_use]
pub fn default_grid(class: VariantClass) -> ParamGrid {
    let space = |n_estimators: [usize; 2], max_depth: [usize; 2]| ParamSpace {
        n_estimators: n_estimators.to_vec(),
        max_depth: max_depth.iter().map(|&d| Some(d)).collect(),
        criterion: vec![SplitCriterion::Entropy],
        max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
        bootstrap: vec![true, false],
    };
    match class {
        VariantClass::Snv => ParamGrid(vec![space([500, 600], [20, 25]), space([700, 800], [30, 35])]),
        VariantClass::Indel => ParamGrid(vec![space([100, 200], [5, 10]), space([300, 400], [10, 15])]),
    }
}

/// A fitted model with what was learned while fitting it.
#[derive(Debug)]
pub struct TrainedModel {
    /// The deployed forest, best grid candidate refit on the fit part.
    pub forest: Forest,
    /// Winning hyperparameters.
    pub params: Hyperparameters,
    /// Mean cross-validated recall of the winner.
    pub cv_recall: f64,
    /// Impurity importances in feature order.
    pub importances: FeatureImportances,
    /// Report on the hold-out part.
    pub holdout_report: ClassificationReport,
}

/// Fits one classifier per (model identity, variant class).
///
/// The labeled training set is split into a fit part and a hold-out part;
/// the grid search runs stratified cross-validation on the fit part,
/// optimizing recall, and the hold-out part only feeds the classification
/// report.
///
/// # Defaults
///
/// | Parameter          | Default |
/// |--------------------|---------|
/// | `grid`             | [`default_grid`] for the class |
/// | `holdout_fraction` | 0.4     |
/// | `split_seed`       | 0       |
/// | `n_folds`          | 5       |
/// | `fold_seed`        | 0       |
/// | `estimator_seed`   | 4832    |
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    class: VariantClass,
    grid: ParamGrid,
    holdout_fraction: f64,
    split_seed: u64,
    n_folds: usize,
    fold_seed: u64,
    estimator_seed: u64,
}

impl ModelTrainer {
    /// Trainer for `class` with default settings.
    #[must_use]
    pub fn new(class: VariantClass) -> Self {
        Self {
            class,
            grid: default_grid(class),
            holdout_fraction: 0.4,
            split_seed: 0,
            n_folds: 5,
            fold_seed: 0,
            estimator_seed: 4832,
        }
    }

    /// Replace the search grid.
    #[must_use]
    pub fn with_grid(mut self, grid: ParamGrid) -> Self {
        self.grid = grid;
        self
    }

    /// Set the hold-out proportion.
    ///
    /// # Errors
    ///
    /// Returns [`CalibrateError::InvalidHoldout`] outside (0, 1).
    pub fn with_holdout_fraction(mut self, fraction: f64) -> Result<Self, CalibrateError> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(CalibrateError::InvalidHoldout { fraction });
        }
        self.holdout_fraction = fraction;
        Ok(self)
    }

    /// Set the fit/hold-out shuffle seed.
    #[must_use]
    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    /// Set the number of cross-validation folds.
    #[must_use]
    pub fn with_n_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    /// Set the fold assignment seed.
    #[must_use]
    pub fn with_fold_seed(mut self, seed: u64) -> Self {
        self.fold_seed = seed;
        self
    }

    /// Set the seed every candidate ensemble is built with.
    #[must_use]
    pub fn with_estimator_seed(mut self, seed: u64) -> Self {
        self.estimator_seed = seed;
        self
    }

    /// Variant class this trainer fits.
    #[must_use]
    pub fn class(&self) -> VariantClass {
        self.class
    }

    /// Fit on labeled records; unlabeled records count as negatives.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`CalibrateError::EmptyTrainingSet`] | `records` is empty |
    /// | [`CalibrateError::Forest`] | invalid grid or folds, too few rows to split, training failure |
    #[instrument(skip_all, fields(%model, class = %self.class, n_records = records.len()))]
    pub fn train(
        &self,
        model: &ModelName,
        records: &[MergedRecord],
    ) -> Result<TrainedModel, CalibrateError> {
        if records.is_empty() {
            return Err(CalibrateError::EmptyTrainingSet {
                model: model.to_string(),
                class: self.class.to_string(),
                partition: "train",
            });
        }
        let features = self.class.features();
        let names = self.class.feature_names();
        let rows: Vec<Vec<f64>> = records.iter().map(|r| r.feature_row(features)).collect();
        let labels: Vec<bool> = records.iter().map(MergedRecord::is_positive).collect();
        info!(
            n_positive = labels.iter().filter(|&&l| l).count(),
            n_features = features.len(),
            "training candidates"
        );

        let split = train_test_split(rows.len(), self.holdout_fraction, self.split_seed)?;
        let pick = |idx: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
            idx.iter().map(|&i| (rows[i].clone(), labels[i])).unzip()
        };
        let (fit_x, fit_y) = pick(&split.train);
        let (test_x, test_y) = pick(&split.test);

        let search = GridSearch::new(self.grid.clone())?
            .with_n_folds(self.n_folds)?
            .with_fold_seed(self.fold_seed)
            .with_estimator_seed(self.estimator_seed)
            .fit(&fit_x, &fit_y, &names)?;
        let params = search.best_params();
        let cv_recall = search.best_score();
        info!(%params, cv_recall, "best parameters found on fit set");

        let importances = search.best_model.importances().clone();
        for feature in importances.in_order() {
            info!(
                feature = %feature.name,
                importance = %format_args!("{:.3}", feature.importance),
                "feature importance"
            );
        }

        let forest = search.best_model.into_forest();
        let predicted = forest.predict_batch(&test_x)?;
        let holdout_report = ClassificationReport::from_labels(&test_y, &predicted)?;
        info!("hold-out classification report\n{holdout_report}");

        Ok(TrainedModel {
            forest,
            params,
            cv_recall,
            importances,
            holdout_report,
        })
    }
}
