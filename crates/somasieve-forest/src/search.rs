//! Exhaustive hyperparameter search with stratified k-fold cross-validation.

use std::fmt;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{ExtraTreesConfig, MaxFeatures};
use crate::error::ForestError;
use crate::holdout::stratified_folds;
use crate::result::FitResult;
use crate::split::SplitCriterion;
use crate::tree::validate_dataset;

/// One concrete combination of ensemble hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Hyperparameters {
    /// Number of trees.
    pub n_estimators: usize,
    /// Depth limit; `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    /// Split quality criterion.
    pub criterion: SplitCriterion,
    /// Features examined per split.
    pub max_features: MaxFeatures,
    /// Grow each tree on a bootstrap sample.
    pub bootstrap: bool,
}

impl Hyperparameters {
    /// Build a training config from these parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidEstimatorCount`] if `n_estimators` is zero.
    pub fn to_config(&self, seed: u64) -> Result<ExtraTreesConfig, ForestError> {
        Ok(ExtraTreesConfig::new(self.n_estimators)?
            .with_max_depth(self.max_depth)
            .with_criterion(self.criterion)
            .with_max_features(self.max_features)
            .with_bootstrap(self.bootstrap)
            .with_seed(seed))
    }
}

impl fmt::Display for Hyperparameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        write!(
            f,
            "bootstrap={} criterion={} max_depth={} max_features={} n_estimators={}",
            self.bootstrap, self.criterion, depth, self.max_features, self.n_estimators
        )
    }
}

/// A cartesian product of hyperparameter values.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParamSpace {
    /// Candidate tree counts.
    pub n_estimators: Vec<usize>,
    /// Candidate depth limits.
    pub max_depth: Vec<Option<usize>>,
    /// Candidate split criteria.
    pub criterion: Vec<SplitCriterion>,
    /// Candidate feature-subsampling strategies.
    pub max_features: Vec<MaxFeatures>,
    /// Candidate bootstrap settings.
    pub bootstrap: Vec<bool>,
}

impl ParamSpace {
    /// Expand in sorted-key order (`bootstrap`, `criterion`, `max_depth`,
    /// `max_features`, `n_estimators`), the last key varying fastest.
    #[must_use]
    pub fn expand(&self) -> Vec<Hyperparameters> {
        let mut out = Vec::new();
        for &bootstrap in &self.bootstrap {
            for &criterion in &self.criterion {
                for &max_depth in &self.max_depth {
                    for &max_features in &self.max_features {
                        for &n_estimators in &self.n_estimators {
                            out.push(Hyperparameters {
                                n_estimators,
                                max_depth,
                                criterion,
                                max_features,
                                bootstrap,
                            });
                        }
                    }
                }
            }
        }
        out
    }
}

/// A list of parameter spaces searched one after another.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(pub Vec<ParamSpace>);

impl ParamGrid {
    /// All candidates, space by space.
    #[must_use]
    pub fn candidates(&self) -> Vec<Hyperparameters> {
        self.0.iter().flat_map(ParamSpace::expand).collect()
    }
}

/// Mean cross-validated score of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    /// The evaluated parameters.
    pub params: Hyperparameters,
    /// Mean positive-class recall across folds.
    pub mean_recall: f64,
    /// Per-fold recall values.
    pub fold_recalls: Vec<f64>,
}

/// Outcome of a grid search, including the refit best model.
#[derive(Debug)]
pub struct GridSearchResult {
    /// Every candidate in evaluation order.
    pub scores: Vec<CandidateScore>,
    /// Index into `scores` of the winner.
    pub best_index: usize,
    /// The winner refit on the full dataset.
    pub best_model: FitResult,
}

impl GridSearchResult {
    /// Parameters of the winning candidate.
    #[must_use]
    pub fn best_params(&self) -> Hyperparameters {
        self.scores[self.best_index].params
    }

    /// Mean recall of the winning candidate.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.scores[self.best_index].mean_recall
    }
}

/// Grid search over [`Hyperparameters`] maximizing positive-class recall.
///
/// # Defaults
///
/// | Parameter        | Default |
/// |------------------|---------|
/// | `n_folds`        | 5       |
/// | `fold_seed`      | 0       |
/// | `estimator_seed` | 0       |
#[derive(Debug, Clone)]
pub struct GridSearch {
    grid: ParamGrid,
    n_folds: usize,
    fold_seed: u64,
    estimator_seed: u64,
}

impl GridSearch {
    /// Create a search over `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::EmptyParamGrid`] when the grid has no candidates.
    pub fn new(grid: ParamGrid) -> Result<Self, ForestError> {
        if grid.candidates().is_empty() {
            return Err(ForestError::EmptyParamGrid);
        }
        Ok(Self {
            grid,
            n_folds: 5,
            fold_seed: 0,
            estimator_seed: 0,
        })
    }

    /// Set the number of cross-validation folds.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn with_n_folds(mut self, n_folds: usize) -> Result<Self, ForestError> {
        if n_folds < 2 {
            return Err(ForestError::InvalidFoldCount { n_folds });
        }
        self.n_folds = n_folds;
        Ok(self)
    }

    /// Set the seed used to shuffle rows into folds.
    #[must_use]
    pub fn with_fold_seed(mut self, seed: u64) -> Self {
        self.fold_seed = seed;
        self
    }

    /// Set the seed every candidate ensemble is trained with.
    #[must_use]
    pub fn with_estimator_seed(mut self, seed: u64) -> Self {
        self.estimator_seed = seed;
        self
    }

    /// Score every candidate, pick the best (first on ties) and refit it on
    /// the whole dataset.
    ///
    /// Candidates are evaluated in parallel.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | zero samples |
    /// | [`ForestError::TooFewSamplesForFolds`] | a class has fewer samples than folds |
    /// | Other forest errors | from underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len()))]
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[bool],
        feature_names: &[String],
    ) -> Result<GridSearchResult, ForestError> {
        validate_dataset(features, labels)?;
        let folds = stratified_folds(labels, self.n_folds, self.fold_seed)?;
        let candidates = self.grid.candidates();

        info!(n_candidates = candidates.len(), "starting grid search");

        let scores: Vec<CandidateScore> = candidates
            .par_iter()
            .map(|params| self.score(params, features, labels, feature_names, &folds))
            .collect::<Result<_, _>>()?;

        let mut best_index = 0usize;
        for (i, s) in scores.iter().enumerate() {
            if s.mean_recall > scores[best_index].mean_recall {
                best_index = i;
            }
        }
        let best = &scores[best_index];
        info!(params = %best.params, mean_recall = best.mean_recall, "best candidate");

        let best_model = best
            .params
            .to_config(self.estimator_seed)?
            .fit(features, labels, feature_names)?;

        Ok(GridSearchResult {
            scores,
            best_index,
            best_model,
        })
    }

    fn score(
        &self,
        params: &Hyperparameters,
        features: &[Vec<f64>],
        labels: &[bool],
        feature_names: &[String],
        folds: &[usize],
    ) -> Result<CandidateScore, ForestError> {
        let config = params.to_config(self.estimator_seed)?;
        let mut fold_recalls = Vec::with_capacity(self.n_folds);

        for fold in 0..self.n_folds {
            let mut train_x = Vec::new();
            let mut train_y = Vec::new();
            let mut test_x = Vec::new();
            let mut test_y = Vec::new();
            for (i, &assigned) in folds.iter().enumerate() {
                if assigned == fold {
                    test_x.push(features[i].clone());
                    test_y.push(labels[i]);
                } else {
                    train_x.push(features[i].clone());
                    train_y.push(labels[i]);
                }
            }

            let forest = config.fit(&train_x, &train_y, feature_names)?.into_forest();
            let predicted = forest.predict_batch(&test_x)?;
            let positives = test_y.iter().filter(|&&l| l).count();
            let hits = predicted
                .iter()
                .zip(&test_y)
                .filter(|&(&p, &l)| p && l)
                .count();
            let recall = if positives == 0 {
                0.0
            } else {
                hits as f64 / positives as f64
            };
            fold_recalls.push(recall);
        }

        let mean_recall = fold_recalls.iter().sum::<f64>() / fold_recalls.len() as f64;
        debug!(params = %params, mean_recall, "candidate scored");
        Ok(CandidateScore {
            params: *params,
            mean_recall,
            fold_recalls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(n_estimators: Vec<usize>, max_depth: Vec<Option<usize>>) -> ParamSpace {
        ParamSpace {
            n_estimators,
            max_depth,
            criterion: vec![SplitCriterion::Entropy],
            max_features: vec![MaxFeatures::Sqrt, MaxFeatures::Log2],
            bootstrap: vec![true, false],
        }
    }

    fn make_separable_data() -> (Vec<Vec<f64>>, Vec<bool>, Vec<String>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let positive = i % 4 == 0;
            let base = if positive { 5.0 } else { 0.0 };
            features.push(vec![base + (i % 3) as f64 * 0.2, (i % 7) as f64, (i % 2) as f64]);
            labels.push(positive);
        }
        let names = vec!["signal".into(), "noise_a".into(), "noise_b".into()];
        (features, labels, names)
    }

    #[test]
    fn expansion_order_and_size() {
        let grid = ParamGrid(vec![
            space(vec![10, 20], vec![Some(2), Some(3)]),
            space(vec![30], vec![None]),
        ]);
        let c = grid.candidates();
        assert_eq!(c.len(), 2 * 2 * 2 * 2 + 2 * 2);
        assert!(c[0].bootstrap);
        assert_eq!((c[0].n_estimators, c[1].n_estimators), (10, 20));
        assert_eq!(c[0].max_depth, Some(2));
        assert_eq!(c.last().map(|h| h.n_estimators), Some(30));
    }

    #[test]
    fn empty_grid_rejected() {
        assert!(matches!(
            GridSearch::new(ParamGrid::default()),
            Err(ForestError::EmptyParamGrid)
        ));
        let hollow = ParamGrid(vec![space(vec![], vec![None])]);
        assert!(GridSearch::new(hollow).is_err());
    }

    #[test]
    fn search_finds_perfect_recall_and_refits() {
        let (features, labels, names) = make_separable_data();
        let grid = ParamGrid(vec![space(vec![5, 10], vec![None, Some(8)])]);
        let result = GridSearch::new(grid)
            .unwrap()
            .with_estimator_seed(4832)
            .fit(&features, &labels, &names)
            .unwrap();

        assert_eq!(result.scores.len(), 16);
        assert!(result.best_score() > 0.8, "best = {}", result.best_score());
        assert_eq!(result.best_model.metadata().n_samples, 40);
        assert_eq!(
            result.best_model.forest().n_trees(),
            result.best_params().n_estimators
        );
    }

    #[test]
    fn ties_keep_first_candidate() {
        let (features, labels, names) = make_separable_data();
        let grid = ParamGrid(vec![ParamSpace {
            n_estimators: vec![3, 3],
            max_depth: vec![None],
            criterion: vec![SplitCriterion::Gini],
            max_features: vec![MaxFeatures::All],
            bootstrap: vec![false],
        }]);
        let result = GridSearch::new(grid)
            .unwrap()
            .fit(&features, &labels, &names)
            .unwrap();
        assert_eq!(result.best_index, 0);
    }

    #[test]
    fn fold_count_validated() {
        let grid = ParamGrid(vec![space(vec![5], vec![None])]);
        assert!(matches!(
            GridSearch::new(grid).unwrap().with_n_folds(1),
            Err(ForestError::InvalidFoldCount { n_folds: 1 })
        ));
    }

    #[test]
    fn hyperparameters_display_lists_sorted_keys() {
        let hp = space(vec![500], vec![Some(20)]).expand()[0];
        assert_eq!(
            hp.to_string(),
            "bootstrap=true criterion=entropy max_depth=20 max_features=sqrt n_estimators=500"
        );
    }

    #[test]
    fn grid_deserializes_from_json() {
        let json = r#"[{"n_estimators":[100,200],"max_depth":[5,null],
            "criterion":["entropy"],"max_features":["sqrt","log2"],"bootstrap":[true,false]}]"#;
        let grid: ParamGrid = serde_json::from_str(json).unwrap();
        assert_eq!(grid.candidates().len(), 16);
    }
}
