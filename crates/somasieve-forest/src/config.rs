//! Configuration builder for extra-trees training.

use crate::error::ForestError;
use crate::result::FitResult;
use crate::split::{SplitCriterion, SplitMethod};

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// Log base 2 of total features.
    Log2,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete feature count for `n_features` columns.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidMaxFeatures`] when the result is 0 or
    /// exceeds `n_features`.
    pub fn resolve(self, n_features: usize) -> Result<usize, ForestError> {
        let resolved = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor().max(1.0) as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor().max(1.0) as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(ForestError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

impl std::fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaxFeatures::Sqrt => f.write_str("sqrt"),
            MaxFeatures::Log2 => f.write_str("log2"),
            MaxFeatures::Fraction(x) => write!(f, "{x}"),
            MaxFeatures::Fixed(n) => write!(f, "{n}"),
            MaxFeatures::All => f.write_str("all"),
        }
    }
}

/// Configuration for an extremely randomized trees ensemble.
///
/// Construct via [`ExtraTreesConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default      |
/// |---------------------|--------------|
/// | `criterion`         | `Gini`       |
/// | `max_features`      | `Sqrt`       |
/// | `max_depth`         | `None`       |
/// | `min_samples_split` | 2            |
/// | `min_samples_leaf`  | 1            |
/// | `bootstrap`         | `false`      |
/// | `split_method`      | `ExtraTrees` |
/// | `seed`              | 0            |
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraTreesConfig {
    pub(crate) n_estimators: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) bootstrap: bool,
    pub(crate) split_method: SplitMethod,
    pub(crate) seed: u64,
}

impl ExtraTreesConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidEstimatorCount`] if `n_estimators` is zero.
    pub fn new(n_estimators: usize) -> Result<Self, ForestError> {
        if n_estimators == 0 {
            return Err(ForestError::InvalidEstimatorCount { n_estimators });
        }
        Ok(Self {
            n_estimators,
            criterion: SplitCriterion::Gini,
            max_features: MaxFeatures::Sqrt,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            bootstrap: false,
            split_method: SplitMethod::ExtraTrees,
            seed: 0,
        })
    }

    // --- Setters ---

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Draw a bootstrap sample per tree instead of using the whole dataset.
    #[must_use]
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set the split-finding strategy.
    #[must_use]
    pub fn with_split_method(mut self, split_method: SplitMethod) -> Self {
        self.split_method = split_method;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return whether trees are grown on bootstrap samples.
    #[must_use]
    pub fn bootstrap(&self) -> bool {
        self.bootstrap
    }

    /// Return the split-finding strategy.
    #[must_use]
    pub fn split_method(&self) -> SplitMethod {
        self.split_method
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train an ensemble on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]` is row-major; `labels[sample_idx]`
    /// is `true` for the positive class.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::EmptyDataset`] | `features` is empty |
    /// | [`ForestError::LabelCountMismatch`] | labels and rows disagree in length |
    /// | [`ForestError::ZeroFeatures`] | rows have zero feature columns |
    /// | [`ForestError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`ForestError::NonFiniteValue`] | any value is NaN or infinite |
    /// | [`ForestError::InvalidMaxFeatures`] | resolved max_features is outside [1, n_features] |
    /// | [`ForestError::InvalidMaxDepth`] | `max_depth` is `Some(0)` |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[bool],
        feature_names: &[String],
    ) -> Result<FitResult, ForestError> {
        crate::forest::train(self, features, labels, feature_names)
    }
}
