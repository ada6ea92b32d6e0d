//! Training result types.

use crate::forest::Forest;
use crate::importance::FeatureImportances;

/// Metadata about a training run.
#[derive(Debug, Clone)]
pub struct TrainingMetadata {
    /// Number of trees trained.
    pub n_estimators: usize,
    /// Number of features in the dataset.
    pub n_features: usize,
    /// Number of training samples.
    pub n_samples: usize,
    /// Number of positive training samples.
    pub n_positive: usize,
    /// Resolved max_features value used.
    pub max_features_resolved: usize,
}

/// A fitted forest together with its importances and run metadata.
#[derive(Debug)]
pub struct FitResult {
    forest: Forest,
    importances: FeatureImportances,
    metadata: TrainingMetadata,
}

impl FitResult {
    pub(crate) fn new(
        forest: Forest,
        importances: FeatureImportances,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            forest,
            importances,
            metadata,
        }
    }

    /// Borrow the fitted forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the result and return the fitted forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Return the feature importances.
    #[must_use]
    pub fn importances(&self) -> &FeatureImportances {
        &self.importances
    }

    /// Return training metadata.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}
