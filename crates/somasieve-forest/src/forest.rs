//! Ensemble training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::ExtraTreesConfig;
use crate::error::ForestError;
use crate::importance::FeatureImportances;
use crate::result::{FitResult, TrainingMetadata};
use crate::tree::{DecisionTree, TreeConfig, to_columns, validate_dataset};

/// A fitted extra-trees ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Forest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) feature_names: Vec<String>,
    /// `false` when the training labels contained no positive sample.
    pub(crate) saw_positive: bool,
}

/// Draw `n_samples` indices with replacement.
fn bootstrap_sample(n_samples: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
}

#[instrument(skip_all, fields(n_estimators = config.n_estimators, n_samples = features.len()))]
pub(crate) fn train(
    config: &ExtraTreesConfig,
    features: &[Vec<f64>],
    labels: &[bool],
    feature_names: &[String],
) -> Result<FitResult, ForestError> {
    let n_features = validate_dataset(features, labels)?;
    let max_features = config.max_features.resolve(n_features)?;
    let n_samples = features.len();
    let n_positive = labels.iter().filter(|&&l| l).count();

    let tree_config = TreeConfig::new()
        .with_criterion(config.criterion)
        .with_split_method(config.split_method)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf);
    tree_config.validate()?;

    info!(
        n_estimators = config.n_estimators,
        n_samples,
        n_features,
        n_positive,
        max_features,
        bootstrap = config.bootstrap,
        "training extra-trees ensemble"
    );

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_estimators).map(|_| master_rng.r#gen()).collect();

    let columns = to_columns(features, n_features);
    let all: Vec<usize> = (0..n_samples).collect();

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let drawn;
            let indices = if config.bootstrap {
                drawn = bootstrap_sample(n_samples, &mut rng);
                &drawn
            } else {
                &all
            };
            tree_config.grow(&columns, labels, indices, max_features, rng.r#gen())
        })
        .collect();

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let per_tree: Vec<Vec<f64>> = trees.iter().map(DecisionTree::feature_importances).collect();
    let importances = FeatureImportances::aggregate(&per_tree, feature_names);

    let forest = Forest {
        trees,
        n_features,
        feature_names: feature_names.to_vec(),
        saw_positive: n_positive > 0,
    };
    let metadata = TrainingMetadata {
        n_estimators: config.n_estimators,
        n_features,
        n_samples,
        n_positive,
        max_features_resolved: max_features,
    };

    info!("extra-trees training complete");
    Ok(FitResult::new(forest, importances, metadata))
}
