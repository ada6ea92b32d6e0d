//! Extremely randomized trees for binary variant classification.
//!
//! Provides an extra-trees ensemble (with an exact CART split mode), parallel
//! training via rayon, positive-class probability prediction, impurity-based
//! feature importance, recall-driven grid search over stratified folds, a
//! deterministic fit/hold-out split, and versioned model persistence.

mod config;
mod error;
mod forest;
mod holdout;
mod importance;
mod node;
mod predict;
mod report;
mod result;
mod search;
mod serialize;
mod split;
mod tree;

pub use config::{ExtraTreesConfig, MaxFeatures};
pub use error::ForestError;
pub use forest::Forest;
pub use holdout::{HoldoutSplit, train_test_split};
pub use importance::{FeatureImportances, RankedFeature};
pub use node::{ClassCounts, FeatureIndex, Impurity, Node, NodeIndex};
pub use report::{ClassMetrics, ClassificationReport};
pub use result::{FitResult, TrainingMetadata};
pub use search::{CandidateScore, GridSearch, GridSearchResult, Hyperparameters, ParamGrid, ParamSpace};
pub use split::{SplitCriterion, SplitMethod};
pub use tree::{DecisionTree, TreeConfig};
