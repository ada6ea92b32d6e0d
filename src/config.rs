//! JSON pipeline configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use somasieve_calibrate::{CallFilter, ModelTrainer, ThresholdSweep};
use somasieve_forest::ParamGrid;
use somasieve_io::{IndelThresholds, ModelName, ModelSet, PathTemplate, UnknownPolicy, VariantClass};

/// Everything a pipeline run reads from `--config`.
///
/// Templates accept the `{sample}`, `{replicate}`, `{model}` and `{class}`
/// placeholders where they make sense:
///
/// ```json
/// {
///   "candidates": "cands/{sample}/{replicate}/candidates.tsv",
///   "labels": "labels/{sample}.tsv",
///   "valid_labels": "labels/{sample}.val.tsv",
///   "model": "models/{model}.{class}.bin",
///   "thresholds": "models/thresholds.json",
///   "results": "results/{model}/{sample}.{class}.tsv",
///   "combined_results": "results/{model}/{sample}.tsv",
///   "model_sets": [{"name": "COLO_829_Model", "train": ["S1"], "valid": ["S2"], "test": ["S3"]}]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Candidate evidence table per sample and replicate.
    pub candidates: PathTemplate,
    /// Label table per sample.
    pub labels: PathTemplate,
    /// Label table per validation sample, when it differs from `labels`.
    #[serde(default)]
    pub valid_labels: Option<PathTemplate>,
    /// Resolution of labels that are absent or unrecognized.
    #[serde(default)]
    pub unknown_policy: UnknownPolicy,
    /// Model artifact per model identity and class.
    pub model: PathTemplate,
    /// Threshold table file.
    pub thresholds: PathBuf,
    /// Result table per model, sample and class.
    pub results: PathTemplate,
    /// Result table per model and sample with both classes.
    #[serde(default)]
    pub combined_results: Option<PathTemplate>,
    /// Training/validation/test partitions per model identity.
    #[serde(default)]
    pub model_sets: Vec<ModelSet>,
    /// Thresholds applied to training data before calibration, by model name.
    #[serde(default = "default_thresholds")]
    pub default_thresholds: BTreeMap<String, ClassValues>,
    /// Search grids; the built-in grid is used for a class left out.
    #[serde(default)]
    pub grids: Grids,
    /// Calibration sweep.
    #[serde(default)]
    pub sweep: ThresholdSweep,
    /// Post-threshold filter.
    #[serde(default)]
    pub call_filter: CallFilter,
    /// Split, fold and estimator settings.
    #[serde(default)]
    pub training: TrainingConfig,
    /// Model identity used by the `call` workflow, `Production_Model` when unset.
    #[serde(default)]
    pub call_model: Option<ModelName>,
    /// Cut-offs for thresholded call sets written by `evaluate --call-mode`.
    #[serde(default)]
    pub evaluation: EvaluationCutoffs,
}

/// One value per variant class.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassValues {
    /// Point mutations.
    pub snv: f64,
    /// Insertions and deletions.
    pub indel: f64,
}

impl ClassValues {
    /// Value for `class`.
    pub fn get(&self, class: VariantClass) -> f64 {
        match class {
            VariantClass::Snv => self.snv,
            VariantClass::Indel => self.indel,
        }
    }
}

/// Optional per-class search grids.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Grids {
    /// Point-mutation grid.
    #[serde(default)]
    pub snv: Option<ParamGrid>,
    /// Indel grid.
    #[serde(default)]
    pub indel: Option<ParamGrid>,
}

/// Seeds and proportions of model fitting.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Hold-out proportion of the training set.
    pub holdout_fraction: f64,
    /// Fit/hold-out shuffle seed.
    pub split_seed: u64,
    /// Cross-validation folds.
    pub n_folds: usize,
    /// Fold assignment seed.
    pub fold_seed: u64,
    /// Ensemble seed.
    pub estimator_seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_fraction: 0.4,
            split_seed: 0,
            n_folds: 5,
            fold_seed: 0,
            estimator_seed: 4832,
        }
    }
}

/// Score cut-offs of `evaluate --call-mode` call sets.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationCutoffs {
    /// Point-mutation cut-off.
    pub snv: f64,
    /// Deletion cut-off.
    pub deletion: f64,
    /// Insertion cut-off.
    pub insertion: f64,
}

impl Default for EvaluationCutoffs {
    fn default() -> Self {
        let indel = IndelThresholds::default();
        Self {
            snv: 0.01,
            deletion: indel.deletion(),
            insertion: indel.insertion(),
        }
    }
}

impl EvaluationCutoffs {
    /// The indel part as writer settings.
    pub fn indel(&self) -> IndelThresholds {
        IndelThresholds::default()
            .with_deletion(self.deletion)
            .with_insertion(self.insertion)
    }
}

const DEFAULT_CALL_MODEL: &str = "Production_Model";

fn default_thresholds() -> BTreeMap<String, ClassValues> {
    [
        ("COLO_829_Model", 0.014, 0.016),
        ("MZ_PC_1_Model", 0.037, 0.013),
        ("MZ_PC_2_Model", 0.034, 0.013),
        ("Production_Model", 0.027, 0.014),
    ]
    .into_iter()
    .map(|(name, snv, indel)| (name.to_string(), ClassValues { snv, indel }))
    .collect()
}

impl PipelineConfig {
    /// Read and check a configuration file.
    ///
    /// # Errors
    ///
    /// Fails when the file is unreadable, not valid JSON for this schema,
    /// or describes an invalid sweep, overlapping partitions or a duplicate
    /// model identity.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.sweep.validate().context("invalid sweep")?;
        let mut seen = std::collections::BTreeSet::new();
        for set in &self.model_sets {
            if !seen.insert(&set.name) {
                bail!("model set {} is defined twice", set.name);
            }
            set.validate()?;
        }
        Ok(())
    }

    /// Model set called `name`.
    pub fn model_set(&self, name: &str) -> Result<&ModelSet> {
        self.model_sets
            .iter()
            .find(|set| set.name.as_str() == name)
            .with_context(|| format!("no model set named {name} in config"))
    }

    /// Pre-calibration threshold of `(model, class)`, if configured.
    pub fn default_threshold(&self, model: &ModelName, class: VariantClass) -> Option<f64> {
        self.default_thresholds
            .get(model.as_str())
            .map(|v| v.get(class))
    }

    /// Model identity the `call` workflow scores with.
    pub fn call_model(&self) -> Result<ModelName> {
        match &self.call_model {
            Some(name) => Ok(name.clone()),
            None => Ok(ModelName::new(DEFAULT_CALL_MODEL.to_string())?),
        }
    }

    /// Trainer for `class` with the configured grid and seeds.
    pub fn trainer(&self, class: VariantClass) -> Result<ModelTrainer> {
        let grid = match class {
            VariantClass::Snv => self.grids.snv.clone(),
            VariantClass::Indel => self.grids.indel.clone(),
        };
        let t = self.training;
        let mut trainer = ModelTrainer::new(class)
            .with_holdout_fraction(t.holdout_fraction)?
            .with_split_seed(t.split_seed)
            .with_n_folds(t.n_folds)
            .with_fold_seed(t.fold_seed)
            .with_estimator_seed(t.estimator_seed);
        if let Some(grid) = grid {
            trainer = trainer.with_grid(grid);
        }
        Ok(trainer)
    }
}
