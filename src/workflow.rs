//! The `train`, `call` and `evaluate` workflows.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument, warn};

use somasieve_calibrate::{
    CalibrateError, EvaluationReporter, EvaluationSummary, ThresholdCalibrator, ThresholdMetrics,
    apply_threshold, score_records,
};
use somasieve_forest::Forest;
use somasieve_io::{
    CandidateRecord, CandidateTableReader, IoError, LabelRecord, LabelTableReader, MergedRecord,
    ModelName, ModelSet, Partition, Placeholders, Replicate, ResultWriter, RunLedger,
    SampleSetLoader, SampleSheetReader, ScoreSetWriter, ScoreTableReader, ThresholdTable,
    VariantClass, VcfStyle, write_vcf,
};

use crate::config::PipelineConfig;

/// Outcome of training one (model identity, class) pair.
#[derive(Debug, Serialize)]
pub struct TrainOutcome {
    pub model: String,
    pub class: VariantClass,
    pub model_path: PathBuf,
    pub hyperparameters: String,
    pub cv_recall: f64,
    pub holdout_accuracy: f64,
    pub threshold: f64,
    pub valid_fbeta: f64,
    pub partitions: BTreeMap<&'static str, ThresholdMetrics>,
    pub result_tables: usize,
}

/// Outcome of calling one class over a sample sheet.
#[derive(Debug, Serialize)]
pub struct CallOutcome {
    pub class: VariantClass,
    pub threshold: f64,
    pub n_candidates: usize,
    pub n_calls: usize,
    pub result_tables: Vec<PathBuf>,
}

/// Outcome of an evaluation run.
#[derive(Debug, Serialize)]
pub struct EvaluateOutcome {
    pub run_id: String,
    pub n_records: usize,
    pub predictions: PathBuf,
    pub summary: Option<EvaluationSummary>,
    pub call_sets: Vec<PathBuf>,
}

/// Options of an evaluation run that do not live in the config file.
#[derive(Debug, Clone)]
pub struct EvaluateRequest {
    pub scores: PathBuf,
    pub output_dir: PathBuf,
    pub run_id: String,
    pub ledger: PathBuf,
    pub model_set: Option<String>,
    pub hyperparameters: String,
    pub call_mode: bool,
}

fn model_path(config: &PipelineConfig, model: &ModelName, class: VariantClass) -> Result<PathBuf> {
    let placeholders = Placeholders::default()
        .with_model(model.as_str())
        .with_class(class);
    Ok(config.model.render(&placeholders)?)
}

fn log_metrics(model: &ModelName, class: VariantClass, partition: Partition, metrics: &ThresholdMetrics) {
    info!(
        %model,
        %class,
        partition = partition.as_str(),
        "\n{}\n{}",
        ThresholdMetrics::header(),
        metrics
    );
}

/// Fit, persist and calibrate the models of one model set.
///
/// Per class: fit on the training partition and save the model; apply the
/// pre-calibration threshold to the training set; calibrate on the
/// validation set and store the threshold; apply threshold and filter to
/// validation and test; write labeled result tables for every partition.
#[instrument(skip_all, fields(model = %set.name))]
pub fn train(
    config: &PipelineConfig,
    set: &ModelSet,
    classes: &[VariantClass],
) -> Result<Vec<TrainOutcome>> {
    let loader = SampleSetLoader::new(config.candidates.clone())
        .with_labels(config.labels.clone(), config.unknown_policy);
    let valid_loader = match &config.valid_labels {
        Some(labels) => SampleSetLoader::new(config.candidates.clone())
            .with_labels(labels.clone(), config.unknown_policy),
        None => loader.clone(),
    };
    let calibrator = ThresholdCalibrator::new(config.sweep);
    let beta = config.sweep.beta();
    let mut table = ThresholdTable::open_or_empty(&config.thresholds)
        .context("failed to open threshold table")?;

    let mut outcomes = Vec::with_capacity(classes.len());
    for &class in classes {
        let name = &set.name;
        let features = class.features();

        let mut train = loader
            .load(&set.train, class)
            .with_context(|| format!("failed to load {class} training set of {name}"))?;
        let trained = config.trainer(class)?.train(name, &train)?;
        let path = model_path(config, name, class)?;
        trained
            .forest
            .save(&path)
            .with_context(|| format!("failed to save model {}", path.display()))?;

        let initial = table
            .get(name, class)
            .or_else(|| config.default_threshold(name, class))
            .unwrap_or_else(|| config.sweep.start());
        score_records(&trained.forest, &mut train, features)?;
        apply_threshold(&mut train, initial);
        let mut partitions = BTreeMap::new();
        let metrics = ThresholdMetrics::from_records(&train, initial, beta);
        log_metrics(name, class, Partition::Train, &metrics);
        partitions.insert(Partition::Train.as_str(), metrics);

        let mut valid = valid_loader
            .load(&set.valid, class)
            .with_context(|| format!("failed to load {class} validation set of {name}"))?;
        if valid.is_empty() {
            return Err(CalibrateError::EmptyTrainingSet {
                model: name.to_string(),
                class: class.to_string(),
                partition: Partition::Valid.as_str(),
            }
            .into());
        }
        score_records(&trained.forest, &mut valid, features)?;
        let calibration = calibrator.calibrate_into(&valid, &mut table, name, class)?;
        table.save().context("failed to save threshold table")?;
        let threshold = calibration.threshold;
        apply_threshold(&mut valid, threshold);
        config.call_filter.apply(&mut valid);
        let metrics = ThresholdMetrics::from_records(&valid, threshold, beta);
        log_metrics(name, class, Partition::Valid, &metrics);
        partitions.insert(Partition::Valid.as_str(), metrics);

        let mut test = loader
            .load(&set.test, class)
            .with_context(|| format!("failed to load {class} test set of {name}"))?;
        if test.is_empty() {
            warn!(%class, "no test records, skipping test metrics");
        } else {
            score_records(&trained.forest, &mut test, features)?;
            apply_threshold(&mut test, threshold);
            config.call_filter.apply(&mut test);
            let metrics = ThresholdMetrics::from_records(&test, threshold, beta);
            log_metrics(name, class, Partition::Test, &metrics);
            partitions.insert(Partition::Test.as_str(), metrics);
        }

        let mut all = train;
        all.append(&mut valid);
        all.append(&mut test);
        let written = ResultWriter::new(config.results.clone())
            .with_model(name.clone())
            .with_labels(true)
            .write(&all, class)
            .with_context(|| format!("failed to write {class} results of {name}"))?;

        outcomes.push(TrainOutcome {
            model: name.to_string(),
            class,
            model_path: path,
            hyperparameters: trained.params.to_string(),
            cv_recall: trained.cv_recall,
            holdout_accuracy: trained.holdout_report.accuracy,
            threshold,
            valid_fbeta: calibration.fbeta,
            partitions,
            result_tables: written.len(),
        });
    }
    Ok(outcomes)
}

/// Score the samples of a sheet with the production model and write calls.
///
/// Samples are scored in parallel against read-only models. A class left
/// without a single positive call after thresholding and filtering fails
/// the run before anything is written.
#[instrument(skip_all, fields(sheet = %sheet.display()))]
pub fn call(
    config: &PipelineConfig,
    sheet: &Path,
    classes: &[VariantClass],
) -> Result<Vec<CallOutcome>> {
    let specs = SampleSheetReader::new(sheet)
        .read()
        .context("failed to read sample sheet")?;
    let table = ThresholdTable::open(&config.thresholds).context("failed to open threshold table")?;
    let loader = SampleSetLoader::new(config.candidates.clone());
    let model = &config.call_model()?;

    let mut calls: Vec<(VariantClass, f64, usize, Vec<MergedRecord>)> = Vec::new();
    for &class in classes {
        let path = model_path(config, model, class)?;
        let forest = Forest::load(&path).map_err(|e| {
            if e.is_missing_file() {
                anyhow::Error::new(IoError::MissingArtifact {
                    path: path.clone(),
                    what: "model",
                })
            } else {
                anyhow::Error::new(e).context(format!("failed to load model {}", path.display()))
            }
        })?;
        let threshold = table.threshold(model, class)?;

        let per_sample = specs
            .par_iter()
            .map(|spec| -> Result<(usize, Vec<MergedRecord>), CalibrateError> {
                let mut records = loader.load_sample(spec, class)?;
                let n_candidates = records.len();
                score_records(&forest, &mut records, class.features())?;
                apply_threshold(&mut records, threshold);
                config.call_filter.apply(&mut records);
                Ok((n_candidates, records))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n_candidates: usize = per_sample.iter().map(|(n, _)| n).sum();
        let records: Vec<MergedRecord> = per_sample.into_iter().flat_map(|(_, r)| r).collect();
        let n_calls = records.iter().filter(|r| r.call).count();
        if n_calls == 0 {
            return Err(CalibrateError::EmptyResult {
                model: model.to_string(),
                class: class.to_string(),
            }
            .into());
        }
        info!(%class, n_candidates, n_kept = records.len(), n_calls, threshold, "class called");
        calls.push((class, threshold, n_candidates, records));
    }

    let writer = ResultWriter::new(config.results.clone()).with_model(model.clone());
    let mut outcomes = Vec::with_capacity(calls.len());
    for (class, threshold, n_candidates, records) in &calls {
        let result_tables = writer
            .write(records, *class)
            .with_context(|| format!("failed to write {class} calls"))?;
        outcomes.push(CallOutcome {
            class: *class,
            threshold: *threshold,
            n_candidates: *n_candidates,
            n_calls: records.iter().filter(|r| r.call).count(),
            result_tables,
        });
    }
    if let Some(template) = &config.combined_results {
        let combined: Vec<MergedRecord> = calls.into_iter().flat_map(|(.., r)| r).collect();
        ResultWriter::new(template.clone())
            .with_model(model.clone())
            .write_combined(&combined)
            .context("failed to write combined calls")?;
    }
    Ok(outcomes)
}

/// Reconcile an external score table with labels and candidate evidence.
///
/// An empty reconciliation or an unknown model set fails before any file is
/// written. Writes the annotated and score-sorted tables. Outside call mode the run
/// is summarized into the ledger and a predictions VCF is written; in call
/// mode labels are not read and per-sample thresholded call sets are
/// written instead.
#[instrument(skip_all, fields(run_id = %request.run_id, call_mode = request.call_mode))]
pub fn evaluate(config: &PipelineConfig, request: &EvaluateRequest) -> Result<EvaluateOutcome> {
    let scores = ScoreTableReader::new(&request.scores)
        .read()
        .context("failed to read score table")?;
    let samples: BTreeSet<&str> = scores.iter().map(|s| s.locus.sample.as_str()).collect();
    let replicates: BTreeSet<(&str, &Replicate)> = scores
        .iter()
        .map(|s| (s.locus.sample.as_str(), &s.replicate))
        .collect();

    let mut labels: Vec<LabelRecord> = Vec::new();
    if !request.call_mode {
        for sample in &samples {
            let path = config.labels.render(&Placeholders::sample(sample))?;
            labels.extend(LabelTableReader::new(&path, sample).read()?);
        }
    }
    let mut candidates: Vec<CandidateRecord> = Vec::new();
    for (sample, replicate) in replicates {
        let path = config
            .candidates
            .render(&Placeholders::sample(sample).with_replicate(replicate.as_str()))?;
        let table = CandidateTableReader::new(&path, sample)
            .with_replicate(replicate.clone())
            .with_optional(true)
            .read()?;
        candidates.extend_from_slice(table.records());
    }
    let merged = somasieve_io::reconcile(&labels, &scores, &candidates, config.unknown_policy);
    info!(
        n_samples = samples.len(),
        n_records = merged.len(),
        "records reconciled"
    );

    if merged.is_empty() {
        bail!("no records to evaluate in {}", request.scores.display());
    }
    let model_set = match (&request.model_set, request.call_mode) {
        (Some(name), false) => Some(config.model_set(name)?),
        _ => None,
    };

    let dir = &request.output_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let cutoffs = config.evaluation;
    let writer = ScoreSetWriter::new(dir)
        .with_snv_threshold(cutoffs.snv)
        .with_indel_thresholds(cutoffs.indel())
        .with_vcf_style(VcfStyle::Evaluation);
    let run_id = &request.run_id;
    writer.write_annotated(&merged, &dir.join(format!("{run_id}.annotated.tsv")))?;
    let predictions = dir.join(format!("{run_id}.predictions.tsv"));
    writer.write_predictions(&merged, &predictions)?;

    let mut outcome = EvaluateOutcome {
        run_id: run_id.clone(),
        n_records: merged.len(),
        predictions,
        summary: None,
        call_sets: Vec::new(),
    };
    if request.call_mode {
        for class in [VariantClass::Snv, VariantClass::Indel] {
            let subset: Vec<MergedRecord> = merged
                .iter()
                .filter(|r| r.locus.class() == class)
                .cloned()
                .collect();
            outcome
                .call_sets
                .extend(writer.write_call_sets(&subset, class)?);
        }
        return Ok(outcome);
    }

    let mut reporter =
        EvaluationReporter::new(run_id.clone()).with_hyperparameters(request.hyperparameters.clone());
    if let Some(set) = model_set {
        let names = |p: Partition| -> Vec<String> {
            set.partition(p).iter().map(|s| s.sample.clone()).collect()
        };
        reporter = reporter.with_partitions(names(Partition::Train), names(Partition::Valid));
    }
    let summary = reporter.report(&merged, &RunLedger::new(&request.ledger, dir))?;
    let rows: Vec<&MergedRecord> = merged.iter().collect();
    write_vcf(&dir.join(format!("{run_id}.predictions.vcf")), &rows, VcfStyle::Evaluation)?;
    outcome.summary = Some(summary);
    Ok(outcome)
}
