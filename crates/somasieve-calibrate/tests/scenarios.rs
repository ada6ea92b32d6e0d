//! Pipeline scenarios: train, score, calibrate, filter and write.

use std::fs;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use somasieve_calibrate::{
    CallFilter, EvaluationReporter, ModelTrainer, ThresholdCalibrator, ThresholdMetrics,
    ThresholdSweep, apply_threshold, score_records,
};
use somasieve_forest::{MaxFeatures, ParamGrid, ParamSpace, SplitCriterion};
use somasieve_io::{
    CandidateRecord, Evidence, EvidenceFeature, FilterTag, IndelThresholds, Locus, MergedRecord,
    ModelName, PathTemplate, Replicate, ResultWriter, ScoreSetWriter, ThresholdTable,
    VariantClass,
};
use tempfile::TempDir;

fn model() -> ModelName {
    ModelName::new("Production_Model".into()).unwrap()
}

fn locus(sample: &str, pos: u64, ref_allele: &str, alt_allele: &str) -> Locus {
    Locus {
        sample: sample.into(),
        chrom: "chr1".into(),
        pos,
        ref_allele: ref_allele.into(),
        alt_allele: alt_allele.into(),
    }
}

fn evidence(primary: (f64, f64, f64), normal: (f64, f64, f64)) -> Evidence {
    use EvidenceFeature::*;
    Evidence::missing()
        .with(PrimaryAf, primary.0)
        .with(PrimaryDp, primary.1)
        .with(PrimaryAc, primary.2)
        .with(NormalAf, normal.0)
        .with(NormalDp, normal.1)
        .with(NormalAc, normal.2)
}

fn candidate(pos: u64, evidence: Evidence) -> MergedRecord {
    MergedRecord::from(CandidateRecord {
        locus: locus("S1", pos, "A", "T"),
        replicate: Replicate::default(),
        tag: None,
        evidence,
    })
}

/// Labeled synthetic point mutations: positives carry tumor evidence and a
/// clean normal, negatives look like noise or germline.
fn synthetic(n: usize, seed: u64) -> Vec<MergedRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let positive = i % 4 == 0;
            let mut values = [0.0; 24];
            for v in &mut values {
                *v = rng.r#gen::<f64>();
            }
            let mut ev = Evidence::from_values(values);
            ev = if positive {
                ev.with(EvidenceFeature::PrimaryAf, 0.15 + 0.3 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::PrimaryAc, 5.0 + 20.0 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::NormalAf, 0.01 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::NormalAc, 0.0)
            } else {
                ev.with(EvidenceFeature::PrimaryAf, 0.05 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::PrimaryAc, 3.0 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::NormalAf, 0.3 * rng.r#gen::<f64>())
                    .with(EvidenceFeature::NormalAc, 4.0 * rng.r#gen::<f64>())
            };
            let mut r = candidate(i as u64 + 1, ev);
            r.tag = Some(FilterTag::new(if positive { "somatic" } else { "SNP" }));
            r.label = Some(positive);
            r
        })
        .collect()
}

fn small_grid() -> ParamGrid {
    ParamGrid(vec![ParamSpace {
        n_estimators: vec![10, 20],
        max_depth: vec![Some(6)],
        criterion: vec![SplitCriterion::Entropy],
        max_features: vec![MaxFeatures::Sqrt],
        bootstrap: vec![false],
    }])
}

#[test]
fn scenario_clean_high_score_is_called_and_passes() {
    let mut records = vec![candidate(100, evidence((0.20, 50.0, 10.0), (0.01, 30.0, 0.0)))];
    records[0].score = 0.9;
    assert_eq!(apply_threshold(&mut records, 0.027), 1);
    let counts = CallFilter::new().apply(&mut records);
    assert_eq!(counts.kept(), 1);

    let dir = TempDir::new().unwrap();
    let template = PathTemplate::new(format!("{}/{{sample}}.{{class}}.tsv", dir.path().display()));
    let written = ResultWriter::new(template).write(&records, VariantClass::Snv).unwrap();
    let vcf = fs::read_to_string(written[0].with_extension("vcf")).unwrap();
    assert!(vcf.starts_with("##fileformat=VCFv4.2"));
    assert!(vcf.contains("chr1\t100\t.\tA\tT\tPASS\tSCORE=0.9"));
}

#[test]
fn scenario_contaminated_normal_is_filtered() {
    let mut records = vec![candidate(100, evidence((0.20, 50.0, 10.0), (0.08, 25.0, 0.0)))];
    records[0].score = 0.9;
    apply_threshold(&mut records, 0.027);
    let counts = CallFilter::new().apply(&mut records);
    assert!(records.is_empty());
    assert_eq!(counts.normal_af_dp, 1);
}

#[test]
fn scenario_only_negatives_store_smallest_threshold() {
    let mut records: Vec<MergedRecord> = (0..20)
        .map(|i| {
            let mut r = candidate(i, Evidence::missing());
            r.label = Some(false);
            r.score = i as f64 / 100.0;
            r
        })
        .collect();
    apply_threshold(&mut records, 0.5);

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thresholds.json");
    let mut table = ThresholdTable::open_or_empty(&path).unwrap();
    let calibration = ThresholdCalibrator::default()
        .calibrate_into(&records, &mut table, &model(), VariantClass::Snv)
        .unwrap();
    assert!(calibration.curve.iter().all(|p| p.fbeta == 0.0));
    table.save().unwrap();

    let reopened = ThresholdTable::open(&path).unwrap();
    assert_eq!(reopened.threshold(&model(), VariantClass::Snv).unwrap(), 0.001);
}

#[test]
fn scenario_insertions_between_cutoffs_are_dropped() {
    let records: Vec<MergedRecord> = [(10, 0.3), (20, 0.45), (30, 0.35)]
        .into_iter()
        .map(|(pos, score)| {
            let mut r = MergedRecord::from(CandidateRecord {
                locus: locus("S1", pos, "A", "ATG"),
                replicate: Replicate::default(),
                tag: None,
                evidence: Evidence::missing(),
            });
            r.score = score;
            r
        })
        .collect();

    let dir = TempDir::new().unwrap();
    let written = ScoreSetWriter::new(dir.path())
        .with_indel_thresholds(IndelThresholds::default().with_deletion(0.2).with_insertion(0.5))
        .write_call_sets(&records, VariantClass::Indel)
        .unwrap();
    let table = fs::read_to_string(&written[0]).unwrap();
    assert_eq!(table.lines().count(), 1);
}

#[test]
fn calibration_and_filter_are_idempotent() {
    let mut records = synthetic(60, 3);
    for (i, r) in records.iter_mut().enumerate() {
        r.score = if r.is_positive() { 0.02 + i as f64 / 1000.0 } else { i as f64 / 2000.0 };
    }
    let calibrator = ThresholdCalibrator::new(ThresholdSweep::new());
    let first = calibrator.calibrate_records(&records).unwrap();
    let second = calibrator.calibrate_records(&records).unwrap();
    assert_eq!(first, second);
    assert!(first.curve.iter().all(|p| p.fbeta <= first.fbeta));

    let filter = CallFilter::new();
    apply_threshold(&mut records, first.threshold);
    filter.apply(&mut records);
    let once = records.clone();
    filter.apply(&mut records);
    assert_eq!(once, records);
}

#[test]
fn train_score_calibrate_filter() {
    let train = synthetic(200, 11);
    let mut valid = synthetic(80, 12);

    let trainer = ModelTrainer::new(VariantClass::Snv)
        .with_grid(small_grid())
        .with_n_folds(3);
    let trained = trainer.train(&model(), &train).unwrap();
    assert_eq!(trained.importances.in_order().len(), 24);
    assert_eq!(trained.forest.n_features(), 24);

    score_records(&trained.forest, &mut valid, VariantClass::Snv.features()).unwrap();
    assert!(valid.iter().all(|r| (0.0..=1.0).contains(&r.score)));

    let mut table = ThresholdTable::open_or_empty(&TempDir::new().unwrap().path().join("t.json")).unwrap();
    let calibration = ThresholdCalibrator::default()
        .calibrate_into(&valid, &mut table, &model(), VariantClass::Snv)
        .unwrap();
    assert!(calibration.fbeta > 0.5);

    apply_threshold(&mut valid, calibration.threshold);
    CallFilter::new().apply(&mut valid);
    let metrics = ThresholdMetrics::from_records(&valid, calibration.threshold, 5.0);
    assert!(metrics.confusion.recall() > 0.8);

    let summary = EvaluationReporter::new("synthetic").summarize(&valid).unwrap();
    assert!(summary.auroc > 0.8);
}

#[test]
fn training_is_deterministic() {
    let train = synthetic(120, 5);
    let unseen = synthetic(30, 6);
    let rows: Vec<Vec<f64>> = unseen
        .iter()
        .map(|r| r.feature_row(VariantClass::Snv.features()))
        .collect();

    let trainer = ModelTrainer::new(VariantClass::Snv)
        .with_grid(small_grid())
        .with_n_folds(3);
    let a = trainer.train(&model(), &train).unwrap();
    let b = trainer.train(&model(), &train).unwrap();
    assert_eq!(a.params, b.params);
    assert_eq!(
        a.forest.predict_proba_batch(&rows).unwrap(),
        b.forest.predict_proba_batch(&rows).unwrap()
    );
}
