//! Tabular and VCF writers for call sets and scored predictions.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{IndelKind, ModelName, VariantClass};
use crate::evidence::EvidenceFeature;
use crate::publish::publish;
use crate::records::MergedRecord;
use crate::template::{PathTemplate, Placeholders};

/// Evidence columns carried into result tables.
const RESULT_EVIDENCE: [EvidenceFeature; 6] = [
    EvidenceFeature::PrimaryAf,
    EvidenceFeature::PrimaryDp,
    EvidenceFeature::PrimaryAc,
    EvidenceFeature::NormalAf,
    EvidenceFeature::NormalDp,
    EvidenceFeature::NormalAc,
];

/// Round a score to the 6 decimals written to every output.
#[must_use]
pub fn round_score(score: f64) -> f64 {
    (score * 1e6).round() / 1e6
}

fn label_text(record: &MergedRecord) -> &'static str {
    match record.label {
        Some(true) => "True",
        Some(false) => "False",
        None => "NA",
    }
}

fn tag_text(record: &MergedRecord) -> &str {
    record.tag.as_ref().map_or("NA", |t| t.as_str())
}

fn replicate_text(record: &MergedRecord) -> &str {
    record.replicate.as_ref().map_or("", |r| r.as_str())
}

/// Tab-delimited writer without an inferred header; every table writes
/// its own header so empty tables still name their columns.
fn tsv_writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(out)
}

/// One row of a per-sample result table.
#[derive(Serialize)]
struct ResultRow<'a> {
    sample: &'a str,
    chrom: &'a str,
    pos: u64,
    ref_allele: &'a str,
    alt_allele: &'a str,
    replicate: &'a str,
    score: f64,
    call: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<&'static str>,
    primary_af: f64,
    primary_dp: f64,
    primary_ac: f64,
    normal_af: f64,
    normal_dp: f64,
    normal_ac: f64,
}

impl<'a> ResultRow<'a> {
    fn new(r: &'a MergedRecord, labels: bool) -> Self {
        let l = &r.locus;
        Self {
            sample: &l.sample,
            chrom: &l.chrom,
            pos: l.pos,
            ref_allele: &l.ref_allele,
            alt_allele: &l.alt_allele,
            replicate: replicate_text(r),
            score: round_score(r.score),
            call: u8::from(r.call),
            filter: labels.then(|| tag_text(r)),
            label: labels.then(|| label_text(r)),
            primary_af: r.evidence_value(EvidenceFeature::PrimaryAf),
            primary_dp: r.evidence_value(EvidenceFeature::PrimaryDp),
            primary_ac: r.evidence_value(EvidenceFeature::PrimaryAc),
            normal_af: r.evidence_value(EvidenceFeature::NormalAf),
            normal_dp: r.evidence_value(EvidenceFeature::NormalDp),
            normal_ac: r.evidence_value(EvidenceFeature::NormalAc),
        }
    }
}

const CALL_SET_HEADER: [&str; 6] = ["SAMPLE", "CHROM", "POS", "REF", "ALT", "SCORE"];

#[derive(Serialize)]
struct CallSetRow<'a> {
    sample: &'a str,
    chrom: &'a str,
    pos: u64,
    ref_allele: &'a str,
    alt_allele: &'a str,
    score: f64,
}

impl<'a> From<&'a MergedRecord> for CallSetRow<'a> {
    fn from(r: &'a MergedRecord) -> Self {
        let l = &r.locus;
        Self {
            sample: &l.sample,
            chrom: &l.chrom,
            pos: l.pos,
            ref_allele: &l.ref_allele,
            alt_allele: &l.alt_allele,
            score: round_score(r.score),
        }
    }
}

const ANNOTATED_HEADER: [&str; 9] = [
    "CHROM", "POS", "REF", "ALT", "SAMPLE", "FILTER", "LABEL", "SCORE", "REPLICATE",
];

#[derive(Serialize)]
struct AnnotatedRow<'a> {
    chrom: &'a str,
    pos: u64,
    ref_allele: &'a str,
    alt_allele: &'a str,
    sample: &'a str,
    filter: &'a str,
    label: &'static str,
    score: f64,
    replicate: &'a str,
}

impl<'a> From<&'a MergedRecord> for AnnotatedRow<'a> {
    fn from(r: &'a MergedRecord) -> Self {
        let l = &r.locus;
        Self {
            chrom: &l.chrom,
            pos: l.pos,
            ref_allele: &l.ref_allele,
            alt_allele: &l.alt_allele,
            sample: &l.sample,
            filter: tag_text(r),
            label: label_text(r),
            score: round_score(r.score),
            replicate: replicate_text(r),
        }
    }
}

fn by_sample<'a, I>(records: I) -> BTreeMap<&'a str, Vec<&'a MergedRecord>>
where
    I: IntoIterator<Item = &'a MergedRecord>,
{
    let mut groups: BTreeMap<&str, Vec<&MergedRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.locus.sample.as_str()).or_default().push(record);
    }
    groups
}

/// Layout of the VCF rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VcfStyle {
    /// `#CHROM POS ID REF ALT FILTER INFO`, FILTER `PASS`, INFO `SCORE=`.
    #[default]
    Call,
    /// Adds a FORMAT column and a `LABEL` INFO field; FILTER is `.`.
    Evaluation,
}

/// Render records as a VCF sorted by (chromosome, position).
///
/// Chromosomes sort lexicographically as strings, so `chr10` precedes
/// `chr2`; this matches the ordering of the upstream caller's outputs and
/// is not a natural sort. Records sharing chromosome, position and alleles
/// collapse to the highest-scoring one.
pub fn write_vcf(path: &Path, records: &[&MergedRecord], style: VcfStyle) -> Result<(), IoError> {
    let mut rows: Vec<&MergedRecord> = records.to_vec();
    rows.sort_by(|a, b| {
        (&a.locus.chrom, a.locus.pos, &a.locus.ref_allele, &a.locus.alt_allele)
            .cmp(&(&b.locus.chrom, b.locus.pos, &b.locus.ref_allele, &b.locus.alt_allele))
            .then(b.score.total_cmp(&a.score))
    });
    rows.dedup_by(|later, kept| {
        later.locus.chrom == kept.locus.chrom
            && later.locus.pos == kept.locus.pos
            && later.locus.ref_allele == kept.locus.ref_allele
            && later.locus.alt_allele == kept.locus.alt_allele
    });

    publish(path, |w| {
        writeln!(w, "##fileformat=VCFv4.2")?;
        writeln!(
            w,
            "##INFO=<ID=SCORE,Number=A,Type=Float,Description=\"Model assigned score\">"
        )?;
        match style {
            VcfStyle::Call => writeln!(w, "#CHROM\tPOS\tID\tREF\tALT\tFILTER\tINFO")?,
            VcfStyle::Evaluation => {
                writeln!(
                    w,
                    "##INFO=<ID=LABEL,Number=A,Type=String,Description=\"Deep sequencing result\">"
                )?;
                writeln!(w, "#CHROM\tPOS\tID\tREF\tALT\tFILTER\tFORMAT\tINFO")?;
            }
        }
        for r in &rows {
            let score = round_score(r.score);
            let l = &r.locus;
            match style {
                VcfStyle::Call => writeln!(
                    w,
                    "{}\t{}\t.\t{}\t{}\tPASS\tSCORE={score}",
                    l.chrom, l.pos, l.ref_allele, l.alt_allele
                )?,
                VcfStyle::Evaluation => writeln!(
                    w,
                    "{}\t{}\t.\t{}\t{}\t.\t.\tSCORE={score};LABEL={}",
                    l.chrom,
                    l.pos,
                    l.ref_allele,
                    l.alt_allele,
                    label_text(r)
                )?,
            }
        }
        Ok(())
    })?;
    debug!(path = %path.display(), n_rows = rows.len(), "VCF written");
    Ok(())
}

/// Writes per-sample result tables of positive calls, each with a VCF
/// sibling.
///
/// Table columns: `SAMPLE CHROM POS REF ALT REPLICATE SCORE CALL`, then
/// `FILTER LABEL` when labels are enabled, then `primary_af primary_dp
/// primary_ac normal_af normal_dp normal_ac`. Rows keep input order. The
/// VCF path is the table path with a `vcf` extension.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | model | none (`{model}` must not appear in the template) |
/// | labels | `false` |
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::UnresolvedPlaceholder`] | Template names an unset placeholder |
/// | [`IoError::OutputDirCreate`] | Output directory cannot be created |
/// | [`IoError::WriteFile`] | A file cannot be written |
#[derive(Debug, Clone)]
pub struct ResultWriter {
    template: PathTemplate,
    model: Option<ModelName>,
    labels: bool,
}

impl ResultWriter {
    /// Create a writer rendering one path per sample from `template`.
    pub fn new(template: PathTemplate) -> Self {
        Self {
            template,
            model: None,
            labels: false,
        }
    }

    /// Substitute `{model}` with this model name.
    #[must_use]
    pub fn with_model(mut self, model: ModelName) -> Self {
        self.model = Some(model);
        self
    }

    /// Include the FILTER and LABEL columns.
    #[must_use]
    pub fn with_labels(mut self, labels: bool) -> Self {
        self.labels = labels;
        self
    }

    /// Write one table and one VCF per sample present in `records`.
    ///
    /// Samples without any positive call are skipped. Returns the table
    /// paths in sample order.
    #[instrument(skip_all, fields(template = %self.template, %class, n_records = records.len()))]
    pub fn write(
        &self,
        records: &[MergedRecord],
        class: VariantClass,
    ) -> Result<Vec<PathBuf>, IoError> {
        self.write_per_sample(records, Some(class))
    }

    /// Write point mutations and indels together, one table per sample.
    ///
    /// The template must not name `{class}`.
    #[instrument(skip_all, fields(template = %self.template, n_records = records.len()))]
    pub fn write_combined(&self, records: &[MergedRecord]) -> Result<Vec<PathBuf>, IoError> {
        self.write_per_sample(records, None)
    }

    fn write_per_sample(
        &self,
        records: &[MergedRecord],
        class: Option<VariantClass>,
    ) -> Result<Vec<PathBuf>, IoError> {
        let mut written = Vec::new();
        for (sample, rows) in by_sample(records) {
            let mut placeholders = Placeholders::sample(sample);
            if let Some(class) = class {
                placeholders = placeholders.with_class(class);
            }
            if let Some(model) = &self.model {
                placeholders = placeholders.with_model(model.as_str());
            }
            let calls: Vec<&MergedRecord> = rows.into_iter().filter(|r| r.call).collect();
            if calls.is_empty() {
                debug!(sample, "no calls, result table skipped");
                continue;
            }
            let path = self.template.render(&placeholders)?;
            self.write_table(&path, &calls)?;
            write_vcf(&path.with_extension("vcf"), &calls, VcfStyle::Call)?;
            info!(sample, n_calls = calls.len(), path = %path.display(), "result table written");
            written.push(path);
        }
        Ok(written)
    }

    fn write_table(&self, path: &Path, calls: &[&MergedRecord]) -> Result<(), IoError> {
        let mut header = vec!["SAMPLE", "CHROM", "POS", "REF", "ALT", "REPLICATE", "SCORE", "CALL"];
        if self.labels {
            header.extend(["FILTER", "LABEL"]);
        }
        header.extend(RESULT_EVIDENCE.iter().map(|f| f.column()));

        publish(path, |w| {
            let mut out = tsv_writer(w);
            out.write_record(&header)?;
            for r in calls {
                out.serialize(ResultRow::new(r, self.labels))?;
            }
            out.flush()
        })
    }
}

/// Score cutoffs applied per indel direction when writing scored call sets.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | deletion | -0.67 |
/// | insertion | -0.75 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndelThresholds {
    deletion: f64,
    insertion: f64,
}

impl Default for IndelThresholds {
    fn default() -> Self {
        Self {
            deletion: -0.67,
            insertion: -0.75,
        }
    }
}

impl IndelThresholds {
    /// Set the deletion cutoff.
    #[must_use]
    pub fn with_deletion(mut self, deletion: f64) -> Self {
        self.deletion = deletion;
        self
    }

    /// Set the insertion cutoff.
    #[must_use]
    pub fn with_insertion(mut self, insertion: f64) -> Self {
        self.insertion = insertion;
        self
    }

    /// Deletion cutoff.
    #[must_use]
    pub fn deletion(&self) -> f64 {
        self.deletion
    }

    /// Insertion cutoff.
    #[must_use]
    pub fn insertion(&self) -> f64 {
        self.insertion
    }

    /// Cutoff for one indel direction.
    #[must_use]
    pub fn cutoff(&self, kind: IndelKind) -> f64 {
        match kind {
            IndelKind::Deletion => self.deletion,
            IndelKind::Insertion => self.insertion,
        }
    }
}

/// Writes externally scored predictions.
///
/// * [`ScoreSetWriter::write_annotated`]: every reconciled row in input order.
/// * [`ScoreSetWriter::write_predictions`]: the same columns sorted by score,
///   highest first.
/// * [`ScoreSetWriter::write_call_sets`]: per-sample score-thresholded
///   `SAMPLE CHROM POS REF ALT SCORE` tables with VCF siblings, named
///   `{sample}.{class}.calls.tsv` inside the output directory.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | snv threshold | 0.01 |
/// | indel thresholds | [`IndelThresholds::default`] |
/// | vcf style | [`VcfStyle::Call`] |
#[derive(Debug, Clone)]
pub struct ScoreSetWriter {
    output_dir: PathBuf,
    snv_threshold: f64,
    indel: IndelThresholds,
    vcf_style: VcfStyle,
}

impl ScoreSetWriter {
    /// Create a writer targeting `output_dir`.
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            snv_threshold: 0.01,
            indel: IndelThresholds::default(),
            vcf_style: VcfStyle::Call,
        }
    }

    /// Set the point-mutation score cutoff.
    #[must_use]
    pub fn with_snv_threshold(mut self, threshold: f64) -> Self {
        self.snv_threshold = threshold;
        self
    }

    /// Set the per-direction indel cutoffs.
    #[must_use]
    pub fn with_indel_thresholds(mut self, indel: IndelThresholds) -> Self {
        self.indel = indel;
        self
    }

    /// Set the VCF layout.
    #[must_use]
    pub fn with_vcf_style(mut self, style: VcfStyle) -> Self {
        self.vcf_style = style;
        self
    }

    /// Write `CHROM POS REF ALT SAMPLE FILTER LABEL SCORE REPLICATE` rows in
    /// input order. Missing tags are written as `NA`.
    #[instrument(skip_all, fields(path = %path.display(), n_records = records.len()))]
    pub fn write_annotated(&self, records: &[MergedRecord], path: &Path) -> Result<(), IoError> {
        let rows: Vec<&MergedRecord> = records.iter().collect();
        write_annotated_rows(path, &rows)
    }

    /// Write the annotated columns sorted by score, highest first.
    #[instrument(skip_all, fields(path = %path.display(), n_records = records.len()))]
    pub fn write_predictions(&self, records: &[MergedRecord], path: &Path) -> Result<(), IoError> {
        let mut rows: Vec<&MergedRecord> = records.iter().collect();
        rows.sort_by(|a, b| b.score.total_cmp(&a.score));
        write_annotated_rows(path, &rows)
    }

    /// Write per-sample thresholded call sets of one class.
    ///
    /// Point mutations pass with `score > snv_threshold` and are ordered by
    /// (chromosome, position). Indels are split into deletions (reference
    /// longer than alternate) and insertions, each filtered against its own
    /// cutoff, recombined and ordered by score, highest first.
    #[instrument(skip_all, fields(dir = %self.output_dir.display(), %class, n_records = records.len()))]
    pub fn write_call_sets(
        &self,
        records: &[MergedRecord],
        class: VariantClass,
    ) -> Result<Vec<PathBuf>, IoError> {
        let mut written = Vec::new();
        for (sample, rows) in by_sample(records) {
            let mut kept: Vec<&MergedRecord> = rows
                .into_iter()
                .filter(|r| r.score > self.cutoff(r, class))
                .collect();
            match class {
                VariantClass::Snv => kept.sort_by(|a, b| {
                    (&a.locus.chrom, a.locus.pos).cmp(&(&b.locus.chrom, b.locus.pos))
                }),
                VariantClass::Indel => kept.sort_by(|a, b| b.score.total_cmp(&a.score)),
            }

            let path = self
                .output_dir
                .join(format!("{sample}.{}.calls.tsv", class.as_str()));
            publish(&path, |w| {
                let mut out = tsv_writer(w);
                out.write_record(CALL_SET_HEADER)?;
                for r in &kept {
                    out.serialize(CallSetRow::from(*r))?;
                }
                out.flush()
            })?;
            write_vcf(&path.with_extension("vcf"), &kept, self.vcf_style)?;
            info!(sample, n_calls = kept.len(), path = %path.display(), "call set written");
            written.push(path);
        }
        Ok(written)
    }

    fn cutoff(&self, record: &MergedRecord, class: VariantClass) -> f64 {
        match class {
            VariantClass::Snv => self.snv_threshold,
            VariantClass::Indel => self.indel.cutoff(record.locus.indel_kind()),
        }
    }
}

fn write_annotated_rows(path: &Path, rows: &[&MergedRecord]) -> Result<(), IoError> {
    publish(path, |w| {
        let mut out = tsv_writer(w);
        out.write_record(ANNOTATED_HEADER)?;
        for r in rows {
            out.serialize(AnnotatedRow::from(*r))?;
        }
        out.flush()
    })?;
    info!(path = %path.display(), n_rows = rows.len(), "scored table written");
    Ok(())
}
