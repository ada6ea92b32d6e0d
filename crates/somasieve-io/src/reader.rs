//! Readers for candidate evidence, label and score tables.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::IoError;
use crate::domain::{FilterTag, Locus, Replicate, VariantClass, MISSING_EVIDENCE};
use crate::evidence::{Evidence, EvidenceFeature, N_EVIDENCE};
use crate::records::{CandidateRecord, LabelRecord, ScoreRecord};
use crate::table::{Row, Table};

/// Positional key columns shared by every table.
struct KeyColumns {
    chrom: usize,
    pos: usize,
    ref_allele: usize,
    alt_allele: usize,
}

impl KeyColumns {
    fn locate<R: std::io::Read>(table: &Table<R>) -> Result<Self, IoError> {
        Ok(Self {
            chrom: table.require("CHROM")?,
            pos: table.require("POS")?,
            ref_allele: table.require("REF")?,
            alt_allele: table.require("ALT")?,
        })
    }

    fn locus(&self, row: &Row<'_>, sample: &str) -> Result<Locus, IoError> {
        Ok(Locus {
            sample: sample.to_string(),
            chrom: row.text(self.chrom, "CHROM")?.to_string(),
            pos: row.parse(self.pos, "POS")?,
            ref_allele: row.text(self.ref_allele, "REF")?.to_string(),
            alt_allele: row.text(self.alt_allele, "ALT")?.to_string(),
        })
    }
}

/// One sample replicate's candidates, deduplicated by key.
#[derive(Debug, Clone)]
pub struct CandidateTable {
    sample: String,
    replicate: Replicate,
    records: Vec<CandidateRecord>,
}

impl CandidateTable {
    /// Sample the table belongs to.
    #[must_use]
    pub fn sample(&self) -> &str {
        &self.sample
    }

    /// Replicate the table belongs to.
    #[must_use]
    pub fn replicate(&self) -> &Replicate {
        &self.replicate
    }

    /// All records in first-seen order.
    #[must_use]
    pub fn records(&self) -> &[CandidateRecord] {
        &self.records
    }

    /// Number of distinct candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the table holds no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the table, keeping only one variant class.
    #[must_use]
    pub fn into_class(self, class: VariantClass) -> Vec<CandidateRecord> {
        self.records
            .into_iter()
            .filter(|r| r.locus.class() == class)
            .collect()
    }
}

/// Reads one sample replicate's candidate evidence table.
///
/// Expected format: tab-delimited with a header naming at least `CHROM POS
/// REF ALT` and every evidence column; `FILTER` and any extra columns are
/// optional. Evidence cells holding `.` become [`MISSING_EVIDENCE`].
/// Duplicate keys collapse to one record that keeps the first row's
/// position and the last row's values.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | replicate | `"1"` |
/// | optional | `false` |
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist and the source is not optional |
/// | [`IoError::CsvParse`] | Malformed TSV record |
/// | [`IoError::MissingColumn`] | A key or evidence column is absent |
/// | [`IoError::MalformedField`] | POS is not an integer or evidence is not a finite number or `.` |
pub struct CandidateTableReader {
    path: PathBuf,
    sample: String,
    replicate: Replicate,
    optional: bool,
}

impl CandidateTableReader {
    /// Create a reader for `sample`'s table at `path`.
    pub fn new(path: &Path, sample: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            sample: sample.to_string(),
            replicate: Replicate::default(),
            optional: false,
        }
    }

    /// Tag every record with this replicate.
    #[must_use]
    pub fn with_replicate(mut self, replicate: Replicate) -> Self {
        self.replicate = replicate;
        self
    }

    /// Treat an absent file as an empty table.
    #[must_use]
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Read, validate and deduplicate the table.
    #[instrument(skip(self), fields(path = %self.path.display(), sample = %self.sample, replicate = %self.replicate))]
    pub fn read(&self) -> Result<CandidateTable, IoError> {
        if self.optional && !self.path.exists() {
            warn!("optional candidate table absent, using empty set");
            return Ok(self.table(Vec::new()));
        }

        let mut table = Table::open(&self.path)?;
        let keys = KeyColumns::locate(&table)?;
        let filter = table.column("FILTER");
        let mut evidence_columns = [0usize; N_EVIDENCE];
        for feature in EvidenceFeature::ALL {
            evidence_columns[feature.index()] = table.require(feature.column())?;
        }

        let mut records: Vec<CandidateRecord> = Vec::new();
        let mut seen: HashMap<Locus, usize> = HashMap::new();
        let n_rows = table.for_each_row(|row| {
            let locus = keys.locus(&row, &self.sample)?;
            let tag = match filter {
                Some(i) => Some(FilterTag::new(row.text(i, "FILTER")?)),
                None => None,
            };
            let mut values = [MISSING_EVIDENCE; N_EVIDENCE];
            for feature in EvidenceFeature::ALL {
                values[feature.index()] = row.number_or(
                    evidence_columns[feature.index()],
                    feature.column(),
                    MISSING_EVIDENCE,
                )?;
            }
            let record = CandidateRecord {
                locus,
                replicate: self.replicate.clone(),
                tag,
                evidence: Evidence::from_values(values),
            };
            match seen.get(&record.locus) {
                Some(&slot) => records[slot] = record,
                None => {
                    seen.insert(record.locus.clone(), records.len());
                    records.push(record);
                }
            }
            Ok(())
        })?;

        if n_rows > records.len() {
            debug!(n_duplicates = n_rows - records.len(), "collapsed duplicate candidates");
        }
        info!(n_candidates = records.len(), "candidate table loaded");
        Ok(self.table(records))
    }

    fn table(&self, records: Vec<CandidateRecord>) -> CandidateTable {
        CandidateTable {
            sample: self.sample.clone(),
            replicate: self.replicate.clone(),
            records,
        }
    }
}

/// Reads a sample's ground-truth label table.
///
/// Accepts plain TSV (`CHROM POS REF ALT FILTER`) or a VCF-shaped file:
/// `##` meta lines are skipped and a `#CHROM` header is accepted. Rows
/// sharing a key collapse, last write wins.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed TSV record |
/// | [`IoError::MissingColumn`] | A key column or FILTER is absent |
/// | [`IoError::MalformedField`] | POS is not an integer |
pub struct LabelTableReader {
    path: PathBuf,
    sample: String,
}

impl LabelTableReader {
    /// Create a reader for `sample`'s labels at `path`.
    pub fn new(path: &Path, sample: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            sample: sample.to_string(),
        }
    }

    /// Read the labels, including rows with unknown tags.
    #[instrument(skip(self), fields(path = %self.path.display(), sample = %self.sample))]
    pub fn read(&self) -> Result<Vec<LabelRecord>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut body = String::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| IoError::FileNotFound {
                path: self.path.clone(),
                source: e,
            })?;
            if line.starts_with("##") {
                continue;
            }
            body.push_str(&line);
            body.push('\n');
        }

        let mut table = Table::from_reader(&self.path, body.as_bytes())?;
        let keys = KeyColumns::locate(&table)?;
        let filter = table.require("FILTER")?;

        let mut records: Vec<LabelRecord> = Vec::new();
        let mut seen: HashMap<Locus, usize> = HashMap::new();
        table.for_each_row(|row| {
            let record = LabelRecord {
                locus: keys.locus(&row, &self.sample)?,
                tag: FilterTag::new(row.text(filter, "FILTER")?),
            };
            match seen.get(&record.locus) {
                Some(&slot) => records[slot] = record,
                None => {
                    seen.insert(record.locus.clone(), records.len());
                    records.push(record);
                }
            }
            Ok(())
        })?;

        let n_unknown = records.iter().filter(|r| r.label().is_none()).count();
        info!(n_labels = records.len(), n_unknown, "label table loaded");
        Ok(records)
    }
}

/// Reads an external scorer's output table.
///
/// Required columns: `SAMPLE CHROM POS REF ALT SCORE`. `REPLICATE` is
/// optional and normalized through [`Replicate::new`]; extra columns are
/// ignored. This also re-reads the per-sample call tables written by
/// [`ScoreSetWriter`](crate::ScoreSetWriter).
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed TSV record |
/// | [`IoError::MissingColumn`] | A required column is absent |
/// | [`IoError::MalformedField`] | POS is not an integer or SCORE is not a finite number |
pub struct ScoreTableReader {
    path: PathBuf,
}

impl ScoreTableReader {
    /// Create a reader for the score table at `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read every score row in file order.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<ScoreRecord>, IoError> {
        let mut table = Table::open(&self.path)?;
        let keys = KeyColumns::locate(&table)?;
        let sample = table.require("SAMPLE")?;
        let score = table.require("SCORE")?;
        let replicate = table.column("REPLICATE");

        let mut records = Vec::new();
        table.for_each_row(|row| {
            let sample_name = row.text(sample, "SAMPLE")?.to_string();
            let value = row.finite(score, "SCORE")?;
            records.push(ScoreRecord {
                locus: keys.locus(&row, &sample_name)?,
                replicate: match replicate {
                    Some(i) => Replicate::new(row.text(i, "REPLICATE")?),
                    None => Replicate::default(),
                },
                score: value,
            });
            Ok(())
        })?;

        info!(n_scores = records.len(), "score table loaded");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn header() -> String {
        let mut cols = vec!["CHROM", "POS", "REF", "ALT", "FILTER"];
        cols.extend(EvidenceFeature::ALL.iter().map(|f| f.column()));
        cols.join("\t")
    }

    fn row(chrom: &str, pos: u64, r: &str, a: &str, af: &str) -> String {
        let mut cells = vec![
            chrom.to_string(),
            pos.to_string(),
            r.to_string(),
            a.to_string(),
            "PASS".to_string(),
        ];
        cells.push(af.to_string());
        cells.extend((1..N_EVIDENCE).map(|i| format!("{i}")));
        cells.join("\t")
    }

    fn write_tsv(lines: &[String]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn candidates_dedup_last_write_wins() {
        let f = write_tsv(&[
            header(),
            row("chr1", 10, "A", "T", "0.1"),
            row("chr1", 20, "A", "AT", "0.2"),
            row("chr1", 10, "A", "T", "0.3"),
        ]);
        let table = CandidateTableReader::new(f.path(), "S1").read().unwrap();
        assert_eq!(table.len(), 2);
        let first = &table.records()[0];
        assert_eq!(first.locus.pos, 10);
        assert_eq!(first.evidence.get(EvidenceFeature::PrimaryAf), 0.3);
        assert_eq!(first.replicate.as_str(), "1");
        assert_eq!(first.tag.as_ref().map(FilterTag::as_str), Some("PASS"));
    }

    #[test]
    fn dot_becomes_missing_evidence() {
        let f = write_tsv(&[header(), row("chr1", 10, "A", "T", ".")]);
        let table = CandidateTableReader::new(f.path(), "S1").read().unwrap();
        assert_eq!(
            table.records()[0].evidence.get(EvidenceFeature::PrimaryAf),
            MISSING_EVIDENCE
        );
    }

    #[test]
    fn partition_by_allele_length() {
        let f = write_tsv(&[
            header(),
            row("chr1", 10, "A", "T", "0.1"),
            row("chr1", 20, "A", "AT", "0.2"),
            row("chr1", 30, "GCC", "G", "0.2"),
        ]);
        let table = CandidateTableReader::new(f.path(), "S1")
            .with_replicate(Replicate::new("2"))
            .read()
            .unwrap();
        assert_eq!(table.replicate().as_str(), "2");
        assert_eq!(table.clone().into_class(VariantClass::Snv).len(), 1);
        assert_eq!(table.into_class(VariantClass::Indel).len(), 2);
    }

    #[test]
    fn missing_file_fails_unless_optional() {
        let path = Path::new("/nonexistent/candidates.tsv");
        let err = CandidateTableReader::new(path, "S1").read().unwrap_err();
        assert!(err.is_malformed_input());
        assert!(err.to_string().contains("/nonexistent/candidates.tsv"));

        let empty = CandidateTableReader::new(path, "S1")
            .with_optional(true)
            .read()
            .unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn missing_evidence_column() {
        let f = write_tsv(&["CHROM\tPOS\tREF\tALT\tprimary_af".to_string()]);
        let err = CandidateTableReader::new(f.path(), "S1").read().unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { ref column, .. } if column == "primary_dp"));
    }

    #[test]
    fn malformed_position() {
        let f = write_tsv(&[header(), row("chr1", 10, "A", "T", "0.1").replacen("10", "ten", 1)]);
        let err = CandidateTableReader::new(f.path(), "S1").read().unwrap_err();
        assert!(matches!(
            err,
            IoError::MalformedField { row_index: 0, ref column, .. } if column == "POS"
        ));
    }

    #[test]
    fn labels_from_vcf_shaped_file() {
        let f = write_tsv(&[
            "##fileformat=VCFv4.2".to_string(),
            "##source=truth".to_string(),
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO".to_string(),
            "chr1\t10\t.\tA\tT\t.\tsomatic\t.".to_string(),
            "chr1\t20\t.\tC\tG\t.\tdeepvariant\t.".to_string(),
            "chr1\t30\t.\tC\tG\t.\tweird\t.".to_string(),
        ]);
        let labels = LabelTableReader::new(f.path(), "S1").read().unwrap();
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].label(), Some(true));
        assert_eq!(labels[1].label(), Some(false));
        assert_eq!(labels[2].label(), None);
        assert_eq!(labels[0].locus.sample, "S1");
    }

    #[test]
    fn labels_from_plain_tsv() {
        let f = write_tsv(&[
            "CHROM\tPOS\tREF\tALT\tFILTER".to_string(),
            "chr3\t5\tA\tAT\tno mutation".to_string(),
        ]);
        let labels = LabelTableReader::new(f.path(), "S2").read().unwrap();
        assert_eq!(labels[0].label(), Some(false));
    }

    #[test]
    fn scores_normalize_replicate_and_ignore_extras() {
        let f = write_tsv(&[
            "SAMPLE\tCHROM\tPOS\tREF\tALT\tREPLICATE\tSCORE\tEXTRA".to_string(),
            "S1\tchr1\t10\tA\tT\t0\t0.75\tx".to_string(),
            "S1\tchr1\t10\tA\tT\t2.0\t0.25\tx".to_string(),
        ]);
        let scores = ScoreTableReader::new(f.path()).read().unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].replicate.as_str(), "1");
        assert_eq!(scores[1].replicate.as_str(), "2");
        assert_eq!(scores[0].score, 0.75);
    }

    #[test]
    fn scores_without_replicate_column_default() {
        let f = write_tsv(&[
            "SAMPLE\tCHROM\tPOS\tREF\tALT\tSCORE".to_string(),
            "S1\tchr1\t10\tA\tT\t0.123457".to_string(),
        ]);
        let scores = ScoreTableReader::new(f.path()).read().unwrap();
        assert_eq!(scores[0].replicate.as_str(), "1");
    }
}
