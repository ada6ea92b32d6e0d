//! Header-less sample sheet listing the candidate tables to call.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::IoError;
use crate::domain::Replicate;
use crate::model_set::SampleSpec;
use crate::template::PathTemplate;

const SAMPLE: usize = 0;
const REPLICATE: usize = 2;
const CANDIDATES: usize = 3;

/// Reads a tab-delimited sample sheet without a header.
///
/// Columns: sample, an ignored column, replicate, candidate path. A path
/// naming a `.vcf` resolves to the converted `.tsv` table beside it. Each
/// row becomes one [`SampleSpec`] carrying its own candidate path, so a
/// sample listed on several rows loads every replicate.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | Sheet doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed TSV record |
/// | [`IoError::MalformedField`] | A row has fewer than four cells or an empty sample |
/// | [`IoError::EmptyTable`] | The sheet lists no rows |
pub struct SampleSheetReader {
    path: PathBuf,
}

impl SampleSheetReader {
    /// Create a reader for the sheet at `path`.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read every row in file order.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<SampleSpec>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut specs = Vec::new();
        for (row_index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| IoError::csv(&self.path, e))?;
            let cell = |index: usize, column: &str| {
                record
                    .get(index)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| IoError::MalformedField {
                        path: self.path.clone(),
                        row_index,
                        column: column.to_string(),
                        raw: record.iter().collect::<Vec<_>>().join("\t"),
                    })
            };
            let sample = cell(SAMPLE, "sample")?;
            let replicate = Replicate::new(cell(REPLICATE, "replicate")?);
            let candidates = cell(CANDIDATES, "candidates")?;
            let table = match candidates.strip_suffix(".vcf") {
                Some(stem) => format!("{stem}.tsv"),
                None => candidates.to_string(),
            };
            specs.push(
                SampleSpec::new(sample)
                    .with_replicates(vec![replicate])
                    .with_candidates(PathTemplate::new(table)),
            );
        }

        if specs.is_empty() {
            return Err(IoError::EmptyTable {
                path: self.path.clone(),
            });
        }
        info!(n_rows = specs.len(), "sample sheet loaded");
        Ok(specs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn rows_become_specs_with_table_paths() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "S1\tx\t1\t/data/S1.r1.vcf").unwrap();
        writeln!(f, "S1\tx\t2.0\t/data/S1.r2.tsv").unwrap();
        f.flush().unwrap();

        let specs = SampleSheetReader::new(f.path()).read().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].sample, "S1");
        assert_eq!(specs[0].candidates.as_ref().unwrap().as_str(), "/data/S1.r1.tsv");
        assert_eq!(specs[1].replicates, vec![Replicate::new("2")]);
    }

    #[test]
    fn short_row_is_malformed() {
        let mut f = NamedTempFile::new().unwrap();
        writeln!(f, "S1\tx\t1").unwrap();
        f.flush().unwrap();
        let err = SampleSheetReader::new(f.path()).read().unwrap_err();
        assert!(matches!(err, IoError::MalformedField { row_index: 0, .. }));
        assert!(err.is_malformed_input());
    }
}
