//! Header-addressed access to tab-delimited tables.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::StringRecord;

use crate::IoError;

/// A tab-delimited table whose columns are looked up by header name.
///
/// A leading `#` on the first header cell is stripped so that VCF-shaped
/// headers (`#CHROM`) resolve like plain ones.
pub(crate) struct Table<R> {
    path: PathBuf,
    reader: csv::Reader<R>,
    columns: HashMap<String, usize>,
}

impl Table<std::fs::File> {
    pub(crate) fn open(path: &Path) -> Result<Self, IoError> {
        let file = std::fs::File::open(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_reader(path, file)
    }
}

impl<R: Read> Table<R> {
    pub(crate) fn from_reader(path: &Path, source: R) -> Result<Self, IoError> {
        // flexible(true) so short rows surface as a named missing cell
        // instead of a low-level CsvParse error.
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);
        let header = reader.headers().map_err(|e| IoError::csv(path, e))?;
        let columns = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().trim_start_matches('#').to_string(), i))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            columns,
        })
    }

    /// Index of a column that must be present.
    pub(crate) fn require(&self, name: &str) -> Result<usize, IoError> {
        self.columns
            .get(name)
            .copied()
            .ok_or_else(|| IoError::MissingColumn {
                path: self.path.clone(),
                column: name.to_string(),
            })
    }

    /// Index of an optional column.
    pub(crate) fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    /// Visit every data row in order.
    pub(crate) fn for_each_row<F>(&mut self, mut visit: F) -> Result<usize, IoError>
    where
        F: FnMut(Row<'_>) -> Result<(), IoError>,
    {
        let mut record = StringRecord::new();
        let mut row_index = 0;
        loop {
            let more = self
                .reader
                .read_record(&mut record)
                .map_err(|e| IoError::csv(&self.path, e))?;
            if !more {
                break;
            }
            visit(Row {
                path: &self.path,
                row_index,
                record: &record,
            })?;
            row_index += 1;
        }
        Ok(row_index)
    }
}

/// One data row, with path-qualified field accessors.
pub(crate) struct Row<'a> {
    path: &'a Path,
    row_index: usize,
    record: &'a StringRecord,
}

impl Row<'_> {
    pub(crate) fn text(&self, index: usize, column: &str) -> Result<&str, IoError> {
        self.record
            .get(index)
            .map(str::trim)
            .ok_or_else(|| self.malformed(column, ""))
    }

    pub(crate) fn parse<T: FromStr>(&self, index: usize, column: &str) -> Result<T, IoError> {
        let raw = self.text(index, column)?;
        raw.parse().map_err(|_| self.malformed(column, raw))
    }

    /// Finite float, or `placeholder` when the cell holds `.`.
    pub(crate) fn number_or(
        &self,
        index: usize,
        column: &str,
        placeholder: f64,
    ) -> Result<f64, IoError> {
        if self.text(index, column)? == "." {
            return Ok(placeholder);
        }
        self.finite(index, column)
    }

    pub(crate) fn finite(&self, index: usize, column: &str) -> Result<f64, IoError> {
        let raw = self.text(index, column)?;
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(self.malformed(column, raw)),
        }
    }

    fn malformed(&self, column: &str, raw: &str) -> IoError {
        IoError::MalformedField {
            path: self.path.to_path_buf(),
            row_index: self.row_index,
            column: column.to_string(),
            raw: raw.to_string(),
        }
    }
}
