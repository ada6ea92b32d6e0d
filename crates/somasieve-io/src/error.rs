//! I/O error types for somasieve-io.

use std::path::PathBuf;

/// Errors from table parsing, record reconciliation, artifact persistence
/// and call-set writing.
///
/// Every variant that concerns a file carries its path so messages are
/// path-qualified. [`IoError::is_malformed_input`] groups the variants that
/// describe an unreadable or schema-mismatched table.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when an input table does not exist or is unreadable.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the CSV parser encounters a malformed record.
    #[error("TSV parse error in {path} at byte offset {offset}")]
    CsvParse {
        /// Path to the table.
        path: PathBuf,
        /// Byte offset where the error occurred.
        offset: u64,
        /// Underlying CSV error.
        source: csv::Error,
    },

    /// Returned when a required column is absent from the header.
    #[error("missing column \"{column}\" in {path}")]
    MissingColumn {
        /// Path to the table.
        path: PathBuf,
        /// Name of the absent column.
        column: String,
    },

    /// Returned when a cell cannot be parsed into its column's type.
    #[error("malformed value in {path}: row {row_index}, column \"{column}\", raw value \"{raw}\"")]
    MalformedField {
        /// Path to the table.
        path: PathBuf,
        /// Zero-based row index (excluding header).
        row_index: usize,
        /// Column name.
        column: String,
        /// The raw string value that failed to parse.
        raw: String,
    },

    /// Returned when a table contains a header but zero data rows and the
    /// caller requires data.
    #[error("empty table (no data rows) in {path}")]
    EmptyTable {
        /// Path to the table.
        path: PathBuf,
    },

    /// Returned when a persisted artifact (model, threshold table) is absent.
    #[error("missing {what} artifact: {path}")]
    MissingArtifact {
        /// Path that was attempted.
        path: PathBuf,
        /// Kind of artifact, e.g. `"threshold table"`.
        what: &'static str,
    },

    /// Returned when a threshold table has no entry for a model and class.
    #[error("no threshold for model \"{model}\" and class {class} in {path}")]
    MissingThreshold {
        /// Path of the threshold table.
        path: PathBuf,
        /// Model identity.
        model: String,
        /// Variant class.
        class: String,
    },

    /// Returned when a threshold outside the open interval (0, 1) is stored.
    #[error("threshold {value} for model \"{model}\" is outside (0, 1)")]
    InvalidThreshold {
        /// Model identity.
        model: String,
        /// Offending value.
        value: f64,
    },

    /// Returned when a model or run name contains characters outside `[a-zA-Z0-9_-]`.
    #[error("invalid model name \"{name}\": must match [a-zA-Z0-9_-]+")]
    InvalidModelName {
        /// The invalid name.
        name: String,
    },

    /// Returned when a sample appears in more than one partition of a model set.
    #[error("sample \"{sample}\" appears in both {first} and {second} of model set \"{model}\"")]
    OverlappingPartitions {
        /// Model set name.
        model: String,
        /// Shared sample identity.
        sample: String,
        /// First partition the sample was found in.
        first: &'static str,
        /// Second partition the sample was found in.
        second: &'static str,
    },

    /// Returned when a path template references an unknown placeholder.
    #[error("path template \"{template}\" has unresolved placeholder \"{placeholder}\"")]
    UnresolvedPlaceholder {
        /// The template text.
        template: String,
        /// The unknown placeholder name.
        placeholder: String,
    },

    /// Returned when a JSON artifact cannot be decoded.
    #[error("cannot decode JSON in {path}")]
    Json {
        /// Path to the JSON file.
        path: PathBuf,
        /// Underlying serde_json error.
        source: serde_json::Error,
    },

    /// Returned when an output directory cannot be created.
    #[error("cannot create output directory {path}")]
    OutputDirCreate {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when an output file cannot be written or published.
    #[error("cannot write file {path}")]
    WriteFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl IoError {
    /// `true` for errors describing a missing, unparseable or
    /// schema-mismatched input table.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::CsvParse { .. }
                | Self::MissingColumn { .. }
                | Self::MalformedField { .. }
                | Self::EmptyTable { .. }
        )
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::CsvParse {
            path: path.to_path_buf(),
            offset: source.position().map_or(0, |p| p.byte()),
            source,
        }
    }

    pub(crate) fn write(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.to_path_buf(),
            source,
        }
    }
}
