//! Persisted decision thresholds keyed by model identity and variant class.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::IoError;
use crate::domain::{ModelName, VariantClass};
use crate::publish::publish;

/// Mapping `(model, class) -> threshold` backed by a JSON file.
///
/// On disk: `{"Production_Model": {"snv": 0.027, "indel": 0.014}, ...}`.
/// Thresholds lie in the open interval (0, 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    path: PathBuf,
    entries: BTreeMap<ModelName, BTreeMap<VariantClass, f64>>,
}

impl ThresholdTable {
    /// Open an existing table.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::MissingArtifact`] | File does not exist |
    /// | [`IoError::FileNotFound`] | File exists but cannot be read |
    /// | [`IoError::Json`] | File is not a valid table |
    /// | [`IoError::InvalidThreshold`] | A stored value is outside (0, 1) |
    #[instrument(fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, IoError> {
        if !path.exists() {
            return Err(IoError::MissingArtifact {
                path: path.to_path_buf(),
                what: "threshold table",
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| IoError::FileNotFound {
            path: path.to_path_buf(),
            source: e,
        })?;
        let entries: BTreeMap<ModelName, BTreeMap<VariantClass, f64>> =
            serde_json::from_str(&text).map_err(|e| IoError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        for (model, classes) in &entries {
            for &value in classes.values() {
                check(model, value)?;
            }
        }
        info!(n_models = entries.len(), "threshold table loaded");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Open an existing table, or start an empty one at `path`.
    ///
    /// # Errors
    ///
    /// As [`ThresholdTable::open`], except that an absent file is not an error.
    pub fn open_or_empty(path: &Path) -> Result<Self, IoError> {
        match Self::open(path) {
            Err(IoError::MissingArtifact { .. }) => {
                warn!(path = %path.display(), "no threshold table yet, starting empty");
                Ok(Self {
                    path: path.to_path_buf(),
                    entries: BTreeMap::new(),
                })
            }
            other => other,
        }
    }

    /// Stored threshold, if any.
    #[must_use]
    pub fn get(&self, model: &ModelName, class: VariantClass) -> Option<f64> {
        self.entries.get(model).and_then(|c| c.get(&class)).copied()
    }

    /// Stored threshold, required.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingThreshold`] when no entry exists.
    pub fn threshold(&self, model: &ModelName, class: VariantClass) -> Result<f64, IoError> {
        self.get(model, class).ok_or_else(|| IoError::MissingThreshold {
            path: self.path.clone(),
            model: model.to_string(),
            class: class.to_string(),
        })
    }

    /// Store a threshold, returning the previous value.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidThreshold`] for values outside (0, 1).
    pub fn set(
        &mut self,
        model: &ModelName,
        class: VariantClass,
        value: f64,
    ) -> Result<Option<f64>, IoError> {
        check(model, value)?;
        Ok(self
            .entries
            .entry(model.clone())
            .or_default()
            .insert(class, value))
    }

    /// Path the table was opened from and is saved to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically write the table back to its path.
    ///
    /// # Errors
    ///
    /// See [`publish`](crate::publish).
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn save(&self) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| IoError::Json {
            path: self.path.clone(),
            source: e,
        })?;
        publish(&self.path, |w| writeln!(w, "{json}"))?;
        info!(n_models = self.entries.len(), "threshold table saved");
        Ok(())
    }
}

fn check(model: &ModelName, value: f64) -> Result<(), IoError> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(IoError::InvalidThreshold {
            model: model.to_string(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn model(name: &str) -> ModelName {
        ModelName::new(name.to_string()).unwrap()
    }

    #[test]
    fn missing_file_is_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let err = ThresholdTable::open(&dir.path().join("thresholds.json")).unwrap_err();
        assert!(matches!(err, IoError::MissingArtifact { what: "threshold table", .. }));
    }

    #[test]
    fn save_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("thresholds.json");
        let mut table = ThresholdTable::open_or_empty(&path).unwrap();
        let production = model("Production_Model");
        assert_eq!(table.set(&production, VariantClass::Snv, 0.027).unwrap(), None);
        table.set(&production, VariantClass::Indel, 0.014).unwrap();
        assert_eq!(table.set(&production, VariantClass::Snv, 0.03).unwrap(), Some(0.027));
        table.save().unwrap();

        let reopened = ThresholdTable::open(&path).unwrap();
        assert_eq!(reopened.get(&production, VariantClass::Snv), Some(0.03));
        assert_eq!(reopened.threshold(&production, VariantClass::Indel).unwrap(), 0.014);
        assert!(matches!(
            reopened.threshold(&model("COLO_829_Model"), VariantClass::Snv),
            Err(IoError::MissingThreshold { .. })
        ));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"snv\""));
    }

    #[test]
    fn rejects_out_of_range() {
        let dir = TempDir::new().unwrap();
        let mut table = ThresholdTable::open_or_empty(&dir.path().join("t.json")).unwrap();
        for bad in [0.0, 1.0, -0.5, f64::NAN] {
            assert!(matches!(
                table.set(&model("M"), VariantClass::Snv, bad),
                Err(IoError::InvalidThreshold { .. })
            ));
        }
    }

    #[test]
    fn corrupt_file_is_json_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.json");
        std::fs::write(&path, "{\"M\": {\"snv\": \"high\"}}").unwrap();
        assert!(matches!(ThresholdTable::open(&path), Err(IoError::Json { .. })));
    }
}
