//! Model persistence via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::Forest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 2;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    n_trees: usize,
    feature_names: Vec<String>,
    forest: Forest,
}

impl Forest {
    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: self.trees.len(),
            feature_names: self.feature_names.clone(),
            forest: self.clone(),
        };
        let bytes = bincode::serialize(&envelope)
            .map_err(|source| ForestError::SerializeModel { source })?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ForestError::WriteModel {
                path: path.to_path_buf(),
                source,
            })?;
        }
        // sibling temp file then rename, so a reader never sees a partial model
        let file_name = path
            .file_name()
            .map_or_else(|| "model".into(), |n| n.to_string_lossy().into_owned());
        let tmp = path.with_file_name(format!(".{file_name}.tmp"));
        std::fs::write(&tmp, &bytes)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|source| {
                let _ = std::fs::remove_file(&tmp);
                ForestError::WriteModel {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        info!(size_bytes = bytes.len(), n_trees = self.trees.len(), "model saved");
        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|source| ForestError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;
        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|source| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            n_trees = envelope.n_trees,
            n_features = envelope.feature_names.len(),
            "model loaded"
        );
        Ok(envelope.forest)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use crate::config::ExtraTreesConfig;
    use crate::forest::Forest;

    fn train_simple_model() -> Forest {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        let labels = vec![false, false, false, true, true, true];
        let names = vec!["x".to_string(), "y".to_string()];
        ExtraTreesConfig::new(5)
            .unwrap()
            .with_seed(42)
            .fit(&features, &labels, &names)
            .unwrap()
            .into_forest()
    }

    #[test]
    fn reload_gives_identical_probabilities() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("models").join("snv.bin");

        let forest = train_simple_model();
        forest.save(&model_path).unwrap();
        let loaded = Forest::load(&model_path).unwrap();

        for sample in [vec![1.5, 0.0], vec![11.0, 0.0], vec![5.0, 0.0]] {
            assert_eq!(
                forest.predict_proba(&sample).unwrap(),
                loaded.predict_proba(&sample).unwrap()
            );
        }
        assert_eq!(loaded.feature_names(), forest.feature_names());
    }

    #[test]
    fn missing_file_is_reported_as_missing() {
        let dir = TempDir::new().unwrap();
        let err = Forest::load(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, crate::ForestError::ReadModel { .. }));
        assert!(err.is_missing_file());
    }

    #[test]
    fn corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = Forest::load(&path).unwrap_err();
        assert!(matches!(err, crate::ForestError::DeserializeModel { .. }));
        assert!(!err.is_missing_file());
    }
}
