//! Named train/valid/test sample partitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::IoError;
use crate::domain::{ModelName, Replicate};
use crate::template::PathTemplate;

/// One of the three partitions of a [`ModelSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    /// Samples the classifier is fit on.
    Train,
    /// Samples the threshold is calibrated on.
    Valid,
    /// Samples held back for reporting.
    Test,
}

impl Partition {
    /// All partitions, in workflow order.
    pub const ALL: [Self; 3] = [Self::Train, Self::Valid, Self::Test];

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SampleSpecRepr {
    Name(String),
    Full {
        sample: String,
        #[serde(default)]
        replicates: Vec<Replicate>,
        #[serde(default)]
        candidates: Option<PathTemplate>,
    },
}

/// A sample with its replicates and an optional candidate-table override.
///
/// Deserializes from a bare name (`"S1"`, replicate `"1"`) or an object
/// `{"sample": "S1", "replicates": ["1", "2"], "candidates": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SampleSpecRepr")]
pub struct SampleSpec {
    /// Sample identity.
    pub sample: String,
    /// Replicates to load, never empty.
    pub replicates: Vec<Replicate>,
    /// Candidate-table path used instead of the pipeline-wide template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<PathTemplate>,
}

impl SampleSpec {
    /// A single-replicate sample.
    pub fn new(sample: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
            replicates: vec![Replicate::default()],
            candidates: None,
        }
    }

    /// Replace the replicate list. An empty list means the default replicate.
    #[must_use]
    pub fn with_replicates(mut self, replicates: Vec<Replicate>) -> Self {
        self.replicates = if replicates.is_empty() {
            vec![Replicate::default()]
        } else {
            replicates
        };
        self
    }

    /// Override the candidate table location.
    #[must_use]
    pub fn with_candidates(mut self, candidates: PathTemplate) -> Self {
        self.candidates = Some(candidates);
        self
    }
}

impl From<SampleSpecRepr> for SampleSpec {
    fn from(repr: SampleSpecRepr) -> Self {
        match repr {
            SampleSpecRepr::Name(sample) => Self::new(sample),
            SampleSpecRepr::Full {
                sample,
                replicates,
                candidates,
            } => Self {
                candidates,
                ..Self::new(sample).with_replicates(replicates)
            },
        }
    }
}

/// A model identity with its sample partitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSet {
    /// Model identity, used in file names and the threshold table.
    pub name: ModelName,
    /// Fit samples.
    #[serde(default)]
    pub train: Vec<SampleSpec>,
    /// Calibration samples.
    #[serde(default)]
    pub valid: Vec<SampleSpec>,
    /// Reporting samples.
    #[serde(default)]
    pub test: Vec<SampleSpec>,
}

impl ModelSet {
    /// Samples of one partition.
    #[must_use]
    pub fn partition(&self, partition: Partition) -> &[SampleSpec] {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }

    /// Check that no sample appears in two partitions.
    ///
    /// Overlap across different model sets is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OverlappingPartitions`] naming the first shared sample.
    pub fn validate(&self) -> Result<(), IoError> {
        let mut owner: HashMap<&str, Partition> = HashMap::new();
        for partition in Partition::ALL {
            for spec in self.partition(partition) {
                match owner.get(spec.sample.as_str()) {
                    Some(&first) if first != partition => {
                        return Err(IoError::OverlappingPartitions {
                            model: self.name.to_string(),
                            sample: spec.sample.clone(),
                            first: first.as_str(),
                            second: partition.as_str(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        owner.insert(&spec.sample, partition);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_set(json: &str) -> ModelSet {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn samples_from_names_or_objects() {
        let set = model_set(
            r#"{
                "name": "MZ_PC_1_Model",
                "train": ["A", {"sample": "B", "replicates": ["1", "2"]}],
                "valid": [{"sample": "C", "candidates": "public/{sample}.tsv"}],
                "test": ["D"]
            }"#,
        );
        assert_eq!(set.train[0], SampleSpec::new("A"));
        assert_eq!(set.train[1].replicates.len(), 2);
        assert_eq!(set.valid[0].replicates, vec![Replicate::default()]);
        assert_eq!(
            set.valid[0].candidates.as_ref().map(PathTemplate::as_str),
            Some("public/{sample}.tsv")
        );
        assert!(set.validate().is_ok());
    }

    #[test]
    fn overlapping_partitions_rejected() {
        let set = model_set(r#"{"name": "M", "train": ["A", "B"], "test": ["B"]}"#);
        let err = set.validate().unwrap_err();
        assert!(matches!(
            err,
            IoError::OverlappingPartitions { ref sample, first: "train", second: "test", .. } if sample == "B"
        ));
    }

    #[test]
    fn invalid_model_name_rejected() {
        assert!(serde_json::from_str::<ModelSet>(r#"{"name": "bad name"}"#).is_err());
    }
}
