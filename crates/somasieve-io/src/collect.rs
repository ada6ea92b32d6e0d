//! Assembly of per-partition record sets from sample specifications.

use tracing::{info, instrument};

use crate::IoError;
use crate::domain::VariantClass;
use crate::merge::{UnknownPolicy, merge_labels};
use crate::model_set::SampleSpec;
use crate::reader::{CandidateTableReader, LabelTableReader};
use crate::records::{CandidateRecord, MergedRecord};
use crate::template::{PathTemplate, Placeholders};

/// Loads candidates for a list of samples, optionally joining labels.
///
/// Every replicate of a sample is read from the candidate template (or the
/// sample's own override) and tagged with its replicate. With labels
/// configured, the sample's label table is read once and merged under the
/// configured [`UnknownPolicy`]; without labels the records are returned
/// unlabeled.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | labels | none (unlabeled) |
/// | optional candidates | `false` |
///
/// # Errors
///
/// Any reader error aborts the load; see [`CandidateTableReader`] and
/// [`LabelTableReader`]. Unrenderable templates fail with
/// [`IoError::UnresolvedPlaceholder`].
#[derive(Debug, Clone)]
pub struct SampleSetLoader {
    candidates: PathTemplate,
    labels: Option<(PathTemplate, UnknownPolicy)>,
    optional_candidates: bool,
}

impl SampleSetLoader {
    /// Create a loader reading candidates from `candidates`.
    pub fn new(candidates: PathTemplate) -> Self {
        Self {
            candidates,
            labels: None,
            optional_candidates: false,
        }
    }

    /// Join labels read from `labels` under `policy`.
    #[must_use]
    pub fn with_labels(mut self, labels: PathTemplate, policy: UnknownPolicy) -> Self {
        self.labels = Some((labels, policy));
        self
    }

    /// Treat absent candidate tables as empty.
    #[must_use]
    pub fn with_optional_candidates(mut self, optional: bool) -> Self {
        self.optional_candidates = optional;
        self
    }

    /// Candidates of one class for one sample, all replicates.
    pub fn load_candidates(
        &self,
        spec: &SampleSpec,
        class: VariantClass,
    ) -> Result<Vec<CandidateRecord>, IoError> {
        let template = spec.candidates.as_ref().unwrap_or(&self.candidates);
        let mut records = Vec::new();
        for replicate in &spec.replicates {
            let path = template.render(
                &Placeholders::sample(&spec.sample).with_replicate(replicate.as_str()),
            )?;
            let table = CandidateTableReader::new(&path, &spec.sample)
                .with_replicate(replicate.clone())
                .with_optional(self.optional_candidates)
                .read()?;
            records.extend(table.into_class(class));
        }
        Ok(records)
    }

    /// Merged records of one class for one sample.
    #[instrument(skip_all, fields(sample = %spec.sample, %class))]
    pub fn load_sample(
        &self,
        spec: &SampleSpec,
        class: VariantClass,
    ) -> Result<Vec<MergedRecord>, IoError> {
        let candidates = self.load_candidates(spec, class)?;
        match &self.labels {
            Some((template, policy)) => {
                let path = template.render(&Placeholders::sample(&spec.sample))?;
                let labels = LabelTableReader::new(&path, &spec.sample).read()?;
                Ok(merge_labels(candidates, &labels, *policy))
            }
            None => Ok(candidates.into_iter().map(MergedRecord::from).collect()),
        }
    }

    /// Concatenated records of one class for every sample, in list order.
    #[instrument(skip_all, fields(n_samples = specs.len(), %class))]
    pub fn load(
        &self,
        specs: &[SampleSpec],
        class: VariantClass,
    ) -> Result<Vec<MergedRecord>, IoError> {
        let mut records = Vec::new();
        for spec in specs {
            records.extend(self.load_sample(spec, class)?);
        }
        info!(
            n_records = records.len(),
            n_positive = records.iter().filter(|r| r.is_positive()).count(),
            "sample set loaded"
        );
        Ok(records)
    }
}
