//! Record types produced by the readers and the merge stage.

use crate::domain::{FilterTag, Locus, MISSING_SCORE, Replicate};
use crate::evidence::{Evidence, EvidenceFeature};

/// One candidate from an upstream caller, with its evidence.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRecord {
    /// Positional key.
    pub locus: Locus,
    /// Replicate the candidate was called in.
    pub replicate: Replicate,
    /// Raw FILTER column, if the table has one.
    pub tag: Option<FilterTag>,
    /// Numeric evidence.
    pub evidence: Evidence,
}

/// One row of a ground-truth label table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    /// Positional key.
    pub locus: Locus,
    /// Categorical truth tag.
    pub tag: FilterTag,
}

impl LabelRecord {
    /// Boolean truth, `None` when the tag is unknown.
    #[must_use]
    pub fn label(&self) -> Option<bool> {
        self.tag.category().label()
    }
}

/// One row of an external scorer's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    /// Positional key.
    pub locus: Locus,
    /// Replicate the score refers to.
    pub replicate: Replicate,
    /// Model-assigned score.
    pub score: f64,
}

/// A candidate joined with its label and, later, its score and call.
///
/// Built fresh on every run. `evidence` is `None` when the record came from
/// a label or score table with no matching candidate row; accessors then
/// return the imputed sentinels.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    /// Positional key.
    pub locus: Locus,
    /// Replicate, absent for label-only rows.
    pub replicate: Option<Replicate>,
    /// Label tag, or the candidate's own tag for unlabeled sets.
    pub tag: Option<FilterTag>,
    /// Resolved truth label. `None` for unlabeled (call mode) sets.
    pub label: Option<bool>,
    /// Score, [`MISSING_SCORE`] until one is assigned.
    pub score: f64,
    /// Binary decision after thresholding.
    pub call: bool,
    /// Candidate evidence.
    pub evidence: Option<Evidence>,
}

impl MergedRecord {
    /// `true` when the resolved label is positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.label == Some(true)
    }

    /// Evidence value, or the feature's imputed sentinel when absent.
    #[must_use]
    pub fn evidence_value(&self, feature: EvidenceFeature) -> f64 {
        self.evidence
            .as_ref()
            .map_or_else(|| feature.imputed(), |e| e.get(feature))
    }

    /// Classifier input row for the given features.
    #[must_use]
    pub fn feature_row(&self, features: &[EvidenceFeature]) -> Vec<f64> {
        features.iter().map(|&f| self.evidence_value(f)).collect()
    }
}

impl From<CandidateRecord> for MergedRecord {
    /// Unlabeled record, as used when calling without ground truth.
    fn from(candidate: CandidateRecord) -> Self {
        Self {
            locus: candidate.locus,
            replicate: Some(candidate.replicate),
            tag: candidate.tag,
            label: None,
            score: MISSING_SCORE,
            call: false,
            evidence: Some(candidate.evidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IMPUTED_COUNT, IMPUTED_FRACTION};

    fn candidate() -> CandidateRecord {
        CandidateRecord {
            locus: Locus {
                sample: "S1".into(),
                chrom: "chr2".into(),
                pos: 7,
                ref_allele: "G".into(),
                alt_allele: "A".into(),
            },
            replicate: Replicate::default(),
            tag: None,
            evidence: Evidence::missing().with(EvidenceFeature::NormalDp, 30.0),
        }
    }

    #[test]
    fn unlabeled_conversion_keeps_evidence() {
        let merged = MergedRecord::from(candidate());
        assert_eq!(merged.label, None);
        assert!(!merged.is_positive());
        assert_eq!(merged.score, MISSING_SCORE);
        assert_eq!(merged.evidence_value(EvidenceFeature::NormalDp), 30.0);
    }

    #[test]
    fn absent_evidence_is_imputed() {
        let mut merged = MergedRecord::from(candidate());
        merged.evidence = None;
        assert_eq!(merged.evidence_value(EvidenceFeature::NormalAf), IMPUTED_FRACTION);
        assert_eq!(merged.evidence_value(EvidenceFeature::PrimaryAc), IMPUTED_COUNT);
        assert_eq!(
            merged.feature_row(&[EvidenceFeature::PrimaryDp, EvidenceFeature::PrimaryAf]),
            vec![IMPUTED_COUNT, IMPUTED_FRACTION]
        );
    }
}
