//! Domain types for somasieve-io: variant keys, classes, filter tags and
//! the sentinel values used for unavailable numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::IoError;

/// Placeholder for an evidence cell holding the literal `.` in a candidate table.
pub const MISSING_EVIDENCE: f64 = -100.0;

/// Score assigned to a merged record that has no prediction.
pub const MISSING_SCORE: f64 = -1.00001;

/// Imputed value for an absent depth or allele count.
pub const IMPUTED_COUNT: f64 = -1.0;

/// Imputed value for an absent allele fraction.
pub const IMPUTED_FRACTION: f64 = -0.00001;

/// Replicate identifier used when a table does not name one.
pub const DEFAULT_REPLICATE: &str = "1";

/// Positional key of a variant within a sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locus {
    /// Sample identity.
    pub sample: String,
    /// Chromosome name as written in the source table.
    pub chrom: String,
    /// 1-based position.
    pub pos: u64,
    /// Reference allele.
    pub ref_allele: String,
    /// Alternate allele.
    pub alt_allele: String,
}

impl Locus {
    /// Computed identifier `sample-chrom-pos-ref-alt`.
    #[must_use]
    pub fn id(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.sample, self.chrom, self.pos, self.ref_allele, self.alt_allele
        )
    }

    /// Point mutation when the alleles have equal length, indel otherwise.
    #[must_use]
    pub fn class(&self) -> VariantClass {
        VariantClass::of(&self.ref_allele, &self.alt_allele)
    }

    /// Deletion when the reference allele is longer than the alternate.
    #[must_use]
    pub fn indel_kind(&self) -> IndelKind {
        if self.ref_allele.len() > self.alt_allele.len() {
            IndelKind::Deletion
        } else {
            IndelKind::Insertion
        }
    }
}

/// A replicate identifier.
///
/// Integral spellings are normalized (`"1.0"` becomes `"1"`) and replicate
/// `"0"`, which some scorers emit for single-replicate samples, maps to `"1"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Replicate(String);

impl Replicate {
    /// Normalize a raw replicate cell.
    pub fn new(raw: &str) -> Self {
        let raw = raw.trim();
        let normalized = match raw.parse::<f64>() {
            Ok(v) if v.fract() == 0.0 && v >= 0.0 => (v as u64).max(1).to_string(),
            _ if raw.is_empty() => DEFAULT_REPLICATE.to_string(),
            _ => raw.to_string(),
        };
        Self(normalized)
    }

    /// Return the replicate as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Replicate {
    fn default() -> Self {
        Self(DEFAULT_REPLICATE.to_string())
    }
}

impl From<String> for Replicate {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<Replicate> for String {
    fn from(r: Replicate) -> Self {
        r.0
    }
}

impl fmt::Display for Replicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point mutation or insertion/deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantClass {
    /// Reference and alternate alleles of equal length.
    Snv,
    /// Reference and alternate alleles of different length.
    Indel,
}

impl VariantClass {
    /// Both classes, in processing order.
    pub const ALL: [Self; 2] = [Self::Snv, Self::Indel];

    /// Classify a ref/alt allele pair.
    #[must_use]
    pub fn of(ref_allele: &str, alt_allele: &str) -> Self {
        if ref_allele.len() == alt_allele.len() {
            Self::Snv
        } else {
            Self::Indel
        }
    }

    /// Lowercase tag used in file names and path templates.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Snv => "snv",
            Self::Indel => "indel",
        }
    }
}

impl fmt::Display for VariantClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an indel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndelKind {
    /// Reference longer than alternate.
    Deletion,
    /// Everything else, including complex substitutions.
    Insertion,
}

/// Truth category of a label filter tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelCategory {
    /// Confirmed tumor-specific mutation.
    Somatic,
    /// Inherited variant.
    Germline,
    /// Deep sequencing found nothing at the position.
    NoMutation,
    /// Tag outside every known vocabulary.
    Unknown,
}

impl LabelCategory {
    /// Boolean truth label, `None` for [`LabelCategory::Unknown`].
    #[must_use]
    pub fn label(self) -> Option<bool> {
        match self {
            Self::Somatic => Some(true),
            Self::Germline | Self::NoMutation => Some(false),
            Self::Unknown => None,
        }
    }
}

/// A raw FILTER tag, from a candidate or label table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterTag(String);

impl FilterTag {
    /// Wrap a raw tag, trimming surrounding whitespace.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    /// Return the tag as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Total mapping onto the label vocabulary. Matching is case-insensitive.
    #[must_use]
    pub fn category(&self) -> LabelCategory {
        match self.0.to_ascii_lowercase().as_str() {
            "somatic" | "consensus" => LabelCategory::Somatic,
            "snp" | "mnp" | "deepvariant" => LabelCategory::Germline,
            "no mutation" | "no_mutation" => LabelCategory::NoMutation,
            _ => LabelCategory::Unknown,
        }
    }

    /// Separately sequenced, low-confidence germline call.
    #[must_use]
    pub fn is_low_confidence_germline(&self) -> bool {
        self.0.eq_ignore_ascii_case("deepvariant")
    }
}

impl fmt::Display for FilterTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated model identity, used in file names and the threshold table.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModelName(String);

impl ModelName {
    /// Parse and validate a model name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidModelName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: String) -> Result<Self, IoError> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(IoError::InvalidModelName { name });
        }
        Ok(Self(name))
    }

    /// Return the model name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModelName {
    type Error = IoError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl From<ModelName> for String {
    fn from(name: ModelName) -> Self {
        name.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locus(ref_allele: &str, alt_allele: &str) -> Locus {
        Locus {
            sample: "S1".into(),
            chrom: "chr1".into(),
            pos: 100,
            ref_allele: ref_allele.into(),
            alt_allele: alt_allele.into(),
        }
    }

    #[test]
    fn locus_id_joins_key_fields() {
        assert_eq!(locus("A", "T").id(), "S1-chr1-100-A-T");
    }

    #[test]
    fn class_by_allele_length() {
        assert_eq!(locus("A", "T").class(), VariantClass::Snv);
        assert_eq!(locus("AC", "GT").class(), VariantClass::Snv);
        assert_eq!(locus("A", "AT").class(), VariantClass::Indel);
        assert_eq!(locus("ATT", "A").indel_kind(), IndelKind::Deletion);
        assert_eq!(locus("A", "ATT").indel_kind(), IndelKind::Insertion);
    }

    #[test]
    fn replicate_normalization() {
        assert_eq!(Replicate::new("0").as_str(), "1");
        assert_eq!(Replicate::new("1.0").as_str(), "1");
        assert_eq!(Replicate::new("2").as_str(), "2");
        assert_eq!(Replicate::new("").as_str(), "1");
        assert_eq!(Replicate::new("rep_b").as_str(), "rep_b");
        assert_eq!(Replicate::default().as_str(), DEFAULT_REPLICATE);
    }

    #[test]
    fn filter_tag_vocabulary_is_total() {
        assert_eq!(FilterTag::new("somatic").category(), LabelCategory::Somatic);
        assert_eq!(FilterTag::new("CONSENSUS").category(), LabelCategory::Somatic);
        assert_eq!(FilterTag::new("SNP").category(), LabelCategory::Germline);
        assert_eq!(FilterTag::new("MNP").category(), LabelCategory::Germline);
        assert_eq!(FilterTag::new("deepvariant").category(), LabelCategory::Germline);
        assert_eq!(FilterTag::new("no mutation").category(), LabelCategory::NoMutation);
        assert_eq!(FilterTag::new("no_mutation").category(), LabelCategory::NoMutation);
        assert_eq!(FilterTag::new("PASS").category(), LabelCategory::Unknown);
        assert_eq!(LabelCategory::Unknown.label(), None);
        assert_eq!(LabelCategory::NoMutation.label(), Some(false));
        assert!(FilterTag::new("DeepVariant").is_low_confidence_germline());
    }

    #[test]
    fn model_name_valid() {
        assert!(ModelName::new("Production_Model".into()).is_ok());
        assert!(ModelName::new("mz-pc-1".into()).is_ok());
    }

    #[test]
    fn model_name_rejects_bad_chars() {
        for bad in ["", "has space", "a/b", "x.y"] {
            assert!(matches!(
                ModelName::new(bad.to_string()),
                Err(IoError::InvalidModelName { .. })
            ));
        }
    }

    #[test]
    fn model_name_serde_validates() {
        let ok: ModelName = serde_json::from_str("\"COLO_829_Model\"").unwrap();
        assert_eq!(ok.as_str(), "COLO_829_Model");
        assert!(serde_json::from_str::<ModelName>("\"bad name\"").is_err());
    }
}
