//! Rule-based sanity filter applied after thresholding.

use serde::{Deserialize, Serialize};
use somasieve_io::{EvidenceFeature, MergedRecord};
use tracing::debug;

/// Drops candidates whose evidence is biologically implausible for a somatic
/// call. Each rule removes a row independently:
///
/// 1. normal AF above `max_normal_af` **and** normal depth above `max_normal_dp`
/// 2. normal allele count at or above `max_normal_ac`
/// 3. primary allele count at or below `min_primary_ac`
/// 4. primary AF at or below `min_primary_af`
///
/// Sentinel values fail rules 3 and 4, so rows missing primary evidence
/// never pass.
///
/// # Defaults
///
/// | Parameter        | Default |
/// |------------------|---------|
/// | `max_normal_af`  | 0.05    |
/// | `max_normal_dp`  | 20      |
/// | `max_normal_ac`  | 3       |
/// | `min_primary_ac` | 2       |
/// | `min_primary_af` | 0.01    |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallFilter {
    max_normal_af: f64,
    max_normal_dp: f64,
    max_normal_ac: f64,
    min_primary_ac: f64,
    min_primary_af: f64,
}

impl Default for CallFilter {
    fn default() -> Self {
        Self {
            max_normal_af: 0.05,
            max_normal_dp: 20.0,
            max_normal_ac: 3.0,
            min_primary_ac: 2.0,
            min_primary_af: 0.01,
        }
    }
}

/// Rows removed by each rule in one [`CallFilter::apply`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FilterCounts {
    /// Rows before filtering.
    pub input: usize,
    /// Removed for normal AF and depth.
    pub normal_af_dp: usize,
    /// Removed for normal allele count.
    pub normal_ac: usize,
    /// Removed for primary allele count.
    pub primary_ac: usize,
    /// Removed for primary AF.
    pub primary_af: usize,
}

impl FilterCounts {
    /// Rows remaining.
    #[must_use]
    pub fn kept(&self) -> usize {
        self.input - self.normal_af_dp - self.normal_ac - self.primary_ac - self.primary_af
    }
}

impl CallFilter {
    /// Filter with default cut-offs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the normal AF and depth that together reject a row.
    #[must_use]
    pub fn with_normal_contamination(mut self, max_af: f64, max_dp: f64) -> Self {
        self.max_normal_af = max_af;
        self.max_normal_dp = max_dp;
        self
    }

    /// Set the normal allele count at which a row is rejected.
    #[must_use]
    pub fn with_max_normal_ac(mut self, max_ac: f64) -> Self {
        self.max_normal_ac = max_ac;
        self
    }

    /// Set the primary allele count a row must exceed.
    #[must_use]
    pub fn with_min_primary_ac(mut self, min_ac: f64) -> Self {
        self.min_primary_ac = min_ac;
        self
    }

    /// Set the primary AF a row must exceed.
    #[must_use]
    pub fn with_min_primary_af(mut self, min_af: f64) -> Self {
        self.min_primary_af = min_af;
        self
    }

    fn rejecting_rule(&self, record: &MergedRecord) -> Option<usize> {
        let value = |f| record.evidence_value(f);
        if value(EvidenceFeature::NormalAf) > self.max_normal_af
            && value(EvidenceFeature::NormalDp) > self.max_normal_dp
        {
            Some(0)
        } else if value(EvidenceFeature::NormalAc) >= self.max_normal_ac {
            Some(1)
        } else if value(EvidenceFeature::PrimaryAc) <= self.min_primary_ac {
            Some(2)
        } else if value(EvidenceFeature::PrimaryAf) <= self.min_primary_af {
            Some(3)
        } else {
            None
        }
    }

    /// `true` when no rule rejects the record.
    #[must_use]
    pub fn passes(&self, record: &MergedRecord) -> bool {
        self.rejecting_rule(record).is_none()
    }

    /// Remove rejected rows in place, keeping the order of the rest.
    pub fn apply(&self, records: &mut Vec<MergedRecord>) -> FilterCounts {
        let mut counts = FilterCounts {
            input: records.len(),
            ..FilterCounts::default()
        };
        records.retain(|record| match self.rejecting_rule(record) {
            None => true,
            Some(rule) => {
                match rule {
                    0 => counts.normal_af_dp += 1,
                    1 => counts.normal_ac += 1,
                    2 => counts.primary_ac += 1,
                    _ => counts.primary_af += 1,
                }
                false
            }
        });
        debug!(
            input = counts.input,
            normal_af_dp = counts.normal_af_dp,
            normal_ac = counts.normal_ac,
            primary_ac = counts.primary_ac,
            primary_af = counts.primary_af,
            kept = counts.kept(),
            "call filter applied"
        );
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use somasieve_io::{CandidateRecord, Evidence, Locus, Replicate};

    fn record(pos: u64, evidence: &[(EvidenceFeature, f64)]) -> MergedRecord {
        let mut values = Evidence::missing();
        for &(f, v) in evidence {
            values = values.with(f, v);
        }
        MergedRecord::from(CandidateRecord {
            locus: Locus {
                sample: "S1".into(),
                chrom: "chr1".into(),
                pos,
                ref_allele: "C".into(),
                alt_allele: "G".into(),
            },
            replicate: Replicate::default(),
            tag: None,
            evidence: values,
        })
    }

    fn clean(pos: u64) -> MergedRecord {
        use EvidenceFeature::*;
        record(
            pos,
            &[
                (PrimaryAf, 0.2),
                (PrimaryDp, 50.0),
                (PrimaryAc, 10.0),
                (NormalAf, 0.01),
                (NormalDp, 30.0),
                (NormalAc, 0.0),
            ],
        )
    }

    #[test]
    fn clean_candidate_passes() {
        assert!(CallFilter::new().passes(&clean(1)));
    }

    #[test]
    fn each_rule_rejects() {
        use EvidenceFeature::*;
        let filter = CallFilter::new();
        let contaminated = record(1, &[(PrimaryAf, 0.2), (PrimaryAc, 10.0), (NormalAf, 0.08), (NormalDp, 25.0), (NormalAc, 0.0)]);
        let shallow_normal = record(2, &[(PrimaryAf, 0.2), (PrimaryAc, 10.0), (NormalAf, 0.08), (NormalDp, 20.0), (NormalAc, 0.0)]);
        let normal_ac = record(3, &[(PrimaryAf, 0.2), (PrimaryAc, 10.0), (NormalAf, 0.0), (NormalDp, 30.0), (NormalAc, 3.0)]);
        let primary_ac = record(4, &[(PrimaryAf, 0.2), (PrimaryAc, 2.0), (NormalAf, 0.0), (NormalDp, 30.0), (NormalAc, 0.0)]);
        let primary_af = record(5, &[(PrimaryAf, 0.01), (PrimaryAc, 10.0), (NormalAf, 0.0), (NormalDp, 30.0), (NormalAc, 0.0)]);

        assert!(!filter.passes(&contaminated));
        // contamination needs both AF and depth
        assert!(filter.passes(&shallow_normal));
        assert!(!filter.passes(&normal_ac));
        assert!(!filter.passes(&primary_ac));
        assert!(!filter.passes(&primary_af));

        let mut records = vec![contaminated, shallow_normal, normal_ac, primary_ac, primary_af];
        let counts = filter.apply(&mut records);
        assert_eq!(
            counts,
            FilterCounts { input: 5, normal_af_dp: 1, normal_ac: 1, primary_ac: 1, primary_af: 1 }
        );
        assert_eq!(counts.kept(), 1);
        assert_eq!(records[0].locus.pos, 2);
    }

    #[test]
    fn missing_primary_evidence_is_rejected() {
        assert!(!CallFilter::new().passes(&record(1, &[])));
    }

    #[test]
    fn apply_is_idempotent() {
        use EvidenceFeature::*;
        let mut once = vec![clean(1), record(2, &[(PrimaryAc, 1.0)]), clean(3)];
        let filter = CallFilter::new();
        filter.apply(&mut once);
        let mut twice = once.clone();
        let counts = filter.apply(&mut twice);
        assert_eq!(once, twice);
        assert_eq!(counts.kept(), counts.input);
    }
}
