//! Reconciliation of candidate, label and score records.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::domain::{FilterTag, Locus, MISSING_SCORE, Replicate};
use crate::records::{CandidateRecord, LabelRecord, MergedRecord, ScoreRecord};

/// What to do with records whose label cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownPolicy {
    /// Drop the record.
    Discard,
    /// Keep the record as a negative.
    #[default]
    KeepAsFalse,
}

impl UnknownPolicy {
    fn resolve(self, label: Option<bool>) -> Option<bool> {
        match (label, self) {
            (Some(label), _) => Some(label),
            (None, Self::KeepAsFalse) => Some(false),
            (None, Self::Discard) => None,
        }
    }
}

/// Join labels onto candidates.
///
/// Every candidate survives the join; label rows with no matching candidate
/// are dropped. A candidate whose label is absent or has an unknown tag is
/// then resolved by `policy`. Candidates labeled `deepvariant` are excluded
/// regardless of policy. Labels match on the positional key only, so every
/// replicate of a candidate receives the same label.
#[instrument(skip_all, fields(n_candidates = candidates.len(), n_labels = labels.len(), ?policy))]
pub fn merge_labels(
    candidates: Vec<CandidateRecord>,
    labels: &[LabelRecord],
    policy: UnknownPolicy,
) -> Vec<MergedRecord> {
    let by_locus: HashMap<&Locus, &FilterTag> =
        labels.iter().map(|l| (&l.locus, &l.tag)).collect();

    let mut merged = Vec::with_capacity(candidates.len());
    let (mut n_unknown, mut n_excluded) = (0usize, 0usize);
    for candidate in candidates {
        let tag = by_locus.get(&candidate.locus).map(|&t| t.clone());
        if tag.as_ref().is_some_and(FilterTag::is_low_confidence_germline) {
            n_excluded += 1;
            continue;
        }
        let raw = tag.as_ref().and_then(|t| t.category().label());
        if raw.is_none() {
            n_unknown += 1;
        }
        let Some(label) = policy.resolve(raw) else {
            continue;
        };
        merged.push(MergedRecord {
            locus: candidate.locus,
            replicate: Some(candidate.replicate),
            tag,
            label: Some(label),
            score: MISSING_SCORE,
            call: false,
            evidence: Some(candidate.evidence),
        });
    }

    if n_excluded > 0 {
        debug!(n_excluded, "excluded low-confidence germline candidates");
    }
    info!(
        n_merged = merged.len(),
        n_positive = merged.iter().filter(|r| r.is_positive()).count(),
        n_unknown,
        "labels merged"
    );
    merged
}

/// Three-way reconciliation used for evaluation.
///
/// 1. Labels and scores are outer-joined on the positional key. Labels with
///    unknown tags are treated as absent; label rows without a score keep
///    [`MISSING_SCORE`] and no replicate.
/// 2. Candidates are left-joined on the positional key plus replicate.
///    Rows without a matching candidate carry no evidence and report the
///    imputed sentinels.
/// 3. Rows still without a label are resolved by `policy`.
/// 4. Rows labeled `deepvariant` are dropped.
///
/// Output order follows the score table, then the unscored labels.
#[instrument(skip_all, fields(n_labels = labels.len(), n_scores = scores.len(), n_candidates = candidates.len(), ?policy))]
pub fn reconcile(
    labels: &[LabelRecord],
    scores: &[ScoreRecord],
    candidates: &[CandidateRecord],
    policy: UnknownPolicy,
) -> Vec<MergedRecord> {
    let known: Vec<&LabelRecord> = labels.iter().filter(|l| l.label().is_some()).collect();
    if known.len() < labels.len() {
        warn!(n_dropped = labels.len() - known.len(), "ignoring labels with unknown tags");
    }
    let by_locus: HashMap<&Locus, &LabelRecord> = known.iter().map(|&l| (&l.locus, l)).collect();
    let evidence: HashMap<(&Locus, &Replicate), &CandidateRecord> = candidates
        .iter()
        .map(|c| ((&c.locus, &c.replicate), c))
        .collect();

    let mut scored: HashSet<&Locus> = HashSet::new();
    let mut rows: Vec<MergedRecord> = Vec::with_capacity(scores.len() + known.len());
    for score in scores {
        scored.insert(&score.locus);
        let label = by_locus.get(&score.locus);
        rows.push(MergedRecord {
            locus: score.locus.clone(),
            replicate: Some(score.replicate.clone()),
            tag: label.map(|l| l.tag.clone()),
            label: label.and_then(|l| l.label()),
            score: score.score,
            call: false,
            evidence: evidence
                .get(&(&score.locus, &score.replicate))
                .map(|c| c.evidence),
        });
    }
    let n_unscored = known.iter().filter(|l| !scored.contains(&l.locus)).count();
    for label in known.iter().filter(|l| !scored.contains(&l.locus)) {
        rows.push(MergedRecord {
            locus: label.locus.clone(),
            replicate: None,
            tag: Some(label.tag.clone()),
            label: label.label(),
            score: MISSING_SCORE,
            call: false,
            evidence: None,
        });
    }

    let n_joined = rows.len();
    let reconciled: Vec<MergedRecord> = rows
        .into_iter()
        .filter_map(|mut row| {
            row.label = Some(policy.resolve(row.label)?);
            Some(row)
        })
        .filter(|row| {
            !row
                .tag
                .as_ref()
                .is_some_and(FilterTag::is_low_confidence_germline)
        })
        .collect();

    info!(
        n_joined,
        n_unscored,
        n_reconciled = reconciled.len(),
        n_imputed = reconciled.iter().filter(|r| r.evidence.is_none()).count(),
        "records reconciled"
    );
    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IMPUTED_FRACTION;
    use crate::evidence::{Evidence, EvidenceFeature};

    fn locus(pos: u64) -> Locus {
        Locus {
            sample: "S1".into(),
            chrom: "chr1".into(),
            pos,
            ref_allele: "A".into(),
            alt_allele: "T".into(),
        }
    }

    fn candidate(pos: u64, replicate: &str) -> CandidateRecord {
        CandidateRecord {
            locus: locus(pos),
            replicate: Replicate::new(replicate),
            tag: Some(FilterTag::new("PASS")),
            evidence: Evidence::missing().with(EvidenceFeature::NormalAf, pos as f64 / 1000.0),
        }
    }

    fn label(pos: u64, tag: &str) -> LabelRecord {
        LabelRecord {
            locus: locus(pos),
            tag: FilterTag::new(tag),
        }
    }

    fn score(pos: u64, replicate: &str, value: f64) -> ScoreRecord {
        ScoreRecord {
            locus: locus(pos),
            replicate: Replicate::new(replicate),
            score: value,
        }
    }

    #[test]
    fn right_join_keeps_every_candidate() {
        let candidates = vec![candidate(1, "1"), candidate(2, "1"), candidate(3, "1")];
        let labels = [label(1, "somatic"), label(2, "SNP"), label(99, "somatic")];
        let merged = merge_labels(candidates, &labels, UnknownPolicy::KeepAsFalse);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].label, Some(true));
        assert_eq!(merged[1].label, Some(false));
        assert_eq!(merged[2].label, Some(false));
        assert!(merged[2].tag.is_none());
        assert!(merged.iter().all(|r| r.locus.pos != 99));
    }

    #[test]
    fn discard_drops_unmatched_and_unknown() {
        let candidates = vec![candidate(1, "1"), candidate(2, "1"), candidate(3, "1")];
        let labels = [label(1, "consensus"), label(2, "PASS")];
        let merged = merge_labels(candidates, &labels, UnknownPolicy::Discard);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].locus.pos, 1);
    }

    #[test]
    fn deepvariant_excluded_under_both_policies() {
        for policy in [UnknownPolicy::Discard, UnknownPolicy::KeepAsFalse] {
            let candidates = vec![candidate(1, "1"), candidate(2, "1")];
            let labels = [label(1, "deepvariant"), label(2, "somatic")];
            let merged = merge_labels(candidates, &labels, policy);
            assert_eq!(merged.len(), 1);
            assert_eq!(merged[0].locus.pos, 2);
        }
    }

    #[test]
    fn replicates_share_labels() {
        let candidates = vec![candidate(1, "1"), candidate(1, "2")];
        let merged = merge_labels(candidates, &[label(1, "somatic")], UnknownPolicy::Discard);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(MergedRecord::is_positive));
    }

    #[test]
    fn reconcile_outer_joins_labels_and_scores() {
        let labels = [label(1, "somatic"), label(2, "no_mutation"), label(5, "somatic")];
        let scores = [score(1, "1", 0.9), score(2, "1", 0.1), score(3, "1", 0.4)];
        let candidates = [candidate(1, "1"), candidate(2, "2"), candidate(3, "1")];
        let rows = reconcile(&labels, &scores, &candidates, UnknownPolicy::KeepAsFalse);

        assert_eq!(rows.len(), 4);
        // scored and labeled
        assert_eq!(rows[0].label, Some(true));
        assert_eq!(rows[0].score, 0.9);
        assert_eq!(rows[0].evidence_value(EvidenceFeature::NormalAf), 0.001);
        // candidate exists only for another replicate
        assert!(rows[1].evidence.is_none());
        assert_eq!(rows[1].evidence_value(EvidenceFeature::NormalAf), IMPUTED_FRACTION);
        // scored, unlabeled, kept as negative
        assert_eq!(rows[2].label, Some(false));
        assert!(rows[2].tag.is_none());
        // labeled, unscored
        assert_eq!(rows[3].locus.pos, 5);
        assert_eq!(rows[3].score, MISSING_SCORE);
        assert!(rows[3].replicate.is_none());
    }

    #[test]
    fn reconcile_discard_and_exclusion() {
        let labels = [label(1, "somatic"), label(2, "deepvariant"), label(4, "mystery")];
        let scores = [score(1, "0", 0.9), score(2, "1", 0.8), score(3, "1", 0.7), score(4, "1", 0.6)];
        let rows = reconcile(&labels, &scores, &[], UnknownPolicy::Discard);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].locus.pos, 1);
        assert_eq!(rows[0].replicate.as_ref().map(Replicate::as_str), Some("1"));
    }
}
