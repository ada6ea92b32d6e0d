//! Numeric evidence features attached to each candidate.

use std::fmt;

use crate::domain::{IMPUTED_COUNT, IMPUTED_FRACTION, MISSING_EVIDENCE, VariantClass};

/// One evidence column of the candidate table.
///
/// Variants are declared in table order; [`EvidenceFeature::index`] is the
/// position within [`EvidenceFeature::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EvidenceFeature {
    PrimaryAf,
    PrimaryDp,
    PrimaryAc,
    PrimaryPu,
    PrimaryPw,
    PrimaryK,
    PrimaryRsmq,
    PrimaryRsmqPv,
    PrimaryRsbq,
    PrimaryRsbqPv,
    PrimaryRspos,
    PrimaryRsposPv,
    NormalAf,
    NormalDp,
    NormalAc,
    NormalPu,
    NormalPw,
    NormalK,
    NormalRsmq,
    NormalRsmqPv,
    NormalRsbq,
    NormalRsbqPv,
    NormalRspos,
    NormalRsposPv,
}

/// Number of evidence columns.
pub const N_EVIDENCE: usize = 24;

impl EvidenceFeature {
    /// Every feature, in candidate-table column order.
    pub const ALL: [Self; N_EVIDENCE] = [
        Self::PrimaryAf,
        Self::PrimaryDp,
        Self::PrimaryAc,
        Self::PrimaryPu,
        Self::PrimaryPw,
        Self::PrimaryK,
        Self::PrimaryRsmq,
        Self::PrimaryRsmqPv,
        Self::PrimaryRsbq,
        Self::PrimaryRsbqPv,
        Self::PrimaryRspos,
        Self::PrimaryRsposPv,
        Self::NormalAf,
        Self::NormalDp,
        Self::NormalAc,
        Self::NormalPu,
        Self::NormalPw,
        Self::NormalK,
        Self::NormalRsmq,
        Self::NormalRsmqPv,
        Self::NormalRsbq,
        Self::NormalRsbqPv,
        Self::NormalRspos,
        Self::NormalRsposPv,
    ];

    /// Column header in the candidate table.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::PrimaryAf => "primary_af",
            Self::PrimaryDp => "primary_dp",
            Self::PrimaryAc => "primary_ac",
            Self::PrimaryPu => "primary_pu",
            Self::PrimaryPw => "primary_pw",
            Self::PrimaryK => "primary_k",
            Self::PrimaryRsmq => "primary_rsmq",
            Self::PrimaryRsmqPv => "primary_rsmq_pv",
            Self::PrimaryRsbq => "primary_rsbq",
            Self::PrimaryRsbqPv => "primary_rsbq_pv",
            Self::PrimaryRspos => "primary_rspos",
            Self::PrimaryRsposPv => "primary_rspos_pv",
            Self::NormalAf => "normal_af",
            Self::NormalDp => "normal_dp",
            Self::NormalAc => "normal_ac",
            Self::NormalPu => "normal_pu",
            Self::NormalPw => "normal_pw",
            Self::NormalK => "normal_k",
            Self::NormalRsmq => "normal_rsmq",
            Self::NormalRsmqPv => "normal_rsmq_pv",
            Self::NormalRsbq => "normal_rsbq",
            Self::NormalRsbqPv => "normal_rsbq_pv",
            Self::NormalRspos => "normal_rspos",
            Self::NormalRsposPv => "normal_rspos_pv",
        }
    }

    /// Position within [`EvidenceFeature::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Allele fractions are imputed with [`IMPUTED_FRACTION`], everything
    /// else with [`IMPUTED_COUNT`].
    #[must_use]
    pub fn imputed(self) -> f64 {
        match self {
            Self::PrimaryAf | Self::NormalAf => IMPUTED_FRACTION,
            _ => IMPUTED_COUNT,
        }
    }
}

impl fmt::Display for EvidenceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Classifier inputs for point mutations: every evidence column.
pub const SNV_FEATURES: [EvidenceFeature; N_EVIDENCE] = EvidenceFeature::ALL;

/// Classifier inputs for indels: base-quality rank-sum columns excluded.
pub const INDEL_FEATURES: [EvidenceFeature; 20] = [
    EvidenceFeature::PrimaryAf,
    EvidenceFeature::PrimaryDp,
    EvidenceFeature::PrimaryAc,
    EvidenceFeature::PrimaryPu,
    EvidenceFeature::PrimaryPw,
    EvidenceFeature::PrimaryK,
    EvidenceFeature::PrimaryRsmq,
    EvidenceFeature::PrimaryRsmqPv,
    EvidenceFeature::PrimaryRspos,
    EvidenceFeature::PrimaryRsposPv,
    EvidenceFeature::NormalAf,
    EvidenceFeature::NormalDp,
    EvidenceFeature::NormalAc,
    EvidenceFeature::NormalPu,
    EvidenceFeature::NormalPw,
    EvidenceFeature::NormalK,
    EvidenceFeature::NormalRsmq,
    EvidenceFeature::NormalRsmqPv,
    EvidenceFeature::NormalRspos,
    EvidenceFeature::NormalRsposPv,
];

impl VariantClass {
    /// Classifier input features for this class, in model column order.
    #[must_use]
    pub fn features(self) -> &'static [EvidenceFeature] {
        match self {
            Self::Snv => &SNV_FEATURES,
            Self::Indel => &INDEL_FEATURES,
        }
    }

    /// Column names of [`VariantClass::features`].
    #[must_use]
    pub fn feature_names(self) -> Vec<String> {
        self.features().iter().map(|f| f.column().to_string()).collect()
    }
}

/// The full evidence vector of one candidate.
///
/// Cells that held `.` in the source table carry [`MISSING_EVIDENCE`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evidence {
    values: [f64; N_EVIDENCE],
}

impl Evidence {
    /// Evidence with every cell set to [`MISSING_EVIDENCE`].
    #[must_use]
    pub fn missing() -> Self {
        Self {
            values: [MISSING_EVIDENCE; N_EVIDENCE],
        }
    }

    /// Build from values in [`EvidenceFeature::ALL`] order.
    #[must_use]
    pub fn from_values(values: [f64; N_EVIDENCE]) -> Self {
        Self { values }
    }

    /// Return a copy with one feature replaced.
    #[must_use]
    pub fn with(mut self, feature: EvidenceFeature, value: f64) -> Self {
        self.values[feature.index()] = value;
        self
    }

    /// Value of a single feature.
    #[must_use]
    pub fn get(&self, feature: EvidenceFeature) -> f64 {
        self.values[feature.index()]
    }

    /// Feature row in the order given, as fed to the classifier.
    #[must_use]
    pub fn row(&self, features: &[EvidenceFeature]) -> Vec<f64> {
        features.iter().map(|&f| self.get(f)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_order_matches_index() {
        for (i, f) in EvidenceFeature::ALL.iter().enumerate() {
            assert_eq!(f.index(), i);
        }
        assert_eq!(EvidenceFeature::NormalRsposPv.column(), "normal_rspos_pv");
    }

    #[test]
    fn indel_features_drop_base_quality_rank_sums() {
        assert_eq!(VariantClass::Snv.features().len(), 24);
        assert_eq!(VariantClass::Indel.features().len(), 20);
        assert!(
            !INDEL_FEATURES
                .iter()
                .any(|f| f.column().contains("rsbq"))
        );
    }

    #[test]
    fn imputation_is_outside_valid_range() {
        assert_eq!(EvidenceFeature::NormalAf.imputed(), IMPUTED_FRACTION);
        assert_eq!(EvidenceFeature::NormalDp.imputed(), IMPUTED_COUNT);
        assert!(IMPUTED_FRACTION < 0.0 && IMPUTED_COUNT < 0.0);
    }

    #[test]
    fn row_follows_requested_order() {
        let evidence = Evidence::missing()
            .with(EvidenceFeature::PrimaryAf, 0.2)
            .with(EvidenceFeature::NormalAc, 3.0);
        let row = evidence.row(&[EvidenceFeature::NormalAc, EvidenceFeature::PrimaryAf]);
        assert_eq!(row, vec![3.0, 0.2]);
        assert_eq!(evidence.get(EvidenceFeature::PrimaryDp), MISSING_EVIDENCE);
    }
}
