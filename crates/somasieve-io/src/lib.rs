//! Table I/O, record reconciliation and call-set output for somasieve.
//!
//! Readers turn candidate evidence, label and score tables into typed
//! records; the merge stage joins them under an unknown-label policy; the
//! writers publish result tables, VCFs, the threshold table and the run
//! ledger atomically.

mod collect;
mod domain;
mod error;
mod evidence;
mod ledger;
mod merge;
mod model_set;
mod publish;
mod reader;
mod records;
mod sheet;
mod table;
mod template;
mod threshold_table;
mod writer;

pub use collect::SampleSetLoader;
pub use domain::{
    DEFAULT_REPLICATE, FilterTag, IMPUTED_COUNT, IMPUTED_FRACTION, IndelKind, LabelCategory, Locus,
    MISSING_EVIDENCE, MISSING_SCORE, ModelName, Replicate, VariantClass,
};
pub use error::IoError;
pub use evidence::{Evidence, EvidenceFeature, INDEL_FEATURES, N_EVIDENCE, SNV_FEATURES};
pub use ledger::{LedgerEntry, MetricValue, RunLedger};
pub use merge::{UnknownPolicy, merge_labels, reconcile};
pub use model_set::{ModelSet, Partition, SampleSpec};
pub use publish::publish;
pub use reader::{CandidateTable, CandidateTableReader, LabelTableReader, ScoreTableReader};
pub use records::{CandidateRecord, LabelRecord, MergedRecord, ScoreRecord};
pub use sheet::SampleSheetReader;
pub use template::{PathTemplate, Placeholders};
pub use threshold_table::ThresholdTable;
pub use writer::{IndelThresholds, ResultWriter, ScoreSetWriter, VcfStyle, round_score, write_vcf};
