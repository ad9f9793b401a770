//! theramatch-ranker — Evidence summarization and patient-profile drug ranking.
//!
//! Pipeline: raw evidence records → `aggregator` (per-hypothesis sign tallies)
//! → `stats` (Agresti–Coull corrected cells) → `classifier` (prevalent sign)
//! → `matcher` (patient concordance) → `ranker` (overall score, Z, p-value).

pub mod stats;
pub mod aggregator;
pub mod classifier;
pub mod profile;
pub mod matcher;
pub mod ranker;
pub mod comparison;
pub mod pipeline;

pub use aggregator::{Aggregation, EvidenceAggregator, RecordRejection};
pub use classifier::{Classification, Hypothesis, HypothesisSet, PrevalenceFinding};
pub use matcher::DrugAggregate;
pub use pipeline::{
    rank_drugs, rank_profile, summarize_evidence, summarize_positioned, summarize_relation,
    EvidenceSummary,
};
pub use profile::PatientProfile;
pub use ranker::{ProfileAssociation, RankedDrug};
pub use stats::StatCell;
