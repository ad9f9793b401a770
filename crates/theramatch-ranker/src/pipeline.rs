//! End-to-end entry points: evidence batch → hypotheses, and hypotheses +
//! patient results → ranking.

use theramatch_common::{EngineConfig, RawEvidenceRecord, Relation};
use tracing::info;

use crate::aggregator::{EvidenceAggregator, RecordRejection};
use crate::classifier::HypothesisSet;
use crate::matcher::match_profile;
use crate::profile::PatientProfile;
use crate::ranker::{rank, RankedDrug};

/// Hypotheses built from an evidence batch, plus the records that failed validation.
#[derive(Debug, Default)]
pub struct EvidenceSummary {
    pub hypotheses: HypothesisSet,
    pub rejected: Vec<RecordRejection>,
}

fn summarize_pass<'a, I>(
    relation: Relation,
    records: I,
    parallel_threshold: usize,
) -> EvidenceSummary
where
    I: IntoIterator<Item = (usize, &'a RawEvidenceRecord)>,
{
    let mut aggregator =
        EvidenceAggregator::new(relation).with_parallel_threshold(parallel_threshold);
    aggregator.add_positioned(records);
    let aggregation = aggregator.finish();
    let hypotheses = aggregation.finalize();
    EvidenceSummary {
        hypotheses,
        rejected: aggregation.rejected,
    }
}

/// Aggregate and classify the records of one relation.
pub fn summarize_relation(
    relation: Relation,
    records: &[RawEvidenceRecord],
    parallel_threshold: usize,
) -> EvidenceSummary {
    summarize_pass(relation, records.iter().enumerate(), parallel_threshold)
}

/// Aggregate and classify a mixed batch, one pass per relation.
pub fn summarize_evidence(
    records: &[RawEvidenceRecord],
    parallel_threshold: usize,
) -> EvidenceSummary {
    let summary = summarize_all(|| records.iter().enumerate(), parallel_threshold);
    log_summary(records.len(), &summary);
    summary
}

/// `summarize_evidence` for records tagged with their position in the
/// source batch; rejections report those positions.
pub fn summarize_positioned(
    records: &[(usize, RawEvidenceRecord)],
    parallel_threshold: usize,
) -> EvidenceSummary {
    let positioned = || records.iter().map(|(position, raw)| (*position, raw));
    let summary = summarize_all(positioned, parallel_threshold);
    log_summary(records.len(), &summary);
    summary
}

fn summarize_all<'a, F, I>(records: F, parallel_threshold: usize) -> EvidenceSummary
where
    F: Fn() -> I,
    I: Iterator<Item = (usize, &'a RawEvidenceRecord)>,
{
    let mut summary = EvidenceSummary::default();
    for relation in Relation::ALL {
        let part = summarize_pass(relation, records(), parallel_threshold);
        summary.hypotheses.extend(part.hypotheses);
        summary.rejected.extend(part.rejected);
    }
    summary.rejected.sort_by_key(|r| r.position);
    summary
}

fn log_summary(record_count: usize, summary: &EvidenceSummary) {
    info!(
        "Summarized {} records into {} hypotheses ({} rejected)",
        record_count,
        summary.hypotheses.len(),
        summary.rejected.len()
    );
}

/// The configured candidate drugs, or every drug in the set when none are configured.
pub fn candidate_drugs(hypotheses: &HypothesisSet, config: &EngineConfig) -> Vec<String> {
    if config.candidate_drugs.is_empty() {
        hypotheses.drugs()
    } else {
        config.candidate_drugs.clone()
    }
}

/// Rank candidate drugs for a patient given the comma-separated result tokens.
pub fn rank_drugs(
    hypotheses: &HypothesisSet,
    test_results: &str,
    candidates: &[String],
    relation: Relation,
    threshold: f64,
) -> Vec<RankedDrug> {
    let profile = PatientProfile::parse(test_results);
    rank_profile(hypotheses, &profile, candidates, relation, threshold)
}

pub fn rank_profile(
    hypotheses: &HypothesisSet,
    profile: &PatientProfile,
    candidates: &[String],
    relation: Relation,
    threshold: f64,
) -> Vec<RankedDrug> {
    let aggregates = match_profile(hypotheses, relation, candidates, profile);
    let ranked = rank(&aggregates, threshold);
    info!(
        "Ranked {} of {} candidate drugs against {} patient results",
        ranked.len(),
        candidates.len(),
        profile.len()
    );
    ranked
}
