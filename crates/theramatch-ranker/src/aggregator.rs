//! Folding raw evidence records into per-hypothesis sign tallies.
//!
//! Each valid record contributes `model score × size score` to the cell of
//! its direction sign and to the hypothesis total. The fold is a plain sum,
//! so a batch processed from empty tallies gives the same result regardless
//! of how records are partitioned across workers. Tallies must be reset
//! before the same records are folded in again.

use std::collections::BTreeMap;

use theramatch_common::{
    EvidenceRecord, HypothesisKey, RawEvidenceRecord, Relation, Result, Sign, TheramatchError,
};
use tracing::{debug, info};

/// Default group count above which batches are summed on the rayon pool.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// Accumulated evidence for one hypothesis, before finalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HypothesisTally {
    /// Evidence score per sign, indexed by `Sign::index`.
    pub evidence_scores: [f64; 3],
    pub total_score: f64,
    pub record_count: usize,
}

impl HypothesisTally {
    pub fn add(&mut self, sign: Sign, evidence_score: f64) {
        self.evidence_scores[sign.index()] += evidence_score;
        self.total_score += evidence_score.abs();
        self.record_count += 1;
    }

    pub fn evidence_score(&self, sign: Sign) -> f64 {
        self.evidence_scores[sign.index()]
    }

    fn merge(&mut self, other: &HypothesisTally) {
        for sign in Sign::ALL {
            self.evidence_scores[sign.index()] += other.evidence_scores[sign.index()];
        }
        self.total_score += other.total_score;
        self.record_count += other.record_count;
    }

    pub fn reset(&mut self) {
        *self = HypothesisTally::default();
    }
}

/// A record that failed validation, with its batch position.
#[derive(Debug)]
pub struct RecordRejection {
    pub position: usize,
    pub error: TheramatchError,
}

/// Accumulates evidence records of one relation into hypothesis tallies.
#[derive(Debug)]
pub struct EvidenceAggregator {
    relation: Relation,
    tallies: BTreeMap<HypothesisKey, HypothesisTally>,
    rejected: Vec<RecordRejection>,
    parallel_threshold: usize,
}

/// Result of an aggregation pass: tallies plus the records that were rejected.
#[derive(Debug)]
pub struct Aggregation {
    pub relation: Relation,
    pub tallies: BTreeMap<HypothesisKey, HypothesisTally>,
    pub rejected: Vec<RecordRejection>,
    pub parallel_threshold: usize,
}

impl EvidenceAggregator {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            tallies: BTreeMap::new(),
            rejected: Vec::new(),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Set the group count above which batches are summed in parallel.
    /// 0 disables parallel summation.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn tally(&self, key: &HypothesisKey) -> Option<&HypothesisTally> {
        self.tallies.get(key)
    }

    pub fn hypothesis_count(&self) -> usize {
        self.tallies.len()
    }

    /// Validate and fold a single record.
    ///
    /// Returns `Ok(false)` when the record belongs to another relation.
    /// A validation failure is returned to the caller and nothing is folded.
    pub fn add_record(&mut self, position: usize, raw: &RawEvidenceRecord) -> Result<bool> {
        if raw.relation != self.relation {
            return Ok(false);
        }
        let record = raw.validate(position)?;
        self.fold(&record);
        Ok(true)
    }

    fn fold(&mut self, record: &EvidenceRecord) {
        self.tallies
            .entry(record.hypothesis_key())
            .or_default()
            .add(record.direction_sign, record.evidence_score());
    }

    /// Validate and fold a batch. Invalid records are collected as rejections
    /// and do not stop the rest of the batch.
    pub fn add_batch(&mut self, records: &[RawEvidenceRecord]) {
        self.add_positioned(records.iter().enumerate());
    }

    /// Like `add_batch`, for records whose batch position is not their index,
    /// e.g. after unreadable entries were dropped by the loader.
    pub fn add_positioned<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = (usize, &'a RawEvidenceRecord)>,
    {
        let mut groups: BTreeMap<HypothesisKey, Vec<(Sign, f64)>> = BTreeMap::new();
        let mut matched = 0usize;
        let mut skipped = 0usize;

        for (position, raw) in records {
            if raw.relation != self.relation {
                skipped += 1;
                continue;
            }
            matched += 1;
            match raw.validate(position) {
                Ok(record) => groups
                    .entry(record.hypothesis_key())
                    .or_default()
                    .push((record.direction_sign, record.evidence_score())),
                Err(error) => {
                    debug!("Rejected evidence record: {}", error);
                    self.rejected.push(RecordRejection { position, error });
                }
            }
        }

        debug!(
            "{}: {} records in {} hypothesis groups ({} of other relations skipped)",
            self.relation,
            matched,
            groups.len(),
            skipped
        );

        for (key, tally) in sum_groups(groups, self.parallel_threshold) {
            self.tallies.entry(key).or_default().merge(&tally);
        }
    }

    /// Zero one hypothesis so its records can be folded in again.
    pub fn reset(&mut self, key: &HypothesisKey) {
        if let Some(tally) = self.tallies.get_mut(key) {
            tally.reset();
        }
    }

    pub fn reset_all(&mut self) {
        self.tallies.clear();
        self.rejected.clear();
    }

    pub fn finish(self) -> Aggregation {
        info!(
            "Summarized {} {} hypotheses ({} records rejected)",
            self.tallies.len(),
            self.relation,
            self.rejected.len()
        );
        Aggregation {
            relation: self.relation,
            tallies: self.tallies,
            rejected: self.rejected,
            parallel_threshold: self.parallel_threshold,
        }
    }

    /// Aggregate a whole batch from empty tallies.
    pub fn aggregate(relation: Relation, records: &[RawEvidenceRecord]) -> Aggregation {
        Self::aggregate_with_threshold(relation, records, DEFAULT_PARALLEL_THRESHOLD)
    }

    pub fn aggregate_with_threshold(
        relation: Relation,
        records: &[RawEvidenceRecord],
        parallel_threshold: usize,
    ) -> Aggregation {
        let mut aggregator = Self::new(relation).with_parallel_threshold(parallel_threshold);
        aggregator.add_batch(records);
        aggregator.finish()
    }
}

fn fold_group(contributions: &[(Sign, f64)]) -> HypothesisTally {
    let mut tally = HypothesisTally::default();
    for &(sign, score) in contributions {
        tally.add(sign, score);
    }
    tally
}

/// Sum each hypothesis group in input order. Groups are independent, so
/// large batches are spread over the rayon pool.
fn sum_groups(
    groups: BTreeMap<HypothesisKey, Vec<(Sign, f64)>>,
    parallel_threshold: usize,
) -> Vec<(HypothesisKey, HypothesisTally)> {
    #[cfg(feature = "parallel")]
    {
        if parallel_threshold > 0 && groups.len() > parallel_threshold {
            use rayon::prelude::*;
            let groups: Vec<(HypothesisKey, Vec<(Sign, f64)>)> = groups.into_iter().collect();
            return groups
                .into_par_iter()
                .map(|(key, contributions)| {
                    let tally = fold_group(&contributions);
                    (key, tally)
                })
                .collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = parallel_threshold;

    groups
        .into_iter()
        .map(|(key, contributions)| {
            let tally = fold_group(&contributions);
            (key, tally)
        })
        .collect()
}
