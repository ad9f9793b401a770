//! Finalizing hypothesis tallies and deciding their prevalent sign.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use theramatch_common::{HypothesisKey, Relation, Result, Sign};
use tracing::{debug, info};

use crate::aggregator::{Aggregation, HypothesisTally};
use crate::stats::{StatCell, TOTAL_CORRECTION};

/// A corrected percentage must exceed this to be prevalent.
/// Three percentages summing to ~1 leave at most one above it.
pub const PREVALENCE_CUTOFF: f64 = 0.5;

/// Outcome of classifying one hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Classification {
    /// Total score is zero; percentages are undefined.
    Unclassifiable,
    /// No cell exceeds the cutoff.
    NoPrevalence,
    Prevalent { sign: Sign, percentage: f64 },
}

/// A finalized hypothesis: totals, the three cells, and its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypothesis {
    pub key: HypothesisKey,
    pub total_score: f64,
    pub corrected_total_score: f64,
    pub record_count: usize,
    /// Cells indexed by `Sign::index`; None when unclassifiable.
    pub cells: Option<[StatCell; 3]>,
    pub classification: Classification,
}

/// First cell, in negative → neutral → positive order, whose corrected
/// percentage is strictly above the cutoff.
pub fn classify(cells: &[StatCell; 3]) -> Option<(Sign, f64)> {
    Sign::ALL
        .iter()
        .map(|&sign| &cells[sign.index()])
        .find(|cell| cell.corrected_score_percentage > PREVALENCE_CUTOFF)
        .map(|cell| (cell.sign, cell.corrected_score_percentage))
}

fn finalize_cells(
    key: &HypothesisKey,
    tally: &HypothesisTally,
    corrected_total: f64,
) -> Result<[StatCell; 3]> {
    let finalize = |sign: Sign| {
        let score = tally.evidence_score(sign);
        StatCell::finalize(key, sign, score, tally.total_score, corrected_total)
    };
    Ok([
        finalize(Sign::Negative)?,
        finalize(Sign::Neutral)?,
        finalize(Sign::Positive)?,
    ])
}

impl Hypothesis {
    pub fn from_tally(key: HypothesisKey, tally: &HypothesisTally) -> Self {
        let corrected_total_score = tally.total_score + TOTAL_CORRECTION;

        let (cells, classification) = match finalize_cells(&key, tally, corrected_total_score) {
            Ok(cells) => {
                let classification = match classify(&cells) {
                    Some((sign, percentage)) => Classification::Prevalent { sign, percentage },
                    None => Classification::NoPrevalence,
                };
                (Some(cells), classification)
            }
            Err(e) => {
                debug!("{}", e);
                (None, Classification::Unclassifiable)
            }
        };

        Self {
            key,
            total_score: tally.total_score,
            corrected_total_score,
            record_count: tally.record_count,
            cells,
            classification,
        }
    }

    pub fn drug_name(&self) -> &str {
        &self.key.drug_name
    }

    pub fn condition(&self) -> &str {
        &self.key.condition
    }

    pub fn relation(&self) -> Relation {
        self.key.relation
    }

    pub fn cell(&self, sign: Sign) -> Option<&StatCell> {
        self.cells.as_ref().map(|cells| &cells[sign.index()])
    }

    pub fn prevalent_sign(&self) -> Option<Sign> {
        match self.classification {
            Classification::Prevalent { sign, .. } => Some(sign),
            _ => None,
        }
    }

    pub fn prevalent_percentage(&self) -> Option<f64> {
        match self.classification {
            Classification::Prevalent { percentage, .. } => Some(percentage),
            _ => None,
        }
    }

    pub fn prevalent_cell(&self) -> Option<&StatCell> {
        self.prevalent_sign().and_then(|sign| self.cell(sign))
    }

    /// Display phrase for the prevalent direction, e.g. "sensitivity".
    pub fn prevalence_label(&self) -> Option<&'static str> {
        self.prevalent_sign().map(|sign| self.key.relation.prevalence_label(sign))
    }

    /// Prevalent, directional, and above `threshold`.
    pub fn is_informative(&self, threshold: f64) -> bool {
        match self.classification {
            Classification::Prevalent { sign, percentage } => {
                sign != Sign::Neutral && percentage > threshold
            }
            _ => false,
        }
    }
}

/// An informative hypothesis as reported to the user: the prevalence phrase
/// plus the prevalent cell tested against the request threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrevalenceFinding {
    pub drug_name: String,
    pub condition: String,
    pub sign: Sign,
    pub label: String,
    /// Corrected percentage of the prevalent cell.
    pub percentage: f64,
    pub z_statistic: f64,
    pub p_value: f64,
}

/// Finalized hypotheses, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HypothesisSet {
    hypotheses: Vec<Hypothesis>,
}

impl Aggregation {
    /// Finalize every tally into a classified hypothesis.
    pub fn finalize(&self) -> HypothesisSet {
        let entries: Vec<(&HypothesisKey, &HypothesisTally)> = self.tallies.iter().collect();

        #[cfg(feature = "parallel")]
        let hypotheses: Vec<Hypothesis> =
            if self.parallel_threshold > 0 && entries.len() > self.parallel_threshold {
                use rayon::prelude::*;
                entries
                    .par_iter()
                    .map(|(key, tally)| Hypothesis::from_tally((*key).clone(), tally))
                    .collect()
            } else {
                entries
                    .iter()
                    .map(|(key, tally)| Hypothesis::from_tally((*key).clone(), tally))
                    .collect()
            };

        #[cfg(not(feature = "parallel"))]
        let hypotheses: Vec<Hypothesis> = entries
            .iter()
            .map(|(key, tally)| Hypothesis::from_tally((*key).clone(), tally))
            .collect();

        let set = HypothesisSet::new(hypotheses);
        info!(
            "{}: {} hypotheses, {} prevalent, {} unclassifiable",
            self.relation,
            set.len(),
            set.iter().filter(|h| h.prevalent_sign().is_some()).count(),
            set.iter()
                .filter(|h| h.classification == Classification::Unclassifiable)
                .count()
        );
        set
    }
}

impl HypothesisSet {
    pub fn new(mut hypotheses: Vec<Hypothesis>) -> Self {
        hypotheses.sort_by(|a, b| a.key.cmp(&b.key));
        Self { hypotheses }
    }

    /// Merge another set; entries with an existing key replace the old one.
    pub fn extend(&mut self, other: HypothesisSet) {
        let incoming: BTreeSet<HypothesisKey> =
            other.hypotheses.iter().map(|h| h.key.clone()).collect();
        self.hypotheses.retain(|h| !incoming.contains(&h.key));
        self.hypotheses.extend(other.hypotheses);
        self.hypotheses.sort_by(|a, b| a.key.cmp(&b.key));
    }

    pub fn len(&self) -> usize {
        self.hypotheses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hypotheses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hypothesis> {
        self.hypotheses.iter()
    }

    pub fn get(&self, key: &HypothesisKey) -> Option<&Hypothesis> {
        self.hypotheses
            .binary_search_by(|h| h.key.cmp(key))
            .ok()
            .map(|i| &self.hypotheses[i])
    }

    /// Distinct drug names, sorted.
    pub fn drugs(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.hypotheses.iter().map(|h| h.drug_name()).collect();
        names.into_iter().map(str::to_string).collect()
    }

    /// Prevalent hypotheses for the given drugs and relation whose prevalent
    /// percentage exceeds `threshold`.
    pub fn find_prevalent<'a>(
        &'a self,
        drugs: &'a [String],
        relation: Relation,
        threshold: f64,
    ) -> impl Iterator<Item = &'a Hypothesis> + 'a {
        self.hypotheses.iter().filter(move |h| {
            h.relation() == relation
                && drugs.iter().any(|d| d == h.drug_name())
                && h.prevalent_percentage().is_some_and(|p| p > threshold)
        })
    }

    /// Conditions with a directional prevalent finding above `threshold`
    /// for any of the given drugs. Sorted, without duplicates.
    pub fn informative_conditions(
        &self,
        drugs: &[String],
        relation: Relation,
        threshold: f64,
    ) -> Vec<String> {
        let conditions: BTreeSet<&str> = self
            .find_prevalent(drugs, relation, threshold)
            .filter(|h| h.is_informative(threshold))
            .map(|h| h.condition())
            .collect();
        conditions.into_iter().map(str::to_string).collect()
    }

    /// Informative hypotheses for the given drugs, in key order.
    pub fn informative_findings(
        &self,
        drugs: &[String],
        relation: Relation,
        threshold: f64,
    ) -> Vec<PrevalenceFinding> {
        self.find_prevalent(drugs, relation, threshold)
            .filter(|h| h.is_informative(threshold))
            .filter_map(|h| {
                let cell = h.prevalent_cell()?;
                Some(PrevalenceFinding {
                    drug_name: h.drug_name().to_string(),
                    condition: h.condition().to_string(),
                    sign: cell.sign,
                    label: h.prevalence_label()?.to_string(),
                    percentage: cell.corrected_score_percentage,
                    z_statistic: cell.z_statistic(threshold),
                    p_value: cell.p_value(threshold),
                })
            })
            .collect()
    }
}
