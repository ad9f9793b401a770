//! Matching a patient profile against the prevalent hypotheses of candidate drugs.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use theramatch_common::Relation;
use tracing::{debug, warn};

use crate::classifier::{Hypothesis, HypothesisSet};
use crate::profile::PatientProfile;

/// Concordance-weighted sums for one drug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugAggregate {
    pub drug_name: String,
    /// Conditions whose hypotheses contributed, in key order.
    pub conditions: Vec<String>,
    /// Σ weight × score percentage × concordance
    pub sum_weighted_sp: f64,
    /// Σ weight
    pub sum_weights: f64,
}

/// Build per-drug aggregates for the candidates, in candidate order.
///
/// Only prevalent hypotheses of `relation` whose condition appears in the
/// profile take part. A neutral prevalent sign gives concordance 0, so it
/// adds weight but no signed score. Drugs left with zero total weight are
/// omitted.
pub fn match_profile(
    hypotheses: &HypothesisSet,
    relation: Relation,
    candidates: &[String],
    profile: &PatientProfile,
) -> Vec<DrugAggregate> {
    let mut by_drug: BTreeMap<&str, Vec<&Hypothesis>> = BTreeMap::new();
    for h in hypotheses.iter() {
        let selected = h.relation() == relation
            && h.prevalent_sign().is_some()
            && profile.concordance(h.condition()).is_some();
        if selected {
            by_drug.entry(h.drug_name()).or_default().push(h);
        }
    }

    let mut seen = HashSet::new();
    let mut aggregates = Vec::new();

    for drug in candidates {
        if !seen.insert(drug.as_str()) {
            continue;
        }
        let Some(group) = by_drug.get(drug.as_str()) else {
            debug!("{}: no prevalent hypotheses overlap the patient profile", drug);
            continue;
        };

        let mut aggregate = DrugAggregate {
            drug_name: drug.clone(),
            conditions: Vec::with_capacity(group.len()),
            sum_weighted_sp: 0.0,
            sum_weights: 0.0,
        };

        for h in group {
            let (Some(sign), Some(cell), Some(result)) =
                (h.prevalent_sign(), h.prevalent_cell(), profile.concordance(h.condition()))
            else {
                continue;
            };
            let (weight, weighted_sp) = match cell.checked_weight(&h.key) {
                Ok(w) => w,
                Err(e) => {
                    warn!("Skipping hypothesis in profile match: {}", e);
                    continue;
                }
            };
            let concordance = f64::from(result.value() * sign.value());
            aggregate.sum_weighted_sp += weighted_sp * concordance;
            aggregate.sum_weights += weight;
            aggregate.conditions.push(h.condition().to_string());
        }

        if aggregate.sum_weights == 0.0 {
            debug!("{}: zero total weight, no ranking row", drug);
            continue;
        }
        aggregates.push(aggregate);
    }

    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::HypothesisTally;
    use theramatch_common::{HypothesisKey, Sign};

    fn hypothesis(drug: &str, condition: &str, scores: [f64; 3]) -> Hypothesis {
        let key = HypothesisKey {
            drug_name: drug.to_string(),
            condition: condition.to_string(),
            relation: Relation::Efficacy,
        };
        let tally = HypothesisTally {
            evidence_scores: scores,
            total_score: scores.iter().map(|s| s.abs()).sum(),
            record_count: 1,
        };
        Hypothesis::from_tally(key, &tally)
    }

    fn drugs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn run(set: &HypothesisSet, candidates: &[&str], results: &str) -> Vec<DrugAggregate> {
        match_profile(set, Relation::Efficacy, &drugs(candidates), &PatientProfile::parse(results))
    }

    fn single(drug: &str, condition: &str, scores: [f64; 3]) -> HypothesisSet {
        HypothesisSet::new(vec![hypothesis(drug, condition, scores)])
    }

    fn positive_l858r(drug: &str) -> HypothesisSet {
        single(drug, "EGFR mutated L858R", [0.0, 0.0, 36.0])
    }

    #[test]
    fn test_concordant_positive_profile() {
        let set = positive_l858r("erlotinib");
        let out = run(&set, &["erlotinib"], "EGFR mutated L858Rp");
        assert_eq!(out.len(), 1);
        let cell = set.iter().next().unwrap().prevalent_cell().unwrap().clone();
        assert!((out[0].sum_weights - cell.weight.unwrap()).abs() < 1e-9);
        assert!((out[0].sum_weighted_sp - cell.weighted_score_percentage.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_discordant_flips_sign() {
        let set = positive_l858r("erlotinib");
        let pos = run(&set, &["erlotinib"], "EGFR mutated L858Rp");
        let neg = run(&set, &["erlotinib"], "EGFR mutated L858Rm");
        assert!((pos[0].sum_weighted_sp + neg[0].sum_weighted_sp).abs() < 1e-9);
        assert_eq!(pos[0].sum_weights, neg[0].sum_weights);
    }

    #[test]
    fn test_negative_prevalence_with_negative_result_is_concordant() {
        let set = single("cetuximab", "KRAS mutated G12D", [96.0, 0.0, 0.0]);
        let out = run(&set, &["cetuximab"], "KRAS mutated G12Dm");
        assert!(out[0].sum_weighted_sp > 0.0);
    }

    #[test]
    fn test_no_overlap_yields_no_row() {
        let set = HypothesisSet::new(vec![
            hypothesis("erlotinib", "EGFR mutated L858R", [0.0, 0.0, 36.0]),
            hypothesis("imatinib", "KIT mutated exon11", [0.0, 0.0, 12.0]),
        ]);
        let out = run(
            &set,
            &["imatinib", "erlotinib", "sunitinib"],
            "EGFR mutated L858Rp,KIT mutated exon11x",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].drug_name, "erlotinib");
    }

    #[test]
    fn test_non_prevalent_hypotheses_ignored() {
        let set = single("erlotinib", "EGFR mutated L858R", [12.0, 0.0, 12.0]);
        let out = run(&set, &["erlotinib"], "EGFR mutated L858Rp");
        assert!(out.is_empty());
    }

    #[test]
    fn test_neutral_prevalence_adds_weight_only() {
        let set = single("erlotinib", "EGFR amplified none", [0.0, 48.0, 0.0]);
        let out = run(&set, &["erlotinib"], "EGFR amplified nonep");
        assert_eq!(out[0].sum_weighted_sp, 0.0);
        assert!(out[0].sum_weights > 0.0);
        assert_eq!(set.iter().next().unwrap().prevalent_sign(), Some(Sign::Neutral));
    }

    #[test]
    fn test_candidate_order_preserved_and_deduplicated() {
        let set = HypothesisSet::new(vec![
            hypothesis("afatinib", "EGFR mutated L858R", [0.0, 0.0, 24.0]),
            hypothesis("erlotinib", "EGFR mutated L858R", [0.0, 0.0, 36.0]),
        ]);
        let out = run(&set, &["erlotinib", "afatinib", "erlotinib"], "EGFR mutated L858Rp");
        let names: Vec<&str> = out.iter().map(|a| a.drug_name.as_str()).collect();
        assert_eq!(names, vec!["erlotinib", "afatinib"]);
    }

    #[test]
    fn test_zero_variance_cell_is_skipped() {
        let mut degenerate = hypothesis("erlotinib", "EGFR mutated T790M", [0.0, 0.0, 36.0]);
        if let Some(cells) = degenerate.cells.as_mut() {
            let cell = &mut cells[Sign::Positive.index()];
            cell.weight = None;
            cell.weighted_score_percentage = None;
        }
        let mut lone = degenerate.clone();
        lone.key.drug_name = "afatinib".to_string();
        let normal = hypothesis("erlotinib", "EGFR mutated L858R", [0.0, 0.0, 36.0]);
        let expected = normal.prevalent_cell().unwrap().clone();
        let set = HypothesisSet::new(vec![degenerate, lone, normal]);

        let out = run(
            &set,
            &["erlotinib", "afatinib"],
            "EGFR mutated L858Rp,EGFR mutated T790Mp",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].drug_name, "erlotinib");
        assert_eq!(out[0].conditions, vec!["EGFR mutated L858R".to_string()]);
        assert!((out[0].sum_weights - expected.weight.unwrap()).abs() < 1e-9);
        assert!(out[0].sum_weights.is_finite());
    }
}
