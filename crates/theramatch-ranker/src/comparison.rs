//! Pairwise comparison of ranked drugs.

use serde::{Deserialize, Serialize};

use crate::ranker::RankedDrug;
use crate::stats::two_tailed_p;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugComparison {
    pub drug_a: String,
    pub drug_b: String,
    /// overall(A) − overall(B)
    pub difference: f64,
    /// sqrt(variance(A) + variance(B))
    pub standard_error: f64,
    pub z_statistic: f64,
    pub p_value: f64,
}

pub fn compare(a: &RankedDrug, b: &RankedDrug) -> DrugComparison {
    let difference = a.overall_score - b.overall_score;
    let standard_error = (a.variance + b.variance).sqrt();
    let z_statistic = difference / standard_error;
    DrugComparison {
        drug_a: a.drug_name.clone(),
        drug_b: b.drug_name.clone(),
        difference,
        standard_error,
        z_statistic,
        p_value: two_tailed_p(z_statistic),
    }
}

/// Compare each ranked drug with the one ranked directly below it.
pub fn compare_adjacent(ranked: &[RankedDrug]) -> Vec<DrugComparison> {
    ranked.windows(2).map(|pair| compare(&pair[0], &pair[1])).collect()
}
