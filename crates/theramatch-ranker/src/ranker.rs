//! Overall score, confidence interval and significance per drug, and the final ordering.

use serde::{Deserialize, Serialize};

use crate::matcher::DrugAggregate;
use crate::stats::{two_tailed_p, Z_95};

/// One row of the ranking output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedDrug {
    pub drug_name: String,
    pub overall_score: f64,
    pub variance: f64,
    pub standard_error: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
    pub z_statistic: f64,
    pub p_value: f64,
    /// Conditions that contributed to the score.
    pub conditions: Vec<String>,
}

/// How a patient's profile relates to a drug's prevalent hypotheses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileAssociation {
    /// Score and the whole interval above the threshold.
    Concordant,
    /// Score and the whole interval below the negated threshold.
    Discordant,
    Inconclusive,
}

impl RankedDrug {
    /// Score an aggregate. Returns None when it carries no weight.
    ///
    /// The Z statistic measures |score| against the threshold and the
    /// p-value takes |Z| again, so the test ignores the score's sign.
    pub fn from_aggregate(aggregate: &DrugAggregate, threshold: f64) -> Option<Self> {
        if aggregate.sum_weights == 0.0 {
            return None;
        }
        let overall_score = aggregate.sum_weighted_sp / aggregate.sum_weights;
        let variance = 1.0 / aggregate.sum_weights;
        let standard_error = variance.sqrt();
        let half_width = Z_95 * standard_error;
        let z_statistic = (overall_score.abs() - threshold) / standard_error;

        Some(Self {
            drug_name: aggregate.drug_name.clone(),
            overall_score,
            variance,
            standard_error,
            confidence_interval_lower: overall_score - half_width,
            confidence_interval_upper: overall_score + half_width,
            z_statistic,
            p_value: two_tailed_p(z_statistic),
            conditions: aggregate.conditions.clone(),
        })
    }

    pub fn association(&self, threshold: f64) -> ProfileAssociation {
        if self.overall_score > threshold && self.confidence_interval_lower > threshold {
            ProfileAssociation::Concordant
        } else if self.overall_score < -threshold && self.confidence_interval_upper < -threshold {
            ProfileAssociation::Discordant
        } else {
            ProfileAssociation::Inconclusive
        }
    }
}

/// Score every aggregate and sort descending by overall score.
/// The sort is stable: equal scores keep aggregate order.
pub fn rank(aggregates: &[DrugAggregate], threshold: f64) -> Vec<RankedDrug> {
    let mut ranked: Vec<RankedDrug> = aggregates
        .iter()
        .filter_map(|a| RankedDrug::from_aggregate(a, threshold))
        .collect();
    ranked.sort_by(|a, b| {
        b.overall_score
            .partial_cmp(&a.overall_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}
