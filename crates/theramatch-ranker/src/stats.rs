//! Per-sign statistics for one hypothesis (Agresti–Coull corrected).
//!
//! Each hypothesis owns three cells, one per sign. A cell starts as a plain
//! accumulated evidence score and is finalized against the hypothesis
//! totals into percentages, variance, standard error, a 95% interval and an
//! inverse-variance weight.

use serde::{Deserialize, Serialize};
use theramatch_common::{HypothesisKey, Result, Sign, TheramatchError};

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.96;

/// Continuity term added to the total score: z².
pub const TOTAL_CORRECTION: f64 = Z_95 * Z_95;

/// Continuity term added to each cell's evidence score: z² / 2.
pub const CELL_CORRECTION: f64 = Z_95 * Z_95 / 2.0;

/// Standard normal CDF via erfc.
#[inline]
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * statrs::function::erf::erfc(-x / std::f64::consts::SQRT_2)
}

/// Two-tailed p-value for a Z statistic: 2 × (1 − Φ(|z|)).
pub fn two_tailed_p(z: f64) -> f64 {
    2.0 * (1.0 - normal_cdf(z.abs()))
}

/// A finalized statistics cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatCell {
    pub sign: Sign,
    pub evidence_score: f64,
    pub corrected_evidence_score: f64,
    pub score_percentage: f64,
    pub corrected_score_percentage: f64,
    pub variance: f64,
    pub standard_error: f64,
    pub confidence_interval_lower: f64,
    pub confidence_interval_upper: f64,
    /// Inverse variance; None when the variance is zero.
    pub weight: Option<f64>,
    /// weight × uncorrected score percentage; None when `weight` is.
    pub weighted_score_percentage: Option<f64>,
}

impl StatCell {
    /// Finalize a cell against its hypothesis totals.
    ///
    /// The point estimate carried forward (`weighted_score_percentage`) uses
    /// the uncorrected percentage; the correction only feeds the variance.
    pub fn finalize(
        key: &HypothesisKey,
        sign: Sign,
        evidence_score: f64,
        total_score: f64,
        corrected_total_score: f64,
    ) -> Result<Self> {
        if total_score <= 0.0 {
            return Err(TheramatchError::InsufficientEvidence { key: key.to_string() });
        }

        let score_percentage = evidence_score / total_score;
        let corrected_evidence_score = evidence_score + CELL_CORRECTION;
        let corrected_score_percentage = corrected_evidence_score / corrected_total_score;
        let p = corrected_score_percentage.abs();
        let variance = p * (1.0 - p) / corrected_total_score;
        let standard_error = variance.abs().sqrt();
        let half_width = Z_95 * standard_error;

        let weight = if variance == 0.0 { None } else { Some(1.0 / variance.abs()) };

        Ok(Self {
            sign,
            evidence_score,
            corrected_evidence_score,
            score_percentage,
            corrected_score_percentage,
            variance,
            standard_error,
            confidence_interval_lower: corrected_score_percentage - half_width,
            confidence_interval_upper: corrected_score_percentage + half_width,
            weight,
            weighted_score_percentage: weight.map(|w| w * score_percentage),
        })
    }

    /// Weight and weighted percentage, or an error for a zero-variance cell.
    pub fn checked_weight(&self, key: &HypothesisKey) -> Result<(f64, f64)> {
        match (self.weight, self.weighted_score_percentage) {
            (Some(w), Some(wsp)) => Ok((w, wsp)),
            _ => Err(TheramatchError::DegenerateVariance {
                key: key.to_string(),
                sign: self.sign.to_string(),
            }),
        }
    }

    /// (score percentage − threshold) / standard error.
    /// Uncorrected percentage over the corrected standard error.
    pub fn z_statistic(&self, threshold: f64) -> f64 {
        (self.score_percentage - threshold) / self.standard_error
    }

    pub fn p_value(&self, threshold: f64) -> f64 {
        two_tailed_p(self.z_statistic(threshold))
    }
}
