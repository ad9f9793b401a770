//! Core domain types for drug/condition evidence.
//!
//! An evidence record links one drug to one molecular condition under one
//! relation, with an assay class, a case count, and a reported direction.
//! Records sharing `(drug, condition, relation)` are summarized into a
//! single hypothesis by the ranker crate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TheramatchError};

// ── Relation ─────────────────────────────────────────────────────────────────

/// The kind of effect an evidence record reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    Efficacy,
    Toxicity,
    Synergism,
    Progression,
}

impl Relation {
    pub const ALL: [Relation; 4] = [
        Relation::Efficacy,
        Relation::Toxicity,
        Relation::Synergism,
        Relation::Progression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Efficacy => "efficacy",
            Relation::Toxicity => "toxicity",
            Relation::Synergism => "synergism",
            Relation::Progression => "progression",
        }
    }

    /// Map a relationship phrase from the evidence source onto its relation.
    /// Returns None for phrases outside the curated vocabulary.
    pub fn from_relationship_phrase(phrase: &str) -> Option<Self> {
        match phrase.trim() {
            "sensitivity to" | "no relationship with" | "resistance to" => Some(Relation::Efficacy),
            "toxicity increased for" | "toxicity unchanged for" | "toxicity decreased for" => {
                Some(Relation::Toxicity)
            }
            "synergism with" | "no synergism with" | "antagonism with" => Some(Relation::Synergism),
            "progression favored by" => Some(Relation::Progression),
            _ => None,
        }
    }

    /// Display phrase for a prevalent hypothesis of this relation.
    pub fn prevalence_label(&self, sign: Sign) -> &'static str {
        let labels = match self {
            Relation::Efficacy => ["resistance", "no relationship", "sensitivity"],
            Relation::Toxicity => [
                "toxicity decreased",
                "toxicity unchanged",
                "toxicity increased",
            ],
            Relation::Synergism => ["antagonism", "no synergism", "synergism"],
            Relation::Progression => [
                "progression favored",
                "progression unchanged",
                "progression slowed",
            ],
        };
        labels[sign.index()]
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Relation {
    type Err = TheramatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "efficacy" => Ok(Relation::Efficacy),
            "toxicity" => Ok(Relation::Toxicity),
            "synergism" => Ok(Relation::Synergism),
            "progression" => Ok(Relation::Progression),
            other => Err(TheramatchError::Config(format!("unknown relation '{}'", other))),
        }
    }
}

// ── Sign ─────────────────────────────────────────────────────────────────────

/// Direction of a reported or prevalent effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sign {
    Negative,
    Neutral,
    Positive,
}

/// Numeric value of each sign, indexed by `Sign::index`.
const SIGN_VALUES: [i8; 3] = [-1, 0, 1];

impl Sign {
    /// Fixed evaluation order: negative, neutral, positive.
    pub const ALL: [Sign; 3] = [Sign::Negative, Sign::Neutral, Sign::Positive];

    pub fn index(&self) -> usize {
        match self {
            Sign::Negative => 0,
            Sign::Neutral => 1,
            Sign::Positive => 2,
        }
    }

    pub fn value(&self) -> i8 {
        SIGN_VALUES[self.index()]
    }

    pub fn from_value(value: i64) -> Option<Self> {
        SIGN_VALUES
            .iter()
            .position(|&v| i64::from(v) == value)
            .map(|i| Sign::ALL[i])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sign::Negative => "negative",
            Sign::Neutral => "neutral",
            Sign::Positive => "positive",
        }
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Assay class ──────────────────────────────────────────────────────────────

/// Ordinal strength of the study design behind a record (1 = weakest, 7 = strongest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AssayClass(u8);

const ASSAY_CLASS_LABELS: [&str; 7] = [
    "animal, in vitro",
    "animal, in vivo",
    "human, in vitro",
    "human xenograft",
    "clinical study / non randomized clinical trial",
    "randomized controlled trial",
    "meta-analysis",
];

impl AssayClass {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 7;

    pub fn new(class: i64) -> Option<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&class) {
            Some(Self(class as u8))
        } else {
            None
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Design weight: 6 × 2^(class − 1), i.e. 6, 12, 24 … 384.
    pub fn model_score(&self) -> f64 {
        6.0 * 2f64.powi(i32::from(self.0) - 1)
    }

    pub fn label(&self) -> &'static str {
        ASSAY_CLASS_LABELS[usize::from(self.0 - 1)]
    }
}

impl TryFrom<i64> for AssayClass {
    type Error = String;

    fn try_from(value: i64) -> std::result::Result<Self, Self::Error> {
        AssayClass::new(value).ok_or_else(|| format!("assay class {} outside 1..=7", value))
    }
}

impl From<AssayClass> for i64 {
    fn from(class: AssayClass) -> i64 {
        i64::from(class.0)
    }
}

// ── Condition key ────────────────────────────────────────────────────────────

/// Build the condition key for a molecule, its state, and a modifier.
///
/// The three parts are joined with single spaces. This string is the join
/// key between evidence records and patient-result tokens, so its format
/// must not change.
pub fn condition_key(molecule: &str, state: &str, modifier: &str) -> String {
    format!("{} {} {}", molecule, state, modifier)
}

// ── Evidence records ─────────────────────────────────────────────────────────

/// An evidence record as handed over by the ingestion side.
/// Numeric fields may be missing; `validate` turns this into an `EvidenceRecord`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvidenceRecord {
    /// Source row identifier, if the loader kept one.
    #[serde(default)]
    pub record_id: Option<u64>,
    pub drug_name: String,
    pub condition: String,
    pub relation: Relation,
    #[serde(default)]
    pub assay_class: Option<i64>,
    #[serde(default)]
    pub sample_size: Option<i64>,
    #[serde(default)]
    pub direction_sign: Option<i64>,
}

/// A validated, immutable evidence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub record_id: Option<u64>,
    pub drug_name: String,
    pub condition: String,
    pub relation: Relation,
    pub assay_class: AssayClass,
    pub sample_size: u32,
    pub direction_sign: Sign,
}

impl RawEvidenceRecord {
    /// Human-readable identity used in validation errors: the source id if
    /// present, otherwise the position within the batch.
    pub fn describe(&self, position: usize) -> String {
        match self.record_id {
            Some(id) => format!("#{} ({} / {})", id, self.drug_name, self.condition),
            None => format!("at position {} ({} / {})", position, self.drug_name, self.condition),
        }
    }

    /// Check required fields and ranges.
    pub fn validate(&self, position: usize) -> Result<EvidenceRecord> {
        let invalid = |reason: String| TheramatchError::InvalidRecord {
            record: self.describe(position),
            reason,
        };

        if self.drug_name.trim().is_empty() {
            return Err(invalid("missing drug name".to_string()));
        }
        if self.condition.is_empty() {
            return Err(invalid("missing condition".to_string()));
        }

        let assay_class = self
            .assay_class
            .ok_or_else(|| invalid("missing assay class".to_string()))?;
        let assay_class = AssayClass::new(assay_class)
            .ok_or_else(|| invalid(format!("assay class {} outside 1..=7", assay_class)))?;

        let sample_size = self
            .sample_size
            .ok_or_else(|| invalid("missing sample size".to_string()))?;
        let sample_size = u32::try_from(sample_size).map_err(|_| {
            invalid(format!("sample size {} is not a non-negative count", sample_size))
        })?;

        let direction = self
            .direction_sign
            .ok_or_else(|| invalid("missing direction sign".to_string()))?;
        let direction_sign = Sign::from_value(direction)
            .ok_or_else(|| invalid(format!("direction sign {} not in {{-1, 0, 1}}", direction)))?;

        Ok(EvidenceRecord {
            record_id: self.record_id,
            drug_name: self.drug_name.clone(),
            condition: self.condition.clone(),
            relation: self.relation,
            assay_class,
            sample_size,
            direction_sign,
        })
    }
}

impl EvidenceRecord {
    /// Case-count weight: cases / 10, floored at 1.
    pub fn size_score(&self) -> f64 {
        (f64::from(self.sample_size) / 10.0).max(1.0)
    }

    /// Per-record evidence weight: model score × size score.
    pub fn evidence_score(&self) -> f64 {
        self.assay_class.model_score() * self.size_score()
    }

    pub fn hypothesis_key(&self) -> HypothesisKey {
        HypothesisKey {
            drug_name: self.drug_name.clone(),
            condition: self.condition.clone(),
            relation: self.relation,
        }
    }
}

// ── Hypothesis key ───────────────────────────────────────────────────────────

/// Identity of a hypothesis: one drug, one condition, one relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HypothesisKey {
    pub drug_name: String,
    pub condition: String,
    pub relation: Relation,
}

impl fmt::Display for HypothesisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({})", self.drug_name, self.condition, self.relation)
    }
}
