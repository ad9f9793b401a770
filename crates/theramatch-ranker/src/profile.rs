//! Patient test results.
//!
//! The requesting side sends results as comma-separated tokens, each a
//! condition key immediately followed by a one-character suffix:
//! `p` (positive, concordance +1), `m` (negative, concordance −1), anything
//! else (inconclusive, concordance 0). Inconclusive tokens are dropped
//! during parsing, so they behave exactly as if the condition were absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use theramatch_common::Sign;
use tracing::debug;

/// Non-neutral patient results keyed by condition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    results: BTreeMap<String, Sign>,
}

fn suffix_concordance(suffix: char) -> Sign {
    match suffix {
        'p' => Sign::Positive,
        'm' => Sign::Negative,
        _ => Sign::Neutral,
    }
}

impl PatientProfile {
    /// Parse the comma-separated token format. Never fails: unrecognized
    /// suffixes are treated as inconclusive. A later token for the same
    /// condition replaces an earlier one.
    pub fn parse(tokens: &str) -> Self {
        let mut profile = Self::default();
        for token in tokens.split(',').filter(|t| !t.is_empty()) {
            let Some(suffix) = token.chars().next_back() else {
                continue;
            };
            let condition = &token[..token.len() - suffix.len_utf8()];
            profile.insert(condition, suffix_concordance(suffix));
        }
        debug!("Parsed {} informative patient results", profile.len());
        profile
    }

    /// Record a result; neutral concordance is discarded.
    pub fn insert(&mut self, condition: &str, concordance: Sign) {
        if concordance != Sign::Neutral {
            self.results.insert(condition.to_string(), concordance);
        }
    }

    pub fn concordance(&self, condition: &str) -> Option<Sign> {
        self.results.get(condition).copied()
    }

    pub fn conditions(&self) -> impl Iterator<Item = &str> {
        self.results.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl FromIterator<(String, Sign)> for PatientProfile {
    fn from_iter<I: IntoIterator<Item = (String, Sign)>>(iter: I) -> Self {
        let mut profile = Self::default();
        for (condition, concordance) in iter {
            profile.insert(&condition, concordance);
        }
        profile
    }
}
