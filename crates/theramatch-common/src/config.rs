//! Engine configuration.
//! Reads theramatch.toml from the current directory or the path in the THERAMATCH_CONFIG env var.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::entities::Relation;
use crate::error::{Result, TheramatchError};

/// Tunables for evidence summarization and drug ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reference point for informative-condition selection and the ranking Z statistic
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Relation that ranking and informative-condition queries operate on
    #[serde(default = "default_relation")]
    pub relation: Relation,

    /// Hypothesis-group count above which aggregation runs on the rayon pool
    #[serde(default = "default_parallel_threshold")]
    pub parallel_threshold: usize,

    /// Drugs to consider; empty means every drug present in the evidence
    #[serde(default)]
    pub candidate_drugs: Vec<String>,
}

fn default_threshold() -> f64 { 0.5 }
fn default_relation() -> Relation { Relation::Efficacy }
fn default_parallel_threshold() -> usize { 64 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            relation: default_relation(),
            parallel_threshold: default_parallel_threshold(),
            candidate_drugs: vec![],
        }
    }
}

impl EngineConfig {
    /// Load configuration from theramatch.toml.
    /// Checks THERAMATCH_CONFIG env var first, then the current directory.
    /// Falls back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = std::env::var("THERAMATCH_CONFIG")
            .unwrap_or_else(|_| "theramatch.toml".to_string());

        if !Path::new(&path).exists() {
            tracing::debug!("No config file at {}; using defaults", path);
            return Ok(Self::default());
        }

        Self::from_toml(&path)
    }

    pub fn from_toml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from YAML file
    pub fn from_yaml(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..1.0).contains(&self.threshold) {
            return Err(TheramatchError::Config(format!(
                "threshold must lie in [0, 1), got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert!((config.threshold - 0.5).abs() < 1e-12);
        assert_eq!(config.relation, Relation::Efficacy);
        assert!(config.candidate_drugs.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = EngineConfig::from_toml_str("relation = \"toxicity\"\n").unwrap();
        assert_eq!(config.relation, Relation::Toxicity);
        assert!((config.threshold - 0.5).abs() < 1e-12);
        assert_eq!(config.parallel_threshold, 64);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let err = EngineConfig::from_toml_str("threshold = 1.5\n").unwrap_err();
        assert!(matches!(err, TheramatchError::Config(_)));
    }

    #[test]
    fn test_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "threshold: 0.6\ncandidate_drugs: [erlotinib, gefitinib]").unwrap();
        let config = EngineConfig::from_yaml(file.path().to_str().unwrap()).unwrap();
        assert!((config.threshold - 0.6).abs() < 1e-12);
        pretty_assertions::assert_eq!(
            config.candidate_drugs,
            vec!["erlotinib".to_string(), "gefitinib".to_string()]
        );
    }
}
