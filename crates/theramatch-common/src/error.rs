use thiserror::Error;

#[derive(Debug, Error)]
pub enum TheramatchError {
    #[error("Invalid evidence record {record}: {reason}")]
    InvalidRecord { record: String, reason: String },

    #[error("Insufficient evidence for hypothesis {key}: total score is zero")]
    InsufficientEvidence { key: String },

    #[error("Degenerate variance for {sign} cell of hypothesis {key}")]
    DegenerateVariance { key: String, sign: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TheramatchError>;
