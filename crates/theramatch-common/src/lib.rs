//! theramatch-common — Shared types, errors, and configuration used across all Theramatch crates.

pub mod error;
pub mod entities;
pub mod config;

// Re-export commonly used types
pub use config::EngineConfig;
pub use entities::{
    condition_key, AssayClass, EvidenceRecord, HypothesisKey, RawEvidenceRecord, Relation, Sign,
};
pub use error::{Result, TheramatchError};
