//! Reading evidence batches handed over by the ingestion side.

use anyhow::Context;
use std::path::Path;
use theramatch_common::{RawEvidenceRecord, TheramatchError};
use theramatch_ranker::RecordRejection;

/// Records read from an evidence file, tagged with their position in it,
/// plus the entries that could not be read as records at all.
#[derive(Debug, Default)]
pub struct EvidenceFile {
    pub records: Vec<(usize, RawEvidenceRecord)>,
    pub rejected: Vec<RecordRejection>,
}

/// Read a JSON array of evidence records.
///
/// Only a file that is not a JSON array fails as a whole. An element with a
/// wrongly typed field or an unknown relation is rejected on its own.
pub fn read_evidence(path: &Path) -> anyhow::Result<EvidenceFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading evidence file {}", path.display()))?;
    let values: Vec<serde_json::Value> = serde_json::from_str(&content)
        .with_context(|| format!("parsing evidence records in {}", path.display()))?;

    let mut file = EvidenceFile::default();
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawEvidenceRecord>(value) {
            Ok(record) => file.records.push((position, record)),
            Err(e) => file.rejected.push(RecordRejection {
                position,
                error: TheramatchError::InvalidRecord {
                    record: format!("at position {}", position),
                    reason: e.to_string(),
                },
            }),
        }
    }
    Ok(file)
}
