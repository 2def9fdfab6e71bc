//! Hash-chained audit records
//!
//! Every persisted record carries the SHA-256 of its own content plus the
//! hash of the record before it, so editing or removing an entry breaks the
//! chain from that point on.

use promptwall_core::AuditRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// An audit record as written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainedRecord {
    /// Unique entry ID
    pub id: String,

    /// Position in the chain, starting at 1
    pub sequence: u64,

    #[serde(flatten)]
    pub record: AuditRecord,

    /// Hash of the preceding entry
    pub previous_hash: Option<String>,

    /// Hash of this entry
    pub hash: String,
}

impl ChainedRecord {
    /// Recompute this entry's hash from its content
    pub fn compute_hash(&self) -> serde_json::Result<String> {
        compute_hash(
            &self.id,
            self.sequence,
            &self.record,
            self.previous_hash.as_deref(),
        )
    }
}

/// Running state of the hash chain
#[derive(Debug, Clone, Default)]
pub struct AuditChain {
    sequence: u64,
    last_hash: Option<String>,
}

impl AuditChain {
    /// Start a new chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a chain after its last persisted entry
    pub fn resume(last: &ChainedRecord) -> Self {
        Self {
            sequence: last.sequence,
            last_hash: Some(last.hash.clone()),
        }
    }

    /// Sequence number of the last chained entry (0 when empty)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Hash of the last chained entry
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    /// Append a record to the chain
    pub fn chain(&mut self, record: AuditRecord) -> serde_json::Result<ChainedRecord> {
        let id = format!("aud_{}", uuid::Uuid::new_v4());
        let sequence = self.sequence + 1;
        let hash = compute_hash(&id, sequence, &record, self.last_hash.as_deref())?;

        let chained = ChainedRecord {
            id,
            sequence,
            record,
            previous_hash: self.last_hash.take(),
            hash: hash.clone(),
        };

        self.sequence = sequence;
        self.last_hash = Some(hash);
        Ok(chained)
    }

    /// Check that `records` form an unbroken chain, in order
    pub fn verify(records: &[ChainedRecord]) -> bool {
        let mut previous: Option<&ChainedRecord> = None;

        for record in records {
            if let Some(prev) = previous {
                if record.previous_hash.as_deref() != Some(prev.hash.as_str())
                    || record.sequence != prev.sequence + 1
                {
                    return false;
                }
            }

            match record.compute_hash() {
                Ok(hash) if hash == record.hash => {}
                _ => return false,
            }

            previous = Some(record);
        }

        true
    }
}

fn compute_hash(
    id: &str,
    sequence: u64,
    record: &AuditRecord,
    previous_hash: Option<&str>,
) -> serde_json::Result<String> {
    let mut hasher = Sha256::new();

    hasher.update(id.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(serde_json::to_vec(record)?);
    if let Some(prev) = previous_hash {
        hasher.update(prev.as_bytes());
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use promptwall_core::{AuditRisk, Decision, RiskType, Severity};

    fn record(decision: Decision) -> AuditRecord {
        AuditRecord {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            decision,
            risks: vec![AuditRisk {
                risk_type: RiskType::Pii,
                severity: Severity::High,
            }],
            rule_set_version: 1,
            prompt_modified: decision == Decision::Redact,
            response_modified: false,
        }
    }

    #[test]
    fn test_chain_links_records() {
        let mut chain = AuditChain::new();
        let first = chain.chain(record(Decision::Redact)).unwrap();
        let second = chain.chain(record(Decision::Block)).unwrap();

        assert_eq!(first.sequence, 1);
        assert!(first.previous_hash.is_none());
        assert_eq!(second.previous_hash.as_deref(), Some(first.hash.as_str()));
        assert_eq!(chain.sequence(), 2);
        assert_eq!(chain.last_hash(), Some(second.hash.as_str()));
        assert!(AuditChain::verify(&[first, second]));
    }

    #[test]
    fn test_tamper_detection() {
        let mut chain = AuditChain::new();
        let mut records = vec![
            chain.chain(record(Decision::Block)).unwrap(),
            chain.chain(record(Decision::Warn)).unwrap(),
        ];

        records[0].record.decision = Decision::Allow;
        assert!(!AuditChain::verify(&records));
    }

    #[test]
    fn test_removed_entry_breaks_chain() {
        let mut chain = AuditChain::new();
        let records: Vec<_> = (0..3)
            .map(|_| chain.chain(record(Decision::Warn)).unwrap())
            .collect();

        assert!(!AuditChain::verify(&[records[0].clone(), records[2].clone()]));
    }

    #[test]
    fn test_resume_continues_sequence() {
        let mut chain = AuditChain::new();
        let last = chain.chain(record(Decision::Allow)).unwrap();

        let mut resumed = AuditChain::resume(&last);
        let next = resumed.chain(record(Decision::Allow)).unwrap();
        assert_eq!(next.sequence, 2);
        assert!(AuditChain::verify(&[last, next]));
    }

    #[test]
    fn test_serialized_hash_still_verifies() {
        let mut chain = AuditChain::new();
        let chained = chain.chain(record(Decision::Redact)).unwrap();

        let line = serde_json::to_string(&chained).unwrap();
        let parsed: ChainedRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, chained);
        assert!(AuditChain::verify(&[parsed]));
    }
}
