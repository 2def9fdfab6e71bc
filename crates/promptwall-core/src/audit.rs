//! Audit seam between the evaluator and whatever persists its history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Decision, QueryResponse, Result, RiskType, Severity};

/// Summary of one completed evaluation, as handed to an [`AuditSink`].
///
/// Carries classifications only, never the inspected text or match content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub risks: Vec<AuditRisk>,

    /// Version of the rule set the evaluation ran against
    pub rule_set_version: u64,

    #[serde(default)]
    pub prompt_modified: bool,

    #[serde(default)]
    pub response_modified: bool,
}

impl AuditRecord {
    /// Build the audit summary of a finished response
    pub fn from_response(response: &QueryResponse, rule_set_version: u64) -> Self {
        Self {
            request_id: response.metadata.request_id.clone(),
            timestamp: response.metadata.timestamp,
            decision: response.decision,
            risks: response
                .risks
                .iter()
                .map(|r| AuditRisk {
                    risk_type: r.risk_type,
                    severity: r.severity,
                })
                .collect(),
            rule_set_version,
            prompt_modified: response.prompt_modified.is_some(),
            response_modified: response.response_modified.is_some(),
        }
    }

    /// Highest severity among the recorded risks
    pub fn max_severity(&self) -> Option<Severity> {
        self.risks.iter().map(|r| r.severity).max()
    }
}

/// Risk classification as recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRisk {
    #[serde(rename = "type")]
    pub risk_type: RiskType,
    pub severity: Severity,
}

/// Destination for audit records.
///
/// Implementations must not block the caller; failures are reported back
/// but the evaluator only logs them.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<()>;
}

/// Sink that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardAuditSink;

impl AuditSink for DiscardAuditSink {
    fn record(&self, _record: AuditRecord) -> Result<()> {
        Ok(())
    }
}
