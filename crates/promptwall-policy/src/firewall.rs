//! Evaluation orchestrator
//!
//! [`Firewall`] drives one query through aggregation, resolution and,
//! when the decision is `redact`, redaction. Each call works on a single
//! rule set snapshot taken before aggregation, so a concurrent policy
//! update never changes the rules halfway through an evaluation.

use promptwall_core::{
    AuditRecord, AuditSink, Decision, DiscardAuditSink, QueryRequest, QueryResponse,
    ResponseMetadata, Result, TextField,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::{aggregate, Finding};
use crate::redactor::{redact, RedactionSpan};
use crate::resolver::resolve;
use crate::store::{RuleSet, RuleStore};

/// Lifecycle of a single evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Received,
    Aggregating,
    Resolving,
    Redacting,
    Completed,
    Rejected,
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Aggregating => "aggregating",
            Self::Resolving => "resolving",
            Self::Redacting => "redacting",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        };
        f.write_str(name)
    }
}

/// The policy engine entry point
#[derive(Clone)]
pub struct Firewall {
    store: Arc<RuleStore>,
    audit: Arc<dyn AuditSink>,
}

impl Firewall {
    /// Create a firewall over `store` that discards audit records
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self {
            store,
            audit: Arc::new(DiscardAuditSink),
        }
    }

    /// Send one audit record per completed evaluation to `sink`
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// The rule store backing this firewall
    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    /// Evaluate a query against the currently active rule set
    pub fn evaluate(&self, request: &QueryRequest) -> Result<QueryResponse> {
        transition(EvaluationState::Received);
        if let Err(e) = request.validate() {
            transition(EvaluationState::Rejected);
            return Err(e);
        }

        let snapshot = self.store.snapshot();
        let response = evaluate_snapshot(&snapshot, request);

        let record = AuditRecord::from_response(&response, snapshot.version());
        if let Err(e) = self.audit.record(record) {
            warn!(
                request_id = %response.metadata.request_id,
                error = %e,
                "Failed to record audit entry"
            );
        }

        Ok(response)
    }
}

impl fmt::Debug for Firewall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Firewall")
            .field("version", &self.store.snapshot().version())
            .finish_non_exhaustive()
    }
}

/// Evaluate a validated query against a specific snapshot.
///
/// Does not emit audit records.
pub fn evaluate_snapshot(rules: &RuleSet, request: &QueryRequest) -> QueryResponse {
    let prompt = request.prompt_text();
    let response = request.response_text();

    transition(EvaluationState::Aggregating);
    let findings = aggregate(rules, prompt, response);

    transition(EvaluationState::Resolving);
    let resolution = resolve(&findings);

    let (prompt_modified, response_modified) = if resolution.decision == Decision::Redact {
        transition(EvaluationState::Redacting);
        (
            prompt.and_then(|text| redact_field(text, TextField::Prompt, &findings)),
            response.and_then(|text| redact_field(text, TextField::Response, &findings)),
        )
    } else {
        (None, None)
    };

    let metadata = ResponseMetadata::generate();
    transition(EvaluationState::Completed);
    debug!(
        request_id = %metadata.request_id,
        decision = %resolution.decision,
        risks = findings.len(),
        version = rules.version(),
        "Evaluation completed"
    );

    QueryResponse {
        decision: resolution.decision,
        explanation: resolution.explanation,
        risks: findings.into_iter().map(|f| f.risk).collect(),
        prompt_modified,
        response_modified,
        metadata,
    }
}

// Only redact-action findings alter text; `None` when nothing in this field
// was redacted.
fn redact_field(text: &str, field: TextField, findings: &[Finding]) -> Option<String> {
    let spans: Vec<RedactionSpan> = findings
        .iter()
        .filter(|f| f.field == field && f.action == Decision::Redact)
        .map(|f| RedactionSpan::new(f.span.range(), f.risk.risk_type, f.risk.severity))
        .collect();

    if spans.is_empty() {
        return None;
    }
    Some(redact(text, &spans))
}

fn transition(state: EvaluationState) {
    debug!(state = %state, "Evaluation state");
}
