//! Decision resolution
//!
//! The decision is the most restrictive action among all findings, using
//! the ordering `allow < warn < redact < block`.

use promptwall_core::Decision;

use crate::engine::Finding;

/// Explanation returned when nothing matched
pub const NO_RISKS_EXPLANATION: &str = "No risks detected";

/// Verdict for one evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub decision: Decision,
    pub explanation: String,
}

/// Resolve a decision and its explanation from the aggregated findings
pub fn resolve(findings: &[Finding]) -> Resolution {
    let Some(decision) = findings.iter().map(|f| f.action).max() else {
        return Resolution {
            decision: Decision::Allow,
            explanation: NO_RISKS_EXPLANATION.to_string(),
        };
    };

    let mut reasons: Vec<&str> = Vec::new();
    for finding in findings.iter().filter(|f| f.action == decision) {
        let reason = finding.risk.explanation.as_str();
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }

    Resolution {
        decision,
        explanation: format!("{}: {}", summary(decision), reasons.join("; ")),
    }
}

fn summary(decision: Decision) -> &'static str {
    match decision {
        Decision::Block => "Blocked",
        Decision::Redact => "Redacted",
        Decision::Warn => "Warning",
        Decision::Allow => "Allowed",
    }
}
