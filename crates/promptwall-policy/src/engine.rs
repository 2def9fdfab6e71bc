//! Risk aggregation
//!
//! Runs every enabled rule of a snapshot over the prompt and the response
//! and collects one [`Finding`] per match. There is no short-circuit: a
//! `block` finding does not stop later rules from being evaluated, so the
//! caller always gets the full risk list.

use promptwall_core::{Action, Error, Result, Risk, TextField};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error};

use crate::matcher::{MatchSpan, PatternMatcher};
use crate::rule::PolicyRule;
use crate::store::RuleSet;

/// One rule match against one field, with the context needed downstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// The risk as reported to the caller
    pub risk: Risk,

    /// Name of the rule that fired
    pub rule_name: String,

    /// Action of the rule that fired
    pub action: Action,

    /// Which text the span refers to
    pub field: TextField,

    /// Byte range of the match in that text
    pub span: MatchSpan,
}

/// Evaluate every enabled rule of `rules` against the given texts.
///
/// Findings are ordered by rule, then prompt before response, then by span
/// position. A rule whose matcher fails is skipped for this call only.
pub fn aggregate(rules: &RuleSet, prompt: Option<&str>, response: Option<&str>) -> Vec<Finding> {
    let fields: Vec<(TextField, &str)> = [(TextField::Prompt, prompt), (TextField::Response, response)]
        .into_iter()
        .filter_map(|(field, text)| text.map(|t| (field, t)))
        .collect();

    let mut findings = Vec::new();
    for compiled in rules.active() {
        findings.extend(scan_rule(&compiled.rule, &compiled.matcher, &fields));
    }

    debug!(
        version = rules.version(),
        rules = rules.enabled_len(),
        findings = findings.len(),
        "Aggregated findings"
    );

    findings
}

fn scan_rule(
    rule: &PolicyRule,
    matcher: &dyn PatternMatcher,
    fields: &[(TextField, &str)],
) -> Vec<Finding> {
    let spans = match find_all(rule, matcher, fields) {
        Ok(spans) => spans,
        Err(e) => {
            error!(rule = %rule.name, error = %e, "Skipping rule for this evaluation");
            return Vec::new();
        }
    };

    let explanation = rule.explanation();
    spans
        .into_iter()
        .map(|(field, span)| {
            let mut risk = Risk::new(rule.risk_type, rule.severity, explanation.clone());
            if rule.include_match {
                risk = risk.with_match(span.text.clone());
            }
            Finding {
                risk,
                rule_name: rule.name.clone(),
                action: rule.action,
                field,
                span,
            }
        })
        .collect()
}

/// Run the matcher over every field, turning a matcher panic into an
/// evaluation error for the rule.
fn find_all(
    rule: &PolicyRule,
    matcher: &dyn PatternMatcher,
    fields: &[(TextField, &str)],
) -> Result<Vec<(TextField, MatchSpan)>> {
    catch_unwind(AssertUnwindSafe(|| {
        fields
            .iter()
            .flat_map(|&(field, text)| {
                matcher
                    .find_spans(text)
                    .into_iter()
                    .map(move |span| (field, span))
            })
            .collect::<Vec<_>>()
    }))
    .map_err(|payload| Error::evaluation(&rule.name, panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "matcher panicked"
    }
}
