//! Core types for PromptWall
//!
//! Field names and enumeration spellings in this module are the wire
//! contract shared with the demo UI, the admin console and the SDK.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Category of sensitive content a rule detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    /// Personally identifiable information
    Pii,
    /// Protected health information
    Phi,
    /// Attempts to override system instructions
    PromptInjection,
    Other,
}

impl RiskType {
    /// Wire spelling of this risk type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pii => "PII",
            Self::Phi => "PHI",
            Self::PromptInjection => "PROMPT_INJECTION",
            Self::Other => "OTHER",
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a rule, ordered `Low < Medium < High`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforcement action, ordered by restrictiveness:
/// `Allow < Warn < Redact < Block`.
///
/// The overall decision for a query is the maximum action among the rules
/// that fired, so declaration order here is load-bearing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Allow,
    Warn,
    Redact,
    Block,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Warn => "warn",
            Self::Redact => "redact",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The final verdict for a query uses the same scale as rule actions
pub type Decision = Action;

/// Which side of the model exchange a text belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextField {
    /// Inbound text sent to the model
    Prompt,
    /// Outbound text produced by the model
    Response,
}

impl TextField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prompt => "prompt",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detection reported to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    /// Risk type of the rule that fired
    #[serde(rename = "type")]
    pub risk_type: RiskType,

    /// Severity of the rule that fired
    pub severity: Severity,

    /// Why this matched
    pub explanation: String,

    /// The matched substring, withheld when the rule is configured not to
    /// surface it
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<String>,
}

impl Risk {
    /// Create a new risk without match text
    pub fn new(risk_type: RiskType, severity: Severity, explanation: impl Into<String>) -> Self {
        Self {
            risk_type,
            severity,
            explanation: explanation.into(),
            matched: None,
        }
    }

    /// Attach the matched substring
    pub fn with_match(mut self, matched: impl Into<String>) -> Self {
        self.matched = Some(matched.into());
        self
    }
}

/// Body of a query: the prompt, the response, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl QueryRequest {
    /// Query a prompt only
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            response: None,
        }
    }

    /// Query a response only
    pub fn response(response: impl Into<String>) -> Self {
        Self {
            prompt: None,
            response: Some(response.into()),
        }
    }

    /// Query both sides of an exchange
    pub fn exchange(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            response: Some(response.into()),
        }
    }

    /// The prompt, if present and non-empty
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|s| !s.is_empty())
    }

    /// The response, if present and non-empty
    pub fn response_text(&self) -> Option<&str> {
        self.response.as_deref().filter(|s| !s.is_empty())
    }

    /// Reject requests with nothing to inspect
    pub fn validate(&self) -> Result<()> {
        if self.prompt_text().is_none() && self.response_text().is_none() {
            return Err(Error::invalid_request(
                "At least one of 'prompt' or 'response' must be provided",
            ));
        }
        Ok(())
    }
}

/// Per-call metadata attached to every response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Opaque unique token generated per call
    pub request_id: String,

    /// Instant of evaluation
    pub timestamp: DateTime<Utc>,
}

impl ResponseMetadata {
    /// Fresh metadata for a new evaluation
    pub fn generate() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Result of evaluating one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub decision: Decision,

    /// Summary of why the decision was reached
    pub explanation: String,

    /// Every risk found, in evaluation order
    pub risks: Vec<Risk>,

    /// Redacted prompt, present only when the prompt was modified
    #[serde(default)]
    pub prompt_modified: Option<String>,

    /// Redacted response, present only when the response was modified
    #[serde(default)]
    pub response_modified: Option<String>,

    pub metadata: ResponseMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_ordering() {
        assert!(Action::Block > Action::Redact);
        assert!(Action::Redact > Action::Warn);
        assert!(Action::Warn > Action::Allow);
        assert_eq!(
            [Action::Warn, Action::Block, Action::Allow].iter().max(),
            Some(&Action::Block)
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_enum_wire_spelling() {
        let json = serde_json::to_string(&RiskType::PromptInjection).unwrap();
        assert_eq!(json, r#""PROMPT_INJECTION""#);

        let risk_type: RiskType = serde_json::from_str(r#""PHI""#).unwrap();
        assert_eq!(risk_type, RiskType::Phi);

        assert!(serde_json::from_str::<Action>(r#""deny""#).is_err());
        assert!(serde_json::from_str::<Severity>(r#""critical""#).is_err());
    }

    #[test]
    fn test_risk_serialization() {
        let risk = Risk::new(RiskType::Pii, Severity::High, "SSN detected").with_match("123-45-6789");
        let value = serde_json::to_value(&risk).unwrap();
        assert_eq!(value["type"], "PII");
        assert_eq!(value["severity"], "high");
        assert_eq!(value["match"], "123-45-6789");

        let withheld = Risk::new(RiskType::Phi, Severity::Low, "diagnosis code");
        let value = serde_json::to_value(&withheld).unwrap();
        assert!(value.get("match").is_none());
    }

    #[test]
    fn test_query_request_validation() {
        assert!(QueryRequest::default().validate().is_err());
        assert!(QueryRequest::prompt("").validate().is_err());
        assert!(QueryRequest::exchange("", "").validate().is_err());
        assert!(QueryRequest::prompt("hello").validate().is_ok());
        assert!(QueryRequest::response("hello").validate().is_ok());
    }

    #[test]
    fn test_query_response_wire_names() {
        let response = QueryResponse {
            decision: Action::Allow,
            explanation: "No risks detected".to_string(),
            risks: vec![],
            prompt_modified: None,
            response_modified: None,
            metadata: ResponseMetadata::generate(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["decision"], "allow");
        assert!(value["promptModified"].is_null());
        assert!(value["responseModified"].is_null());
        assert!(value["metadata"]["requestId"].is_string());
        assert!(value["metadata"]["timestamp"].is_string());
    }
}
