//! Policy rule definitions

use promptwall_core::{Action, Error, Result, RiskType, Severity};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a rule's `pattern` is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    /// Regular expression, matched with a linear-time engine
    #[default]
    Regex,
    /// Case-insensitive literal substring
    Keyword,
}

/// An operator-authored detection unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rule identifier, unique within a rule set
    pub name: String,

    /// Description of what this rule detects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Category reported for matches of this rule
    #[serde(alias = "riskType")]
    pub risk_type: RiskType,

    /// The pattern, interpreted per `pattern_type`
    pub pattern: String,

    #[serde(default, alias = "patternType")]
    pub pattern_type: PatternType,

    pub severity: Severity,

    /// Enforcement action when this rule fires
    pub action: Action,

    /// Whether this rule is evaluated
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether risks from this rule carry the matched text
    #[serde(default = "default_true", alias = "includeMatch")]
    pub include_match: bool,
}

fn default_true() -> bool {
    true
}

impl PolicyRule {
    /// Create a regex rule with default classification
    /// (`OTHER`, `medium`, `warn`)
    pub fn regex(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, pattern, PatternType::Regex)
    }

    /// Create a keyword rule with default classification
    /// (`OTHER`, `medium`, `warn`)
    pub fn keyword(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, pattern, PatternType::Keyword)
    }

    fn new(name: impl Into<String>, pattern: impl Into<String>, pattern_type: PatternType) -> Self {
        Self {
            name: name.into(),
            description: None,
            risk_type: RiskType::Other,
            pattern: pattern.into(),
            pattern_type,
            severity: Severity::Medium,
            action: Action::Warn,
            enabled: true,
            include_match: true,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the risk type
    pub fn with_risk_type(mut self, risk_type: RiskType) -> Self {
        self.risk_type = risk_type;
        self
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Set the action
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    /// Set whether the rule is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set whether risks carry the matched text
    pub fn with_include_match(mut self, include_match: bool) -> Self {
        self.include_match = include_match;
        self
    }

    /// Check the structural invariants that hold regardless of pattern type
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation(&self.name, "rule name cannot be empty"));
        }

        if self.pattern.is_empty() {
            return Err(Error::validation(&self.name, "pattern cannot be empty"));
        }

        Ok(())
    }

    /// Human-readable reason attached to risks produced by this rule
    pub fn explanation(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => description.to_string(),
            _ => format!("Matched {} rule '{}'", self.risk_type, self.name),
        }
    }
}

/// A list of rules as exchanged with the admin console and stored on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl PolicyDocument {
    pub fn new(rules: Vec<PolicyRule>) -> Self {
        Self { rules }
    }

    /// Load a rule list from YAML string
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load a rule list from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| {
            Error::config(format!("failed to parse policy file {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_deserialization() {
        let json = r#"{
            "name": "ssn",
            "description": "US social security number",
            "risk_type": "PII",
            "pattern": "\\d{3}-\\d{2}-\\d{4}",
            "pattern_type": "regex",
            "severity": "high",
            "action": "redact",
            "enabled": true
        }"#;

        let rule: PolicyRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.name, "ssn");
        assert_eq!(rule.risk_type, RiskType::Pii);
        assert_eq!(rule.pattern, r"\d{3}-\d{2}-\d{4}");
        assert_eq!(rule.action, Action::Redact);
        assert!(rule.include_match);
    }

    #[test]
    fn test_rule_accepts_camel_case_aliases() {
        let json = r#"{
            "name": "override",
            "riskType": "PROMPT_INJECTION",
            "pattern": "ignore previous instructions",
            "patternType": "keyword",
            "severity": "high",
            "action": "block",
            "includeMatch": false
        }"#;

        let rule: PolicyRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.risk_type, RiskType::PromptInjection);
        assert_eq!(rule.pattern_type, PatternType::Keyword);
        assert!(rule.enabled);
        assert!(!rule.include_match);
    }

    #[test]
    fn test_rule_rejects_unknown_enum_values() {
        let json = r#"{
            "name": "bad",
            "risk_type": "SECRETS",
            "pattern": "x",
            "severity": "high",
            "action": "block"
        }"#;
        assert!(serde_json::from_str::<PolicyRule>(json).is_err());
    }

    #[test]
    fn test_rule_validation() {
        assert!(PolicyRule::keyword("secret", "secret").validate().is_ok());

        let err = PolicyRule::keyword("  ", "secret").validate().unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let err = PolicyRule::regex("empty", "").validate().unwrap_err();
        assert_eq!(err.rule_name(), Some("empty"));
    }

    #[test]
    fn test_explanation_prefers_description() {
        let rule = PolicyRule::regex("ssn", r"\d").with_risk_type(RiskType::Pii);
        assert_eq!(rule.explanation(), "Matched PII rule 'ssn'");

        let rule = rule.with_description("Social security number");
        assert_eq!(rule.explanation(), "Social security number");
    }

    #[test]
    fn test_document_from_yaml() {
        let yaml = r#"
rules:
  - name: ssn
    risk_type: PII
    pattern: '\d{3}-\d{2}-\d{4}'
    severity: high
    action: redact
  - name: override
    risk_type: PROMPT_INJECTION
    pattern: ignore previous instructions
    pattern_type: keyword
    severity: high
    action: block
    enabled: false
"#;

        let document = PolicyDocument::from_yaml(yaml).unwrap();
        assert_eq!(document.rules.len(), 2);
        assert_eq!(document.rules[0].pattern_type, PatternType::Regex);
        assert!(!document.rules[1].enabled);
    }

    #[test]
    fn test_document_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.yaml");
        std::fs::write(
            &path,
            "rules:\n  - name: k\n    risk_type: OTHER\n    pattern: k\n    pattern_type: keyword\n    severity: low\n    action: warn\n",
        )
        .unwrap();

        let document = PolicyDocument::from_file(&path).unwrap();
        assert_eq!(document.rules[0].name, "k");

        std::fs::write(&path, "rules: [ {").unwrap();
        let err = PolicyDocument::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), "configuration_error");
    }
}
