//! PromptWall Policy Engine
//!
//! Deterministic, rule-driven evaluation of LLM prompts and responses.
//!
//! Rules are declared as data (YAML or JSON) and specify:
//! - A pattern (case-insensitive keyword or regular expression)
//! - A risk classification (PII, PHI, prompt injection, other) and severity
//! - An enforcement action (block, redact, warn, allow)
//!
//! The [`RuleStore`] holds the active rule set as an atomically swapped
//! snapshot; [`Firewall`] evaluates queries against it.

mod compiler;
pub mod engine;
pub mod firewall;
pub mod matcher;
pub mod redactor;
pub mod resolver;
pub mod rule;
pub mod store;

pub use engine::{aggregate, Finding};
pub use firewall::{evaluate_snapshot, EvaluationState, Firewall};
pub use matcher::{KeywordMatcher, MatchSpan, Matcher, PatternMatcher, RegexMatcher};
pub use redactor::{placeholder, redact, RedactionSpan};
pub use resolver::{resolve, Resolution, NO_RISKS_EXPLANATION};
pub use rule::{PatternType, PolicyDocument, PolicyRule};
pub use store::{RuleSet, RuleStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::firewall::Firewall;
    pub use crate::rule::{PatternType, PolicyDocument, PolicyRule};
    pub use crate::store::{RuleSet, RuleStore};
}
