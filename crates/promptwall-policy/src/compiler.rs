//! Rule compilation
//!
//! Turns an operator-authored [`PolicyRule`] into an executable matcher.
//! Compilation is pure; a failure names the rule and never panics.

use promptwall_core::{Error, Result};
use regex::RegexBuilder;

use crate::matcher::{KeywordMatcher, Matcher, RegexMatcher};
use crate::rule::{PatternType, PolicyRule};

/// Upper bound on the compiled size of one rule's regex program
const REGEX_SIZE_LIMIT: usize = 2 * 1024 * 1024;

/// Upper bound on the lazy DFA cache of one rule's regex
const REGEX_DFA_SIZE_LIMIT: usize = 4 * 1024 * 1024;

/// Maximum nesting depth of groups and repetitions in a pattern
const REGEX_NEST_LIMIT: u32 = 64;

/// A rule paired with its executable matcher
#[derive(Debug, Clone)]
pub(crate) struct CompiledRule {
    pub(crate) rule: PolicyRule,
    pub(crate) matcher: Matcher,
}

/// Compile one rule
pub(crate) fn compile(rule: PolicyRule) -> Result<CompiledRule> {
    rule.validate()?;

    let matcher = match rule.pattern_type {
        PatternType::Keyword => KeywordMatcher::new(&rule.pattern)
            .map(Matcher::Keyword)
            .map_err(|reason| Error::compile(&rule.name, reason))?,
        PatternType::Regex => {
            let regex = RegexBuilder::new(&rule.pattern)
                .size_limit(REGEX_SIZE_LIMIT)
                .dfa_size_limit(REGEX_DFA_SIZE_LIMIT)
                .nest_limit(REGEX_NEST_LIMIT)
                .build()
                .map_err(|e| Error::compile(&rule.name, e.to_string()))?;
            Matcher::Regex(RegexMatcher::new(regex))
        }
    };

    Ok(CompiledRule { rule, matcher })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::PatternMatcher;

    #[test]
    fn test_compile_keyword() {
        let compiled = compile(PolicyRule::keyword("secret", "secret")).unwrap();
        assert!(matches!(compiled.matcher, Matcher::Keyword(_)));
        assert_eq!(compiled.matcher.pattern(), "secret");
        assert_eq!(compiled.matcher.find_spans("SeCrEt").len(), 1);
    }

    #[test]
    fn test_compile_regex() {
        let compiled = compile(PolicyRule::regex("ssn", r"\d{3}-\d{2}-\d{4}")).unwrap();
        assert!(matches!(compiled.matcher, Matcher::Regex(_)));
        assert_eq!(compiled.matcher.pattern(), r"\d{3}-\d{2}-\d{4}");
        assert_eq!(compiled.rule.name, "ssn");
    }

    #[test]
    fn test_invalid_regex_is_compile_error() {
        let err = compile(PolicyRule::regex("broken", r"(unclosed")).unwrap_err();
        assert_eq!(err.kind(), "compile_error");
        assert_eq!(err.rule_name(), Some("broken"));
    }

    #[test]
    fn test_backreferences_are_rejected() {
        // Not supported by a finite-automaton engine
        let err = compile(PolicyRule::regex("backref", r"(a)\1")).unwrap_err();
        assert_eq!(err.kind(), "compile_error");
    }

    #[test]
    fn test_oversized_regex_is_rejected() {
        let err = compile(PolicyRule::regex("huge", r"\w{1000}{1000}")).unwrap_err();
        assert_eq!(err.kind(), "compile_error");
    }

    #[test]
    fn test_regex_is_case_sensitive_unless_flagged() {
        let plain = compile(PolicyRule::regex("p", "secret")).unwrap();
        assert!(plain.matcher.find_spans("SECRET").is_empty());

        let flagged = compile(PolicyRule::regex("p", "(?i)secret")).unwrap();
        assert_eq!(flagged.matcher.find_spans("SECRET").len(), 1);
    }

    #[test]
    fn test_validation_runs_before_compilation() {
        let err = compile(PolicyRule::regex("", "(")).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }
}
