//! Span matching for compiled rules
//!
//! A compiled rule holds a [`Matcher`], a sum type over the two pattern
//! kinds operators can author. Both variants share one evaluation path
//! through [`PatternMatcher::find_spans`].

use aho_corasick::AhoCorasick;
use regex::Regex;
use std::ops::Range;

/// A match of one rule against one text, in byte offsets of that text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,

    /// The matched substring
    pub text: String,
}

impl MatchSpan {
    pub fn new(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Anything that can locate rule matches in a text
pub trait PatternMatcher: Send + Sync {
    /// Every non-overlapping match, leftmost first. Empty text yields nothing.
    fn find_spans(&self, text: &str) -> Vec<MatchSpan>;
}

/// Case-insensitive literal matcher.
///
/// ASCII keywords run on an Aho-Corasick automaton with ASCII case folding.
/// Keywords containing non-ASCII characters need Unicode case folding and
/// are matched with an escaped, case-insensitive regex instead.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keyword: String,
    engine: KeywordEngine,
}

#[derive(Debug, Clone)]
enum KeywordEngine {
    Ascii(AhoCorasick),
    Unicode(Regex),
}

impl KeywordMatcher {
    pub fn new(keyword: &str) -> Result<Self, String> {
        let engine = if keyword.is_ascii() {
            let automaton = AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .match_kind(aho_corasick::MatchKind::LeftmostFirst)
                .build([keyword])
                .map_err(|e| format!("failed to build keyword matcher: {}", e))?;
            KeywordEngine::Ascii(automaton)
        } else {
            let regex = regex::RegexBuilder::new(&regex::escape(keyword))
                .case_insensitive(true)
                .build()
                .map_err(|e| format!("failed to build keyword matcher: {}", e))?;
            KeywordEngine::Unicode(regex)
        };

        Ok(Self {
            keyword: keyword.to_string(),
            engine,
        })
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }
}

impl PatternMatcher for KeywordMatcher {
    fn find_spans(&self, text: &str) -> Vec<MatchSpan> {
        if text.is_empty() {
            return Vec::new();
        }

        match &self.engine {
            KeywordEngine::Ascii(automaton) => automaton
                .find_iter(text)
                .map(|m| MatchSpan::new(m.start(), m.end(), &text[m.start()..m.end()]))
                .collect(),
            KeywordEngine::Unicode(regex) => regex_spans(regex, text),
        }
    }
}

/// Regular expression matcher backed by the `regex` crate's finite
/// automata, so matching time is linear in the input.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl PatternMatcher for RegexMatcher {
    fn find_spans(&self, text: &str) -> Vec<MatchSpan> {
        if text.is_empty() {
            return Vec::new();
        }
        regex_spans(&self.regex, text)
    }
}

// Empty matches carry no evidence and cannot be redacted.
fn regex_spans(regex: &Regex, text: &str) -> Vec<MatchSpan> {
    regex
        .find_iter(text)
        .filter(|m| !m.is_empty())
        .map(|m| MatchSpan::new(m.start(), m.end(), m.as_str()))
        .collect()
}

/// Executable form of a rule pattern
#[derive(Debug, Clone)]
pub enum Matcher {
    Keyword(KeywordMatcher),
    Regex(RegexMatcher),
}

impl Matcher {
    /// Source pattern this matcher was built from
    pub fn pattern(&self) -> &str {
        match self {
            Self::Keyword(m) => m.keyword(),
            Self::Regex(m) => m.as_str(),
        }
    }
}

impl PatternMatcher for Matcher {
    fn find_spans(&self, text: &str) -> Vec<MatchSpan> {
        match self {
            Self::Keyword(m) => m.find_spans(text),
            Self::Regex(m) => m.find_spans(text),
        }
    }
}
