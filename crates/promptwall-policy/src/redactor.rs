//! Text redaction
//!
//! Replaces matched ranges with `[REDACTED:<RISK_TYPE>]`. Overlapping
//! ranges are merged first so each placeholder covers a union of matches;
//! replacements are then applied from the end of the text backwards, which
//! keeps every offset valid against the original string.

use promptwall_core::{RiskType, Severity};
use std::ops::Range;

/// A range of text to redact, with the classification of the rule that
/// produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionSpan {
    pub start: usize,
    pub end: usize,
    pub risk_type: RiskType,
    pub severity: Severity,
}

impl RedactionSpan {
    pub fn new(range: Range<usize>, risk_type: RiskType, severity: Severity) -> Self {
        Self {
            start: range.start,
            end: range.end,
            risk_type,
            severity,
        }
    }
}

/// Placeholder substituted for a redacted range
pub fn placeholder(risk_type: RiskType) -> String {
    format!("[REDACTED:{}]", risk_type)
}

/// Redact `spans` out of `text`.
///
/// `spans` must be in aggregation order: when merged ranges tie on
/// severity, the earliest span names the placeholder. Ranges that are
/// empty, out of bounds or not on char boundaries are ignored.
pub fn redact(text: &str, spans: &[RedactionSpan]) -> String {
    let merged = merge(text, spans);
    if merged.is_empty() {
        return text.to_string();
    }

    let mut result = text.to_string();
    for span in merged.iter().rev() {
        result.replace_range(span.start..span.end, &placeholder(span.risk_type));
    }
    result
}

fn merge(text: &str, spans: &[RedactionSpan]) -> Vec<RedactionSpan> {
    // Keep each span's aggregation position so severity ties resolve to the
    // earliest contributor regardless of where it sits in the text.
    let mut ordered: Vec<(usize, RedactionSpan)> = spans
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, s)| {
            s.start < s.end
                && s.end <= text.len()
                && text.is_char_boundary(s.start)
                && text.is_char_boundary(s.end)
        })
        .collect();
    ordered.sort_by_key(|(index, s)| (s.start, *index));

    let mut merged: Vec<(usize, RedactionSpan)> = Vec::with_capacity(ordered.len());
    for (index, span) in ordered {
        match merged.last_mut() {
            Some((owner, current)) if span.start < current.end => {
                current.end = current.end.max(span.end);
                if span.severity > current.severity
                    || (span.severity == current.severity && index < *owner)
                {
                    current.risk_type = span.risk_type;
                    current.severity = span.severity;
                    *owner = index;
                }
            }
            _ => merged.push((index, span)),
        }
    }

    merged.into_iter().map(|(_, span)| span).collect()
}
