//! Hot-swappable rule store
//!
//! The active rule set is an immutable [`RuleSet`] behind an atomic pointer.
//! Evaluations take a snapshot (an `Arc`) and keep using it for the whole
//! call; [`RuleStore::replace`] compiles the incoming rules off to the side
//! and swaps the pointer only when every rule compiled. Readers never lock
//! and never observe a partially updated set.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use promptwall_core::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::compiler::{compile, CompiledRule};
use crate::rule::{PolicyDocument, PolicyRule};

/// Immutable, point-in-time view of the configured rules
#[derive(Debug, Default)]
pub struct RuleSet {
    version: u64,
    rules: Vec<CompiledRule>,
}

impl RuleSet {
    /// Monotonic version, bumped on every successful replace
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of configured rules, disabled included
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Number of rules that take part in evaluation
    pub fn enabled_len(&self) -> usize {
        self.active().count()
    }

    /// All configured rules in stored order, disabled included
    pub fn rules(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.iter().map(|c| &c.rule)
    }

    /// Copy of the configured rules, as served to the admin console
    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument::new(self.rules().cloned().collect())
    }

    /// Enabled rules in stored order
    pub(crate) fn active(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter().filter(|c| c.rule.enabled)
    }
}

/// Holder of the active rule set
pub struct RuleStore {
    current: ArcSwap<RuleSet>,

    /// Serializes writers so versions are assigned in commit order
    write_lock: Mutex<()>,
}

impl RuleStore {
    /// Create a store with an empty rule set (version 0)
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::default()),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store and install an initial rule set
    pub fn with_rules(rules: Vec<PolicyRule>) -> Result<Self> {
        let store = Self::new();
        store.replace(rules)?;
        Ok(store)
    }

    /// Current snapshot; stays valid for as long as the caller holds it
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Full configured rule list, disabled included, in stored order
    pub fn rules(&self) -> Vec<PolicyRule> {
        self.current.load().rules().cloned().collect()
    }

    /// Replace the whole rule set.
    ///
    /// Every rule is validated and compiled before anything is committed.
    /// On error the previously active set stays in effect.
    pub fn replace(&self, rules: Vec<PolicyRule>) -> Result<Arc<RuleSet>> {
        let _guard = self.write_lock.lock();

        let compiled = match compile_all(rules) {
            Ok(compiled) => compiled,
            Err(e) => {
                warn!(
                    rule = e.rule_name().unwrap_or_default(),
                    error = %e,
                    version = self.current.load().version,
                    "Rejected rule set update, keeping active rules"
                );
                return Err(e);
            }
        };

        let next = Arc::new(RuleSet {
            version: self.current.load().version + 1,
            rules: compiled,
        });
        self.current.store(Arc::clone(&next));

        info!(
            version = next.version,
            rules = next.len(),
            enabled = next.enabled_len(),
            "Rule set replaced"
        );

        Ok(next)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_all(rules: Vec<PolicyRule>) -> Result<Vec<CompiledRule>> {
    let mut seen = HashSet::with_capacity(rules.len());
    let mut compiled = Vec::with_capacity(rules.len());

    for (index, rule) in rules.into_iter().enumerate() {
        if rule.name.trim().is_empty() {
            return Err(Error::validation(
                format!("rules[{}]", index),
                "rule name cannot be empty",
            ));
        }
        if !seen.insert(rule.name.clone()) {
            return Err(Error::validation(&rule.name, "duplicate rule name"));
        }
        let rule = compile(rule)?;
        debug!(rule = %rule.rule.name, pattern = rule.matcher.pattern(), "Compiled rule");
        compiled.push(rule);
    }

    Ok(compiled)
}
