//! Transport rule matcher
//!
//! Rules are compiled once, when the matcher is built, and scanned in
//! declaration order. The first rule whose declared triggers all match wins;
//! otherwise the first rule without triggers is the fallback.

use crate::config::{TransportRule, TuningProfile};
use crate::error::{Result, TransportConfigError};
use regex::Regex;

/// A transport rule with its trigger patterns compiled
#[derive(Clone, Debug)]
pub struct CompiledRule {
    rule: TransportRule,
    method: Option<Regex>,
    path: Option<Regex>,
    query_param: Option<Regex>,
}

impl CompiledRule {
    /// Compile every declared trigger of `rule`
    pub fn compile(rule: TransportRule) -> Result<Self> {
        let method = compile_trigger(&rule.name, "method", &rule.triggers.method)?;
        let path = compile_trigger(&rule.name, "path", &rule.triggers.path)?;
        let query_param = compile_trigger(&rule.name, "query_param", &rule.triggers.query_param)?;
        Ok(Self {
            rule,
            method,
            path,
            query_param,
        })
    }

    /// Rule name
    pub fn name(&self) -> &str {
        &self.rule.name
    }

    /// Tuning selected by this rule
    pub fn tuning(&self) -> &TuningProfile {
        &self.rule.tuning
    }

    /// The rule as configured
    pub fn rule(&self) -> &TransportRule {
        &self.rule
    }

    /// No trigger declared
    pub fn is_default(&self) -> bool {
        self.method.is_none() && self.path.is_none() && self.query_param.is_none()
    }

    /// Every declared trigger matches its input
    pub fn matches(&self, method: &str, path: &str, query_param: &str) -> bool {
        trigger_matches(&self.method, method)
            && trigger_matches(&self.path, path)
            && trigger_matches(&self.query_param, query_param)
    }
}

fn compile_trigger(rule: &str, field: &'static str, pattern: &str) -> Result<Option<Regex>> {
    if pattern.is_empty() {
        return Ok(None);
    }
    Regex::new(pattern)
        .map(Some)
        .map_err(|source| TransportConfigError::MalformedTriggerPattern {
            rule: rule.to_string(),
            field,
            source,
        })
}

fn trigger_matches(trigger: &Option<Regex>, input: &str) -> bool {
    trigger.as_ref().map_or(true, |re| re.is_match(input))
}

/// Ordered, precompiled set of transport rules
#[derive(Clone, Debug, Default)]
pub struct TransportMatcher {
    rules: Vec<CompiledRule>,
}

impl TransportMatcher {
    /// Compile `rules`; a malformed pattern fails the whole set
    pub fn new(rules: impl IntoIterator<Item = TransportRule>) -> Result<Self> {
        let rules = rules
            .into_iter()
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Compiled rules in declaration order
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Index of the rule selected for a request
    pub fn position(&self, method: &str, path: &str, query_param: &str) -> Option<usize> {
        let mut default = None;
        for (index, rule) in self.rules.iter().enumerate() {
            if rule.matches(method, path, query_param) {
                if !rule.is_default() {
                    return Some(index);
                }
                default.get_or_insert(index);
            }
        }
        default
    }

    /// Rule selected for a request
    pub fn find(&self, method: &str, path: &str, query_param: &str) -> Option<&CompiledRule> {
        self.position(method, path, query_param)
            .map(|index| &self.rules[index])
    }
}
