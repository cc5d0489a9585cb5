//! Rule set shared by every decider.
//!
//! A [`RuleSet`] is an immutable value: configuration changes build a new one
//! and swap it into the [`RuleStore`] in a single step, so a decision always
//! evaluates against one consistent snapshot.
//!
//! Patterns are compiled once, case-insensitively, when the rule set is
//! built. A pattern that fails to compile is dropped with a warning; the
//! remaining patterns keep working.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::PatternError;

// ─────────────────────────────────────────────────────────────────────────────
// UrlPattern
// ─────────────────────────────────────────────────────────────────────────────

/// A compiled, case-insensitive regular expression matched against URLs.
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    pub fn new(source: &str) -> Result<Self, PatternError> {
        let regex = RegexBuilder::new(source)
            .case_insensitive(true)
            .build()
            .map_err(|e| PatternError {
                pattern: source.to_string(),
                source: e,
            })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// The pattern text as configured.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Returns the first pattern in `patterns` matching `url`.
pub(crate) fn first_match<'a>(patterns: &'a [UrlPattern], url: &str) -> Option<&'a UrlPattern> {
    patterns.iter().find(|p| p.is_match(url))
}

// ─────────────────────────────────────────────────────────────────────────────
// Domains
// ─────────────────────────────────────────────────────────────────────────────

/// Normalizes a configured domain entry.
///
/// `" *.Exam.EDU. "` → `"exam.edu"`. Returns `None` for entries that are
/// empty once trimmed.
pub fn normalize_domain(entry: &str) -> Option<String> {
    let trimmed = entry.trim();
    let trimmed = trimmed.strip_prefix("*.").unwrap_or(trimmed);
    let trimmed = trimmed.trim_start_matches('.').trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}

/// `true` if `host` equals `domain` or is one of its subdomains.
///
/// Both sides are expected in normalized (lower-case, no trailing dot) form.
pub fn host_matches(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleSet
// ─────────────────────────────────────────────────────────────────────────────

/// Allow/block lists, exit patterns and keyboard policy flags.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub allowed_domains: BTreeSet<String>,
    pub blocked_domains: BTreeSet<String>,
    pub allowed_url_patterns: Vec<UrlPattern>,
    pub blocked_url_patterns: Vec<UrlPattern>,
    pub exit_patterns: Vec<UrlPattern>,
    pub exit_detection_enabled: bool,
    pub strict_mode: bool,
    pub keyboard_filter_enabled: bool,
    pub developer_mode_enabled: bool,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            allowed_domains: BTreeSet::new(),
            blocked_domains: BTreeSet::new(),
            allowed_url_patterns: Vec::new(),
            blocked_url_patterns: Vec::new(),
            exit_patterns: Vec::new(),
            exit_detection_enabled: true,
            strict_mode: false,
            keyboard_filter_enabled: true,
            developer_mode_enabled: false,
        }
    }
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    pub fn is_domain_allowed(&self, host: &str) -> bool {
        self.allowed_domains.iter().any(|d| host_matches(host, d))
    }

    pub fn is_domain_blocked(&self, host: &str) -> bool {
        self.blocked_domains.iter().any(|d| host_matches(host, d))
    }
}

/// Collects raw configuration values and compiles them into a [`RuleSet`].
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: RuleSet,
    allowed_url_patterns: Vec<String>,
    blocked_url_patterns: Vec<String>,
    exit_patterns: Vec<String>,
}

impl RuleSetBuilder {
    pub fn allow_domain(mut self, domain: &str) -> Self {
        insert_domain(&mut self.rules.allowed_domains, domain, "allowed_domains");
        self
    }

    pub fn block_domain(mut self, domain: &str) -> Self {
        insert_domain(&mut self.rules.blocked_domains, domain, "blocked_domains");
        self
    }

    pub fn allow_url_pattern(mut self, pattern: &str) -> Self {
        self.allowed_url_patterns.push(pattern.to_string());
        self
    }

    pub fn block_url_pattern(mut self, pattern: &str) -> Self {
        self.blocked_url_patterns.push(pattern.to_string());
        self
    }

    pub fn exit_pattern(mut self, pattern: &str) -> Self {
        self.exit_patterns.push(pattern.to_string());
        self
    }

    pub fn exit_detection(mut self, enabled: bool) -> Self {
        self.rules.exit_detection_enabled = enabled;
        self
    }

    pub fn strict_mode(mut self, enabled: bool) -> Self {
        self.rules.strict_mode = enabled;
        self
    }

    pub fn keyboard_filter(mut self, enabled: bool) -> Self {
        self.rules.keyboard_filter_enabled = enabled;
        self
    }

    pub fn developer_mode(mut self, enabled: bool) -> Self {
        self.rules.developer_mode_enabled = enabled;
        self
    }

    /// Builds the rule set, logging and skipping malformed patterns.
    pub fn build(self) -> RuleSet {
        self.build_with_report().0
    }

    /// Builds the rule set and also returns every pattern that was rejected.
    pub fn build_with_report(self) -> (RuleSet, Vec<PatternError>) {
        let mut rules = self.rules;
        let mut rejected = Vec::new();
        rules.allowed_url_patterns =
            compile_all(&self.allowed_url_patterns, "allowed_url_patterns", &mut rejected);
        rules.blocked_url_patterns =
            compile_all(&self.blocked_url_patterns, "blocked_url_patterns", &mut rejected);
        rules.exit_patterns = compile_all(&self.exit_patterns, "exit_patterns", &mut rejected);
        (rules, rejected)
    }
}

fn insert_domain(set: &mut BTreeSet<String>, entry: &str, list: &'static str) {
    match normalize_domain(entry) {
        Some(domain) => {
            set.insert(domain);
        }
        None => warn!(list, entry, "Empty domain entry ignored"),
    }
}

fn compile_all(
    sources: &[String],
    list: &'static str,
    rejected: &mut Vec<PatternError>,
) -> Vec<UrlPattern> {
    sources
        .iter()
        .filter_map(|source| match UrlPattern::new(source) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(list, error = %e, "Malformed pattern skipped");
                rejected.push(e);
                None
            }
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// RuleStore : fournisseur du RuleSet courant
// ─────────────────────────────────────────────────────────────────────────────

/// Shared handle to the current [`RuleSet`].
///
/// Everything runs on the UI thread, so `Rc` is enough. Cloning the store
/// shares the same slot: the configuration collaborator keeps one clone to
/// publish reloads, the coordinator keeps another to read snapshots.
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    current: Rc<RefCell<Rc<RuleSet>>>,
}

impl RuleStore {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: Rc::new(RefCell::new(Rc::new(rules))),
        }
    }

    /// The rule set in force right now. Holding the returned `Rc` keeps
    /// that exact version alive even if a replacement is published meanwhile.
    pub fn snapshot(&self) -> Rc<RuleSet> {
        Rc::clone(&self.current.borrow())
    }

    /// Publishes a whole new rule set.
    pub fn replace(&self, rules: RuleSet) {
        *self.current.borrow_mut() = Rc::new(rules);
    }

    /// Copies the current rule set, applies `change` to the copy, then
    /// publishes it.
    pub fn update(&self, change: impl FnOnce(&mut RuleSet)) {
        let mut next = RuleSet::clone(&self.snapshot());
        change(&mut next);
        self.replace(next);
    }
}
