//! Key-matching strategies.
//!
//! Each strategy is a [`Matcher`]; the normalizer runs them in a fixed order
//! and the first one that returns a field wins.

use std::sync::Arc;

use nameplate_core::CanonicalField;

use crate::learned::LearnedMappingStore;
use crate::mapping::MappingTable;

/// One raw key/value pair, prepared for matching.
#[derive(Debug, Clone, Copy)]
pub struct MatchInput<'a> {
    pub raw_key: &'a str,
    /// Output of [`crate::text::clean_text`] on `raw_key`.
    pub cleaned_key: &'a str,
    /// String form of the value; `None` when the value is empty.
    pub value_text: Option<&'a str>,
}

/// A strategy for resolving a raw key to a canonical field.
pub trait Matcher: Send + Sync {
    /// Short name used in logs and resolution reports.
    fn name(&self) -> &'static str;

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField>;
}

/// Equality with a canonical name or a configured alias, after cleaning.
pub struct ExactAliasMatcher {
    table: Arc<MappingTable>,
}

impl ExactAliasMatcher {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }
}

impl Matcher for ExactAliasMatcher {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField> {
        if let Some(field) = CanonicalField::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == input.cleaned_key)
        {
            return Some(field);
        }
        self.table
            .entries()
            .iter()
            .find(|entry| entry.aliases.iter().any(|a| a.cleaned == input.cleaned_key))
            .map(|entry| entry.field)
    }
}

/// Configured patterns, searched in the cleaned key.
pub struct RegexMatcher {
    table: Arc<MappingTable>,
}

impl RegexMatcher {
    pub fn new(table: Arc<MappingTable>) -> Self {
        Self { table }
    }
}

impl Matcher for RegexMatcher {
    fn name(&self) -> &'static str {
        "regex"
    }

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField> {
        self.table
            .entries()
            .iter()
            .find(|entry| entry.patterns.iter().any(|re| re.is_match(input.cleaned_key)))
            .map(|entry| entry.field)
    }
}

/// Best normalized Levenshtein similarity across all aliases, accepted at or
/// above the threshold. Ties keep the alias seen first.
pub struct FuzzyMatcher {
    table: Arc<MappingTable>,
    threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(table: Arc<MappingTable>, threshold: f64) -> Self {
        Self { table, threshold }
    }

    /// Best-scoring field and its score, regardless of threshold.
    pub fn best(&self, cleaned_key: &str) -> Option<(CanonicalField, f64)> {
        let mut best: Option<(CanonicalField, f64)> = None;
        for entry in self.table.entries() {
            for alias in &entry.aliases {
                let score = strsim::normalized_levenshtein(cleaned_key, &alias.cleaned);
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((entry.field, score));
                }
            }
        }
        best
    }
}

impl Matcher for FuzzyMatcher {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField> {
        if input.cleaned_key.is_empty() {
            return None;
        }
        self.best(input.cleaned_key)
            .filter(|(_, score)| *score >= self.threshold)
            .map(|(field, _)| field)
    }
}

/// Keys taught at runtime, compared after cleaning.
pub struct LearnedMatcher {
    store: Arc<LearnedMappingStore>,
}

impl LearnedMatcher {
    pub fn new(store: Arc<LearnedMappingStore>) -> Self {
        Self { store }
    }
}

impl Matcher for LearnedMatcher {
    fn name(&self) -> &'static str {
        "learned"
    }

    fn try_match(&self, input: &MatchInput<'_>) -> Option<CanonicalField> {
        self.store.lookup(input.cleaned_key)
    }
}
