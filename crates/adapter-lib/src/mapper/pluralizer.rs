//! Singularization of plural resource names
//!
//! Regular English plurals are handled by suffix rules. Anything irregular
//! must be listed in the irregular table; the rules are never stretched to
//! guess at irregular nouns.

use super::Pluralizer;
use std::collections::HashMap;

/// Irregular Kubernetes resource names known to the adapter
const BUILTIN_IRREGULARS: &[(&str, &str)] = &[
    ("endpoints", "endpoints"),
    ("componentstatuses", "componentstatus"),
];

/// Suffix-rule singularizer backed by an explicit irregular table
#[derive(Debug, Clone)]
pub struct SuffixPluralizer {
    irregular: HashMap<String, String>,
}

impl Default for SuffixPluralizer {
    fn default() -> Self {
        Self::with_irregulars(BUILTIN_IRREGULARS.iter().copied())
    }
}

impl SuffixPluralizer {
    /// Create a singularizer with no irregular entries at all
    pub fn regular_only() -> Self {
        Self {
            irregular: HashMap::new(),
        }
    }

    pub fn with_irregulars<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut pluralizer = Self::regular_only();
        for (plural, singular) in entries {
            pluralizer.add_irregular(plural, singular);
        }
        pluralizer
    }

    pub fn add_irregular(&mut self, plural: &str, singular: &str) {
        self.irregular
            .insert(plural.to_ascii_lowercase(), singular.to_ascii_lowercase());
    }
}

impl Pluralizer for SuffixPluralizer {
    fn singularize(&self, plural: &str) -> String {
        let plural = plural.to_ascii_lowercase();
        if let Some(singular) = self.irregular.get(&plural) {
            return singular.clone();
        }

        if let Some(stem) = plural.strip_suffix("ies") {
            if !stem.is_empty() {
                return format!("{}y", stem);
            }
        }
        for suffix in ["sses", "xes", "zes", "ches", "shes"] {
            if plural.ends_with(suffix) {
                return plural[..plural.len() - 2].to_string();
            }
        }
        match plural.strip_suffix('s') {
            Some(stem) if !stem.is_empty() && !stem.ends_with('s') => stem.to_string(),
            _ => plural,
        }
    }
}
