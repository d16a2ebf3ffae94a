//! Regimen-to-drug resolution.
//!
//! A regimen name is reduced to a lookup key, matched exactly against the
//! regimen table, and otherwise matched fuzzily using the best of three
//! similarity scores. Fuzzy ties resolve to the regimen that appears first
//! in the reference file.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::similarity;

/// Default minimum fuzzy score for a regimen match.
pub const DEFAULT_REGIMEN_THRESHOLD: u8 = 70;

/// Descriptor words stripped from regimen names before lookup.
const DESCRIPTOR_WORDS: [&str; 3] = ["regimen", "therapy", "protocol"];

/// Lowercase, trim, and strip "regimen", "therapy" and "protocol".
pub fn normalize_regimen_key(name: &str) -> String {
    let mut key = name.trim().to_lowercase();
    for word in DESCRIPTOR_WORDS {
        key = key.replace(word, "").trim().to_string();
    }
    key
}

/// Regimen key → constituent drugs, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct RegimenTable {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl RegimenTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a regimen. The key and drug names are lowercased and
    /// trimmed; blank drug names are dropped. A replaced regimen keeps its
    /// original position.
    pub fn insert<S: AsRef<str>>(&mut self, regimen: &str, drugs: &[S]) {
        let key = regimen.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        let drugs: Vec<String> = drugs
            .iter()
            .map(|d| d.as_ref().trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = drugs,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, drugs));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.index.get(key).map(|&i| self.entries[i].1.as_slice())
    }

    /// `(key, drugs)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, d)| (k.as_str(), d.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves regimen names to their constituent drugs.
#[derive(Debug, Clone)]
pub struct RegimenMapper {
    table: RegimenTable,
    threshold: u8,
}

impl RegimenMapper {
    pub fn new(table: RegimenTable) -> Self {
        Self {
            table,
            threshold: DEFAULT_REGIMEN_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn table(&self) -> &RegimenTable {
        &self.table
    }

    /// Find the table key a regimen name resolves to.
    pub fn match_key(&self, name: &str) -> Option<&str> {
        if name.trim().is_empty() {
            return None;
        }
        let key = normalize_regimen_key(name);

        if let Some(&i) = self.table.index.get(&key) {
            tracing::debug!(regimen = name, "Exact regimen match");
            return Some(self.table.entries[i].0.as_str());
        }

        let mut best_score = 0u8;
        let mut best_match: Option<&str> = None;
        for (known, _) in self.table.iter() {
            let score = similarity::ratio(&key, known)
                .max(similarity::partial_ratio(&key, known))
                .max(similarity::token_sort_ratio(&key, known));
            if score > best_score && score >= self.threshold {
                best_score = score;
                best_match = Some(known);
            }
        }

        match best_match {
            Some(known) => {
                tracing::debug!(regimen = name, matched = known, score = best_score, "Fuzzy-matched regimen");
            }
            None => {
                tracing::debug!(regimen = name, "No regimen match");
            }
        }
        best_match
    }

    /// Constituent drugs of a regimen, or `None` when nothing matches.
    pub fn resolve(&self, name: &str) -> Option<&[String]> {
        self.match_key(name).and_then(|key| self.table.get(key))
    }

    /// Union of explicit drugs and every drug contributed by a resolvable
    /// regimen, lowercased and trimmed. Unresolved regimens contribute nothing.
    pub fn get_combined_drugs<D: AsRef<str>, R: AsRef<str>>(
        &self,
        drugs: &[D],
        regimens: &[R],
    ) -> BTreeSet<String> {
        let mut regimen_drugs: Vec<&str> = Vec::new();
        for regimen in regimens {
            if let Some(resolved) = self.resolve(regimen.as_ref()) {
                regimen_drugs.extend(resolved.iter().map(String::as_str));
            }
        }

        drugs
            .iter()
            .map(|d| d.as_ref())
            .chain(regimen_drugs)
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Each non-blank regimen, as extracted, with the drugs it resolves to.
    pub fn map_regimens<R: AsRef<str>>(&self, regimens: &[R]) -> BTreeMap<String, Vec<String>> {
        regimens
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| !r.trim().is_empty())
            .map(|r| {
                let drugs = self.resolve(r).map(<[String]>::to_vec).unwrap_or_default();
                (r.to_string(), drugs)
            })
            .collect()
    }
}
