//! Drug name normalization onto canonical generic names.
//!
//! Exact synonym lookup first, then a fuzzy scan over every synonym in the
//! table. The scan is linear in table size, which is fine for reference
//! tables of a few thousand synonyms; ties go to the first synonym in table
//! order, so replacing the scan with an index must keep that ordering.

use std::collections::{HashMap, HashSet};

use super::similarity;

/// Default minimum fuzzy score for a drug match.
pub const DEFAULT_DRUG_THRESHOLD: u8 = 85;

/// Lowercase synonym → canonical name, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SynonymTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(canonical, synonyms)` groups.
    ///
    /// Every canonical name is registered as its own synonym after all
    /// other synonyms, so a canonical name always maps to itself even if
    /// another row lists it as a synonym.
    pub fn from_groups<I, C, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = (C, Vec<S>)>,
        C: AsRef<str>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        let mut canonicals = Vec::new();
        for (canonical, synonyms) in groups {
            let canonical = canonical.as_ref().trim().to_string();
            if canonical.is_empty() {
                continue;
            }
            for synonym in &synonyms {
                table.insert(synonym.as_ref(), &canonical);
            }
            canonicals.push(canonical);
        }
        for canonical in &canonicals {
            table.insert(canonical, canonical);
        }
        table
    }

    /// Insert or replace a synonym. Blank synonyms are ignored; a replaced
    /// synonym keeps its original position.
    pub fn insert(&mut self, synonym: &str, canonical: &str) {
        let key = synonym.trim().to_lowercase();
        if key.is_empty() {
            return;
        }
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = canonical.to_string(),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, canonical.to_string()));
            }
        }
    }

    /// Exact lookup of an already lowercased, trimmed synonym.
    pub fn get(&self, synonym: &str) -> Option<&str> {
        self.index
            .get(synonym)
            .map(|&i| self.entries[i].1.as_str())
    }

    /// `(synonym, canonical)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, c)| (s.as_str(), c.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps extracted drug names to canonical generic names.
#[derive(Debug, Clone)]
pub struct DrugNormalizer {
    synonyms: SynonymTable,
    threshold: u8,
}

impl DrugNormalizer {
    pub fn new(synonyms: SynonymTable) -> Self {
        Self {
            synonyms,
            threshold: DEFAULT_DRUG_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    /// Normalize one drug name.
    ///
    /// Blank input is returned unchanged. Names with no match at or above the
    /// threshold come back lowercased and trimmed, never dropped.
    pub fn normalize(&self, name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return name.to_string();
        }
        let lowered = trimmed.to_lowercase();

        if let Some(canonical) = self.synonyms.get(&lowered) {
            return canonical.to_string();
        }

        let mut best_score = 0u8;
        let mut best_match: Option<&str> = None;
        for (synonym, canonical) in self.synonyms.iter() {
            let score = similarity::ratio(&lowered, synonym);
            if score > best_score {
                best_score = score;
                best_match = Some(canonical);
            }
        }

        match best_match {
            Some(canonical) if best_score >= self.threshold => {
                tracing::debug!(
                    drug = lowered.as_str(),
                    canonical,
                    score = best_score,
                    "Fuzzy-matched drug name"
                );
                canonical.to_string()
            }
            _ => {
                tracing::debug!(
                    drug = lowered.as_str(),
                    best_score,
                    "No synonym match for drug name"
                );
                lowered
            }
        }
    }

    /// Normalize a list, dropping duplicates of the normalized output while
    /// keeping first-occurrence order.
    pub fn normalize_list<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        let mut seen = HashSet::new();
        names
            .iter()
            .map(|name| self.normalize(name.as_ref()))
            .filter(|normalized| seen.insert(normalized.clone()))
            .collect()
    }
}
