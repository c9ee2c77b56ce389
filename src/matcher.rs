//! Genotype lookup tables and the matcher that resolves observed calls
//! against them.
//!
//! Tables are keyed by two-character genotype strings whose allele order is
//! irrelevant (`"AG"` and `"GA"` address the same entry), plus an explicit
//! [`TableKey::Missing`] entry for no-calls.

use std::collections::HashMap;
use std::fmt;
use tracing::trace;

use crate::types::Genotype;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableKey {
    Genotype(String),
    Missing,
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKey::Genotype(g) => write!(f, "{}", g),
            TableKey::Missing => write!(f, "<missing>"),
        }
    }
}

/// Genotype → value table for a single marker
#[derive(Debug, Clone)]
pub struct GenotypeTable<V> {
    entries: HashMap<TableKey, V>,
}

impl<V> Default for GenotypeTable<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> GenotypeTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, genotype: &str, value: V) -> Self {
        self.entries
            .insert(TableKey::Genotype(genotype.to_ascii_uppercase()), value);
        self
    }

    /// Value returned for a no-call at the marker.
    pub fn with_missing(mut self, value: V) -> Self {
        self.entries.insert(TableKey::Missing, value);
        self
    }

    pub fn get(&self, key: &TableKey) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn missing(&self) -> Option<&V> {
        self.entries.get(&TableKey::Missing)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> FromIterator<(TableKey, V)> for GenotypeTable<V> {
    fn from_iter<I: IntoIterator<Item = (TableKey, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Outcome of resolving a genotype against a table
#[derive(Debug, PartialEq)]
pub enum Match<'a, V> {
    Found(&'a V),
    /// The marker was not called and the table has no missing entry.
    NoCall,
    /// The call matches no key. Carries the genotype text as looked up:
    /// alleles sorted for unphased calls, reported order for phased ones.
    Unrecognized(String),
}

impl<'a, V> Match<'a, V> {
    pub fn value(&self) -> Option<&'a V> {
        match self {
            Match::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Match::Found(_))
    }
}

/// Look up `genotype` trying both allele orders.
pub fn unphased_match<'a, V>(genotype: &Genotype, table: &'a GenotypeTable<V>) -> Match<'a, V> {
    match genotype {
        Genotype::Missing => table.missing().map_or(Match::NoCall, Match::Found),
        called => {
            let forward = TableKey::Genotype(called.to_string());
            let reverse = TableKey::Genotype(called.reversed().to_string());
            match table.get(&forward).or_else(|| table.get(&reverse)) {
                Some(v) => Match::Found(v),
                None => {
                    let sorted = called.sorted_text();
                    trace!(genotype = %sorted, "genotype not present in table");
                    Match::Unrecognized(sorted)
                }
            }
        }
    }
}

/// Look up `genotype` in the exact allele order it was reported. Unphased
/// calls have no allele order and fall back to [`unphased_match`].
pub fn phased_match<'a, V>(genotype: &Genotype, table: &'a GenotypeTable<V>) -> Match<'a, V> {
    if !genotype.is_phased() {
        return unphased_match(genotype, table);
    }
    let called = genotype.to_string();
    match table.get(&TableKey::Genotype(called.clone())) {
        Some(v) => Match::Found(v),
        None => {
            trace!(genotype = %called, "phased genotype not present in table");
            Match::Unrecognized(called)
        }
    }
}

/// Render the unphased match of a marker as report text. Misses are spelled
/// out with the offending marker and genotype rather than defaulted.
pub fn describe<V: fmt::Display>(rsid: &str, genotype: &Genotype, table: &GenotypeTable<V>) -> String {
    match unphased_match(genotype, table) {
        Match::Found(v) => v.to_string(),
        Match::NoCall => format!("<No call for {}>", rsid),
        Match::Unrecognized(g) => format!("<Unknown genotype for {} {}>", rsid, g),
    }
}
