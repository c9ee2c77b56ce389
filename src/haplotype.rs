//! Two-marker haplotype inference.
//!
//! When both markers are phased the haplotypes are read off position by
//! position. Otherwise only the unordered signature of the two genotypes is
//! known, and one signature is consistent with two different haplotype pairs.

use lazy_static::lazy_static;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::types::Genotype;

/// Result of resolving a pair of linked markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaplotypeCall {
    /// Haplotype names in lexicographic order.
    Resolved { pair: [String; 2] },
    /// Unphased signature shared by several true haplotype pairs.
    Ambiguous { alternatives: Vec<[String; 2]> },
    /// Signature or phased combination absent from the tables.
    Unknown { key: String },
}

impl HaplotypeCall {
    fn resolved(a: &str, b: &str) -> Self {
        HaplotypeCall::Resolved {
            pair: sorted_pair(a, b),
        }
    }
}

fn sorted_pair(a: &str, b: &str) -> [String; 2] {
    if a <= b {
        [a.to_string(), b.to_string()]
    } else {
        [b.to_string(), a.to_string()]
    }
}

impl fmt::Display for HaplotypeCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaplotypeCall::Resolved { pair } => write!(f, "{}/{}", pair[0], pair[1]),
            HaplotypeCall::Ambiguous { alternatives } => {
                let joined: Vec<String> = alternatives
                    .iter()
                    .map(|pair| format!("{}/{}", pair[0], pair[1]))
                    .collect();
                write!(f, "{}", joined.join(" or "))
            }
            HaplotypeCall::Unknown { key } => write!(f, "<Unknown variant: {}>", key),
        }
    }
}

/// Haplotype definitions for a pair of linked markers
pub struct HaplotypeResolver {
    /// (allele at first marker, allele at second marker) → haplotype name
    phased: HashMap<String, &'static str>,
    /// sorted first genotype + sorted second genotype → haplotype pairs
    unphased: HashMap<String, Vec<[String; 2]>>,
}

impl HaplotypeResolver {
    /// Build a resolver from the per-haplotype allele combinations. The
    /// unphased table is derived by enumerating every unordered pair of
    /// haplotypes, so both resolution paths agree by construction.
    pub fn new(haplotypes: &[(&str, &'static str)]) -> Self {
        let phased: HashMap<String, &'static str> = haplotypes
            .iter()
            .map(|(alleles, name)| (alleles.to_ascii_uppercase(), *name))
            .collect();

        let mut unphased: HashMap<String, Vec<[String; 2]>> = HashMap::new();
        for (i, (left, left_name)) in haplotypes.iter().enumerate() {
            for (right, right_name) in &haplotypes[i..] {
                let key = signature(left, right);
                let pair = sorted_pair(left_name, right_name);
                let alternatives = unphased.entry(key).or_default();
                if !alternatives.contains(&pair) {
                    alternatives.push(pair);
                }
            }
        }
        for alternatives in unphased.values_mut() {
            alternatives.sort();
        }

        Self { phased, unphased }
    }

    pub fn resolve(&self, first: &Genotype, second: &Genotype) -> HaplotypeCall {
        if let (
            Genotype::Called {
                first: a0,
                second: a1,
                phased: true,
            },
            Genotype::Called {
                first: b0,
                second: b1,
                phased: true,
            },
        ) = (*first, *second)
        {
            let left = format!("{}{}", a0, b0);
            let right = format!("{}{}", a1, b1);
            return match (self.phased.get(&left), self.phased.get(&right)) {
                (Some(l), Some(r)) => HaplotypeCall::resolved(l, r),
                _ => HaplotypeCall::Unknown {
                    key: format!("{}|{}", left, right),
                },
            };
        }

        let key = format!("{}{}", first.sorted_text(), second.sorted_text());
        match self.unphased.get(&key).map(Vec::as_slice) {
            Some([pair]) => HaplotypeCall::Resolved { pair: pair.clone() },
            Some(alternatives) if !alternatives.is_empty() => HaplotypeCall::Ambiguous {
                alternatives: alternatives.to_vec(),
            },
            _ => HaplotypeCall::Unknown { key },
        }
    }

    /// Every unphased signature the resolver recognizes.
    pub fn signatures(&self) -> impl Iterator<Item = &str> {
        self.unphased.keys().map(String::as_str)
    }

    pub fn is_ambiguous(&self, signature: &str) -> bool {
        self.unphased
            .get(signature)
            .map_or(false, |alternatives| alternatives.len() > 1)
    }
}

/// Unordered signature of two haplotypes given as per-marker allele strings.
fn signature(left: &str, right: &str) -> String {
    let mut first: Vec<char> = left.chars().take(1).chain(right.chars().take(1)).collect();
    let mut second: Vec<char> = left.chars().skip(1).chain(right.chars().skip(1)).collect();
    first.sort_unstable();
    second.sort_unstable();
    first.into_iter().chain(second).collect::<String>().to_ascii_uppercase()
}

pub const APOE_RS429358: &str = "rs429358";
pub const APOE_RS7412: &str = "rs7412";

lazy_static! {
    /// APOE from rs429358 and rs7412. Unphased `CTCT` is either e1/e3 or e2/e4.
    pub static ref APOE: HaplotypeResolver = HaplotypeResolver::new(&[
        ("CT", "e1"),
        ("TT", "e2"),
        ("TC", "e3"),
        ("CC", "e4"),
    ]);
}
