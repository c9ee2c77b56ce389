use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A single allele call at a diploid marker
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Allele {
    A,
    C,
    G,
    T,
    /// Deletion
    D,
    /// Insertion
    I,
}

impl Allele {
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'A' => Some(Allele::A),
            'C' => Some(Allele::C),
            'G' => Some(Allele::G),
            'T' => Some(Allele::T),
            'D' => Some(Allele::D),
            'I' => Some(Allele::I),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Allele::A => 'A',
            Allele::C => 'C',
            Allele::G => 'G',
            Allele::T => 'T',
            Allele::D => 'D',
            Allele::I => 'I',
        }
    }

    /// Base on the opposite strand. Indel calls have no complement.
    pub fn complement(self) -> Self {
        match self {
            Allele::A => Allele::T,
            Allele::T => Allele::A,
            Allele::C => Allele::G,
            Allele::G => Allele::C,
            other => other,
        }
    }
}

impl fmt::Display for Allele {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenotypeParseError {
    #[error("genotype '{0}' must be two allele calls, optionally split by one '/' or '|'")]
    Malformed(String),
    #[error("genotype '{genotype}' contains unknown allele '{symbol}'")]
    UnknownAllele { genotype: String, symbol: char },
    #[error("genotype '{0}' mixes a call with a no-call")]
    HalfCall(String),
}

/// Genotype observed at one marker
///
/// `Missing` is the explicit no-call value: the array reported `--`, or the
/// marker is absent from the genome altogether.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Genotype {
    #[default]
    Missing,
    Called {
        first: Allele,
        second: Allele,
        phased: bool,
    },
}

impl Genotype {
    pub fn unphased(first: Allele, second: Allele) -> Self {
        Genotype::Called {
            first,
            second,
            phased: false,
        }
    }

    pub fn phased(first: Allele, second: Allele) -> Self {
        Genotype::Called {
            first,
            second,
            phased: true,
        }
    }

    /// Parse `"CT"`, `"C/T"` (unphased), `"C|T"` (phased) or a no-call
    /// (`"--"`, `"00"`, empty).
    pub fn from_string(s: &str) -> Result<Self, GenotypeParseError> {
        let trimmed = s.trim();
        let chars: Vec<char> = trimmed.chars().collect();
        let (symbols, phased) = match chars.as_slice() {
            [] => return Ok(Genotype::Missing),
            [a, b] => ([*a, *b], false),
            [a, '/', b] => ([*a, *b], false),
            [a, '|', b] => ([*a, *b], true),
            _ => return Err(GenotypeParseError::Malformed(s.to_string())),
        };

        let is_no_call = |c: char| c == '-' || c == '0' || c == '.';
        match (is_no_call(symbols[0]), is_no_call(symbols[1])) {
            (true, true) => return Ok(Genotype::Missing),
            (true, false) | (false, true) => {
                return Err(GenotypeParseError::HalfCall(s.to_string()))
            }
            (false, false) => {}
        }

        let allele = |symbol: char| {
            Allele::from_char(symbol).ok_or_else(|| GenotypeParseError::UnknownAllele {
                genotype: s.to_string(),
                symbol,
            })
        };

        Ok(Genotype::Called {
            first: allele(symbols[0])?,
            second: allele(symbols[1])?,
            phased,
        })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Genotype::Missing)
    }

    pub fn is_phased(&self) -> bool {
        matches!(self, Genotype::Called { phased: true, .. })
    }

    pub fn alleles(&self) -> Option<(Allele, Allele)> {
        match *self {
            Genotype::Called { first, second, .. } => Some((first, second)),
            Genotype::Missing => None,
        }
    }

    /// Number of copies of `allele` present (0, 1 or 2). A no-call has none.
    pub fn count(&self, allele: Allele) -> usize {
        match *self {
            Genotype::Called { first, second, .. } => {
                usize::from(first == allele) + usize::from(second == allele)
            }
            Genotype::Missing => 0,
        }
    }

    pub fn carries(&self, allele: Allele) -> bool {
        self.count(allele) > 0
    }

    /// Same genotype read off the complementary strand.
    pub fn negative(&self) -> Self {
        match *self {
            Genotype::Called {
                first,
                second,
                phased,
            } => Genotype::Called {
                first: first.complement(),
                second: second.complement(),
                phased,
            },
            Genotype::Missing => Genotype::Missing,
        }
    }

    /// The same call with its alleles swapped.
    pub fn reversed(&self) -> Self {
        match *self {
            Genotype::Called {
                first,
                second,
                phased,
            } => Genotype::Called {
                first: second,
                second: first,
                phased,
            },
            Genotype::Missing => Genotype::Missing,
        }
    }

    /// Two-character text with the alleles in ascending order.
    pub fn sorted_text(&self) -> String {
        match *self {
            Genotype::Called { first, second, .. } => {
                let (lo, hi) = if first.as_char() <= second.as_char() {
                    (first, second)
                } else {
                    (second, first)
                };
                format!("{}{}", lo, hi)
            }
            Genotype::Missing => "--".to_string(),
        }
    }

    /// Order-independent comparison against a two-character pattern such as
    /// `"AG"`. A no-call never matches.
    pub fn matches(&self, pattern: &str) -> bool {
        match Genotype::from_string(pattern) {
            Ok(Genotype::Called { first, second, .. }) => {
                self.alleles() == Some((first, second)) || self.alleles() == Some((second, first))
            }
            _ => false,
        }
    }

    /// Order-sensitive comparison for phased calls. Unphased calls carry no
    /// allele order, so they compare like [`Genotype::matches`].
    pub fn matches_ordered(&self, pattern: &str) -> bool {
        if !self.is_phased() {
            return self.matches(pattern);
        }
        match Genotype::from_string(pattern) {
            Ok(Genotype::Called { first, second, .. }) => {
                self.alleles() == Some((first, second))
            }
            _ => false,
        }
    }
}

impl FromStr for Genotype {
    type Err = GenotypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Genotype::from_string(s)
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Genotype::Called { first, second, .. } => write!(f, "{}{}", first, second),
            Genotype::Missing => write!(f, "--"),
        }
    }
}

/// Population the subject reports belonging to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Ethnicity {
    #[default]
    Unknown,
    European,
    Asian,
    African,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

/// Individual attributes that gate which rules may be applied
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub ethnicity: Ethnicity,
    pub sex: Sex,
    pub year_of_birth: Option<i32>,
}

impl Subject {
    pub fn new(ethnicity: Ethnicity, sex: Sex, year_of_birth: Option<i32>) -> Self {
        Self {
            ethnicity,
            sex,
            year_of_birth,
        }
    }

    pub fn is_female(&self) -> bool {
        self.sex == Sex::Female
    }

    /// European-derived effect sizes may be used: ethnicity is European or
    /// was never stated.
    pub fn is_european_or_unknown(&self) -> bool {
        matches!(self.ethnicity, Ethnicity::European | Ethnicity::Unknown)
    }
}
