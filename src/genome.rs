use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Genotype, GenotypeParseError, Subject};

#[derive(Debug, Error)]
pub enum GenomeError {
    #[error("expected rsID=GT, got '{0}'")]
    InvalidAssignment(String),
    #[error("'{0}' is not an rsID (expected e.g. rs429358)")]
    InvalidRsid(String),
    #[error("invalid genotype for {rsid}: {source}")]
    InvalidGenotype {
        rsid: String,
        #[source]
        source: GenotypeParseError,
    },
}

/// Genotypes of one individual keyed by rsID, plus the attributes rules
/// check before applying population-specific effect sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Genome {
    pub subject: Subject,
    snps: HashMap<String, Genotype>,
}

impl Genome {
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            snps: HashMap::new(),
        }
    }

    pub fn with_genotype(mut self, rsid: &str, genotype: Genotype) -> Self {
        self.insert(rsid, genotype);
        self
    }

    pub fn insert(&mut self, rsid: &str, genotype: Genotype) {
        self.snps.insert(rsid.to_ascii_lowercase(), genotype);
    }

    /// Insert a genotype given as text, e.g. `insert_str("rs7412", "C|T")`.
    pub fn insert_str(&mut self, rsid: &str, genotype: &str) -> Result<(), GenomeError> {
        let rsid = normalize_rsid(rsid)?;
        let genotype =
            Genotype::from_string(genotype).map_err(|source| GenomeError::InvalidGenotype {
                rsid: rsid.clone(),
                source,
            })?;
        self.snps.insert(rsid, genotype);
        Ok(())
    }

    /// Genotype at `rsid`. Markers absent from the genome read as a no-call.
    pub fn genotype(&self, rsid: &str) -> Genotype {
        self.snps
            .get(&rsid.to_ascii_lowercase())
            .copied()
            .unwrap_or(Genotype::Missing)
    }

    pub fn has(&self, rsid: &str) -> bool {
        self.snps.contains_key(&rsid.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.snps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snps.is_empty()
    }
}

/// Parse an `rsID=GT` assignment as accepted on the command line.
pub fn parse_assignment(s: &str) -> Result<(String, Genotype), GenomeError> {
    let (rsid, genotype) = s
        .split_once('=')
        .ok_or_else(|| GenomeError::InvalidAssignment(s.to_string()))?;
    let rsid = normalize_rsid(rsid)?;
    let genotype =
        Genotype::from_string(genotype).map_err(|source| GenomeError::InvalidGenotype {
            rsid: rsid.clone(),
            source,
        })?;
    Ok((rsid, genotype))
}

fn normalize_rsid(rsid: &str) -> Result<String, GenomeError> {
    let rsid = rsid.trim().to_ascii_lowercase();
    let digits = rsid
        .strip_prefix("rs")
        .ok_or_else(|| GenomeError::InvalidRsid(rsid.clone()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GenomeError::InvalidRsid(rsid));
    }
    Ok(rsid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Allele;

    #[test]
    fn absent_markers_read_as_missing() {
        let genome = Genome::default();
        assert_eq!(genome.genotype("rs7412"), Genotype::Missing);
        assert!(!genome.has("rs7412"));
    }

    #[test]
    fn lookups_ignore_rsid_case() -> anyhow::Result<()> {
        let mut genome = Genome::default();
        genome.insert_str("RS7412", "ct")?;
        assert_eq!(genome.genotype("rs7412"), Genotype::unphased(Allele::C, Allele::T));
        assert_eq!(genome.len(), 1);
        Ok(())
    }

    #[test]
    fn parses_command_line_assignments() -> anyhow::Result<()> {
        let (rsid, genotype) = parse_assignment("rs429358=C|T")?;
        assert_eq!(rsid, "rs429358");
        assert!(genotype.is_phased());

        assert!(matches!(
            parse_assignment("7412=CT"),
            Err(GenomeError::InvalidRsid(_))
        ));
        assert!(matches!(
            parse_assignment("rs7412"),
            Err(GenomeError::InvalidAssignment(_))
        ));
        assert!(matches!(
            parse_assignment("rs7412=CTA"),
            Err(GenomeError::InvalidGenotype { .. })
        ));
        Ok(())
    }
}
