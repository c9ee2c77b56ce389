//! Health rules: thin per-marker lookups built on the matcher, the APOE
//! resolver and odds-ratio pooling.
//!
//! Use with caution. The associations encoded here come from individual
//! published studies and are not clinically validated.

use crate::genome::Genome;
use crate::haplotype::{APOE, APOE_RS429358, APOE_RS7412};
use crate::matcher::{describe, unphased_match, GenotypeTable};
use crate::odds::{pooled_odds_ratio, Evidence};
use crate::report::{Finding, RiskEstimate, RuleError, RuleResult, RuleSet};
use crate::types::Allele;

/// Fallback variance inflation for pooled kidney disease studies.
const CKD_VARIANCE_INFLATION: f64 = 1.15;
/// Baseline CKD prevalence used for the relative risk.
const CKD_PREVALENCE: f64 = 0.034;

/// All rules of the health report, in report order.
pub fn health_rules() -> RuleSet {
    RuleSet::new()
        .register("apoe_variants", "APOE variants (Alzheimer's)", apoe_variants)
        .register("breast_cancer", "Breast cancer", breast_cancer)
        .register(
            "chronic_kidney_disease",
            "Chronic kidney disease (CKD)",
            chronic_kidney_disease,
        )
        .register("hypothyroidism", "Hypothyroidism", hypothyroidism)
        .register("migraines", "Migraines", migraines)
        .register(
            "restless_leg_syndrome",
            "Restless leg syndrome",
            restless_leg_syndrome,
        )
        .register(
            "rheumatoid_arthritis",
            "Rheumatoid arthritis",
            rheumatoid_arthritis,
        )
        .register(
            "scleroderma",
            "Scleroderma (limited cutaneous type)",
            scleroderma,
        )
        .register("stroke", "Stroke", stroke)
}

fn require_european(genome: &Genome) -> Result<(), RuleError> {
    if genome.subject.is_european_or_unknown() {
        Ok(())
    } else {
        Err(RuleError::NotApplicable(
            "only applicable to Europeans".to_string(),
        ))
    }
}

pub fn apoe_variants(genome: &Genome) -> RuleResult {
    let call = APOE.resolve(
        &genome.genotype(APOE_RS429358),
        &genome.genotype(APOE_RS7412),
    );
    Ok(Finding::Haplotype(call))
}

pub fn breast_cancer(genome: &Genome) -> RuleResult {
    if !genome.subject.is_female() {
        return Err(RuleError::NotApplicable(
            "only applicable for females".to_string(),
        ));
    }

    let rs1219648 = GenotypeTable::new()
        .with("AA", "Typical odds")
        .with("AG", "Slightly higher odds")
        .with("GG", "Moderately higher odds")
        .with_missing("Unable to determine (see rs2420946 instead)");
    let rs3803662 = GenotypeTable::new()
        .with("AA", "Moderately increased odds")
        .with("AG", "?")
        .with("GG", "Typical odds")
        .with_missing("Unable to determine");

    Ok(Finding::Lines(vec![
        describe("rs1219648", &genome.genotype("rs1219648"), &rs1219648),
        describe("rs3803662", &genome.genotype("rs3803662"), &rs3803662),
        "Note: There are MANY more SNPs to test here...".to_string(),
    ]))
}

/// Kidney disease evidence from rs4293393 (Gretarsdottir et al.; reported on
/// the minus strand, stratified by birth cohort) and rs7805747 (Köttgen et
/// al.). Both studies are European.
fn ckd_evidence(genome: &Genome) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    if !genome.subject.is_european_or_unknown() {
        return evidence;
    }

    if genome.genotype("rs4293393").negative().carries(Allele::T) {
        let study = match genome.subject.year_of_birth {
            None => Evidence::new(1.25, 0.95, 4.1e-10),
            Some(year) if year < 1920 => Evidence::new(1.19, 0.95, 0.045),
            Some(year) if year < 1930 => Evidence::new(1.31, 0.95, 4.1e-7),
            Some(year) if year < 1940 => Evidence::new(1.28, 0.95, 3.1e-5),
            Some(year) if year < 1950 => Evidence::new(1.16, 0.95, 0.12),
            Some(_) => Evidence::new(1.09, 0.95, 0.57),
        };
        evidence.push(study.with_inflation(CKD_VARIANCE_INFLATION));
    }

    if genome.genotype("rs7805747").carries(Allele::A) {
        evidence.push(Evidence::new(1.19, 0.95, 4.2e-12));
    }

    evidence
}

pub fn chronic_kidney_disease(genome: &Genome) -> RuleResult {
    let pooled = pooled_odds_ratio(&ckd_evidence(genome), CKD_VARIANCE_INFLATION)?;
    Ok(Finding::Risk(RiskEstimate::new(pooled, CKD_PREVALENCE)?))
}

pub fn hypothyroidism(genome: &Genome) -> RuleResult {
    require_european(genome)?;

    let scores: [(&str, GenotypeTable<f64>); 5] = [
        ("rs7850258", score_table(("GG", 0.5), ("AG", 0.0), ("AA", -0.5))),
        ("rs2476601", score_table(("GG", 1.0), ("AG", 0.5), ("AA", 0.0))),
        ("rs3184504", score_table(("TT", 0.5), ("CT", 0.0), ("CC", -0.5))),
        ("rs4915077", score_table(("CC", 1.0), ("CT", 0.5), ("TT", 0.0))),
        ("rs2517532", score_table(("GG", 0.5), ("AG", 0.0), ("AA", -0.5))),
    ];

    let hi: f64 = scores
        .iter()
        .map(|(_, table)| table.values().copied().fold(f64::MIN, f64::max))
        .sum();
    let lo: f64 = scores
        .iter()
        .map(|(_, table)| table.values().copied().fold(f64::MAX, f64::min))
        .sum();

    let mut score = 0.0;
    for (rsid, table) in &scores {
        let genotype = genome.genotype(rsid);
        match unphased_match(&genotype, table).value() {
            Some(points) => score += points,
            None => {
                return Err(RuleError::Failed(format!(
                    "unknown genotype for {} {}",
                    rsid, genotype
                )))
            }
        }
    }

    let points = format!("({:.1} vs {:.1} of {:.1} points)", score, lo, hi);
    let caveat = "Test is unweighted, see 23andMe for more info".to_string();
    let lines = if score > 0.0 {
        vec![
            format!("About {:.1}% higher risk than baseline", 100.0 * score / hi),
            points,
            caveat,
        ]
    } else if score < 0.0 {
        vec![
            format!("About {:.1}% lower risk than baseline", 100.0 * score / lo),
            points,
            caveat,
        ]
    } else {
        return Ok("Typical risk".into());
    };
    Ok(Finding::Lines(lines))
}

fn score_table(hom: (&str, f64), het: (&str, f64), other: (&str, f64)) -> GenotypeTable<f64> {
    GenotypeTable::new()
        .with(hom.0, hom.1)
        .with(het.0, het.1)
        .with(other.0, other.1)
        .with_missing(0.0)
}

pub fn migraines(genome: &Genome) -> RuleResult {
    require_european(genome)?;

    let rs2651899 = GenotypeTable::new()
        .with("CC", "Slightly higher odds of migraines")
        .with("CT", "Typical odds of migraines")
        .with("TT", "Slightly lower odds of migraines")
        .with_missing("Unable to determine");
    let rs10166942 = GenotypeTable::new()
        .with("TT", "Typical odds of migraines")
        .with("CT", "Slightly lower odds of migraines")
        .with("CC", "Slightly lower odds of migraines")
        .with_missing("Unable to determine");
    let rs11172113 = GenotypeTable::new()
        .with("TT", "Slightly higher odds of migraines")
        .with("CT", "Typical odds of migraines")
        .with("CC", "Slightly lower odds of migraines")
        .with_missing("Unable to determine");

    Ok(Finding::Lines(vec![
        describe("rs2651899", &genome.genotype("rs2651899"), &rs2651899),
        describe("rs10166942", &genome.genotype("rs10166942"), &rs10166942),
        describe("rs11172113", &genome.genotype("rs11172113"), &rs11172113),
    ]))
}

pub fn restless_leg_syndrome(genome: &Genome) -> RuleResult {
    let table = GenotypeTable::new()
        .with("GG", "Normal risk")
        .with("AG", "Slightly increased risk")
        .with("AA", "Twice as high risk for developing");
    Ok(describe("rs3923809", &genome.genotype("rs3923809"), &table).into())
}

/// Risk-allele scoring is not yet replaced by a pooled odds ratio.
pub fn rheumatoid_arthritis(_genome: &Genome) -> RuleResult {
    Err(RuleError::NotImplemented)
}

pub fn scleroderma(genome: &Genome) -> RuleResult {
    if !genome.subject.is_european_or_unknown() {
        return Err(RuleError::NotApplicable(
            "unknown for this ethnicity".to_string(),
        ));
    }
    let rs7574865 = genome.genotype("rs7574865");
    let text = if rs7574865.matches("TT") {
        "Higher odds"
    } else if rs7574865.carries(Allele::T) {
        "Slight risk"
    } else {
        "<Unknown>"
    };
    Ok(text.into())
}

pub fn stroke(genome: &Genome) -> RuleResult {
    let table = GenotypeTable::new()
        .with("AA", "Moderately increased risk of having a stroke")
        .with("AG", "Slightly increased risk of having a stroke")
        .with("GG", "Typical risk of having a stroke")
        .with_missing("Unable to determine");
    Ok(describe("rs12425791", &genome.genotype("rs12425791"), &table).into())
}

/// Only the CT odds ratio (0.79) of rs2165241 is known so far.
pub fn exfoliation_glaucoma(genome: &Genome) -> RuleResult {
    require_european(genome)?;
    Err(RuleError::NotImplemented)
}
