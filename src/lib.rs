//! # SNP Health
//!
//! Infers health-risk statements from an individual's genotypes at a fixed
//! set of named SNPs.
//!
//! ## Features
//!
//! - Order-independent genotype matching against per-marker lookup tables
//! - Two-marker haplotype resolution (APOE) with explicit ambiguity
//! - Fixed-effects pooling of odds ratios into a relative risk
//! - Fault-isolating report orchestration, sequential or on a rayon pool
//! - Text and JSON report rendering

pub mod config;
pub mod genome;
pub mod haplotype;
pub mod health;
pub mod matcher;
pub mod odds;
pub mod output;
pub mod report;
pub mod stats;
pub mod types;

// Re-export key types
pub use config::Settings;
pub use genome::Genome;
pub use haplotype::{HaplotypeCall, HaplotypeResolver, APOE};
pub use health::health_rules;
pub use matcher::{phased_match, unphased_match, GenotypeTable, Match, TableKey};
pub use odds::{pooled_odds_ratio, relative_risk, Evidence, PoolError, PooledEstimate};
pub use output::{ReportFormat, ReportRenderer};
pub use report::{Finding, Report, RuleError, RuleOutcome, RuleResult, RuleSet};
pub use types::*;
