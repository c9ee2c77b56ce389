//! Fixed-effects pooling of odds ratios from independent studies.
//!
//! Each study contributes `(OR, confidence level, p-value, VIF)`. Its
//! standard error on the log scale is recovered from the p-value,
//! `se = |ln OR| / z(p)`, and the variance `se² · VIF` is inflated by the
//! study's variance inflation factor (or the pooler default). Studies are
//! then combined by inverse-variance weighting of `ln OR`:
//!
//! ```text
//! w_i      = 1 / (se_i² · VIF_i)
//! ln OR_p  = Σ w_i ln OR_i / Σ w_i
//! se_p     = sqrt(1 / Σ w_i)
//! p_p      = 2 · (1 - Φ(|ln OR_p| / se_p))
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::stats::{normal_quantile, two_sided_p, z_from_two_sided_p};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    #[error("no evidence to pool")]
    InsufficientEvidence,
    #[error("invalid evidence: {0}")]
    InvalidEvidence(String),
}

/// One published association for the outcome being pooled
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub odds_ratio: f64,
    pub confidence_level: f64,
    pub p_value: f64,
    pub variance_inflation: Option<f64>,
}

impl Evidence {
    pub fn new(odds_ratio: f64, confidence_level: f64, p_value: f64) -> Self {
        Self {
            odds_ratio,
            confidence_level,
            p_value,
            variance_inflation: None,
        }
    }

    pub fn with_inflation(mut self, variance_inflation: f64) -> Self {
        self.variance_inflation = Some(variance_inflation);
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        if !(self.odds_ratio.is_finite() && self.odds_ratio > 0.0) {
            return Err(PoolError::InvalidEvidence(format!(
                "odds ratio must be positive, got {}",
                self.odds_ratio
            )));
        }
        if self.odds_ratio == 1.0 {
            return Err(PoolError::InvalidEvidence(
                "odds ratio of 1 carries no standard error".to_string(),
            ));
        }
        if !(self.p_value > 0.0 && self.p_value < 1.0) {
            return Err(PoolError::InvalidEvidence(format!(
                "p-value must lie in (0, 1), got {}",
                self.p_value
            )));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(PoolError::InvalidEvidence(format!(
                "confidence level must lie in (0, 1), got {}",
                self.confidence_level
            )));
        }
        Ok(())
    }

    /// Variance of `ln OR`, inflated by the study's (or the default) VIF.
    fn log_variance(&self, default_inflation: f64) -> Result<f64, PoolError> {
        self.validate()?;
        let inflation = self.variance_inflation.unwrap_or(default_inflation);
        check_inflation(inflation)?;

        let z = z_from_two_sided_p(self.p_value).ok_or_else(|| {
            PoolError::InvalidEvidence(format!("p-value {} has no z-score", self.p_value))
        })?;
        let se = self.odds_ratio.ln().abs() / z;
        Ok(se * se * inflation)
    }
}

fn check_inflation(inflation: f64) -> Result<(), PoolError> {
    if !(inflation.is_finite() && inflation >= 1.0) {
        return Err(PoolError::InvalidEvidence(format!(
            "variance inflation factor must be >= 1, got {}",
            inflation
        )));
    }
    Ok(())
}

/// Combined estimate over all pooled studies
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PooledEstimate {
    pub odds_ratio: f64,
    /// Standard error of the pooled `ln OR`.
    pub standard_error: f64,
    pub p_value: f64,
    pub confidence_level: f64,
    pub confidence_interval: (f64, f64),
    pub studies: usize,
}

impl PooledEstimate {
    pub fn relative_risk(&self, prevalence: f64) -> Result<f64, PoolError> {
        relative_risk(self.odds_ratio, prevalence)
    }
}

/// Pool `evidence` with inverse-variance weights on the log-odds scale.
/// `default_inflation` applies to studies that carry no VIF of their own.
///
/// Each study's standard error is recovered from its p-value as
/// `|ln OR| / z(p)`. A study reporting an odds ratio of exactly 1, or a
/// p-value outside `(0, 1)`, has no recoverable standard error and is
/// rejected with [`PoolError::InvalidEvidence`]. An empty slice gives
/// [`PoolError::InsufficientEvidence`].
pub fn pooled_odds_ratio(
    evidence: &[Evidence],
    default_inflation: f64,
) -> Result<PooledEstimate, PoolError> {
    let first = evidence.first().ok_or(PoolError::InsufficientEvidence)?;
    check_inflation(default_inflation)?;

    let confidence_level = first.confidence_level;
    if evidence
        .iter()
        .any(|e| e.confidence_level != confidence_level)
    {
        return Err(PoolError::InvalidEvidence(
            "studies report different confidence levels".to_string(),
        ));
    }

    let mut weight_sum = 0.0;
    let mut weighted_log_or = 0.0;
    for e in evidence {
        let weight = 1.0 / e.log_variance(default_inflation)?;
        weight_sum += weight;
        weighted_log_or += weight * e.odds_ratio.ln();
    }

    let log_or = weighted_log_or / weight_sum;
    let standard_error = (1.0 / weight_sum).sqrt();
    let p_value = two_sided_p(log_or / standard_error);

    let critical = normal_quantile((1.0 + confidence_level) / 2.0).ok_or_else(|| {
        PoolError::InvalidEvidence(format!("confidence level {}", confidence_level))
    })?;
    let confidence_interval = (
        (log_or - critical * standard_error).exp(),
        (log_or + critical * standard_error).exp(),
    );

    let estimate = PooledEstimate {
        odds_ratio: log_or.exp(),
        standard_error,
        p_value,
        confidence_level,
        confidence_interval,
        studies: evidence.len(),
    };
    debug!(
        studies = estimate.studies,
        odds_ratio = estimate.odds_ratio,
        p_value = estimate.p_value,
        "pooled odds ratio"
    );
    Ok(estimate)
}

/// Approximate relative risk from an odds ratio and the baseline prevalence
/// of the outcome: `RR = OR / (1 - P + P·OR)`.
pub fn relative_risk(odds_ratio: f64, prevalence: f64) -> Result<f64, PoolError> {
    if !(odds_ratio.is_finite() && odds_ratio > 0.0) {
        return Err(PoolError::InvalidEvidence(format!(
            "odds ratio must be positive, got {}",
            odds_ratio
        )));
    }
    if !(prevalence > 0.0 && prevalence < 1.0) {
        return Err(PoolError::InvalidEvidence(format!(
            "prevalence must lie in (0, 1), got {}",
            prevalence
        )));
    }
    Ok(odds_ratio / (1.0 - prevalence + prevalence * odds_ratio))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_study_is_not_distorted() -> anyhow::Result<()> {
        let pooled = pooled_odds_ratio(&[Evidence::new(1.25, 0.95, 4.1e-10)], 1.0)?;
        assert!((pooled.odds_ratio - 1.25).abs() < 1e-12);
        assert!(((pooled.p_value - 4.1e-10) / 4.1e-10).abs() < 1e-4);
        assert_eq!(pooled.studies, 1);

        let inflated = pooled_odds_ratio(&[Evidence::new(1.25, 0.95, 4.1e-10)], 1.15)?;
        assert!((inflated.odds_ratio - 1.25).abs() < 1e-12);
        assert!(inflated.standard_error > pooled.standard_error);
        assert!(inflated.p_value > pooled.p_value);
        Ok(())
    }

    #[test]
    fn empty_evidence_is_insufficient() {
        assert_eq!(
            pooled_odds_ratio(&[], 1.15),
            Err(PoolError::InsufficientEvidence)
        );
    }

    #[test]
    fn pooled_estimate_lies_between_studies_and_tightens() -> anyhow::Result<()> {
        let studies = [
            Evidence::new(1.25, 0.95, 4.1e-10).with_inflation(1.15),
            Evidence::new(1.19, 0.95, 4.2e-12),
        ];
        let pooled = pooled_odds_ratio(&studies, 1.15)?;
        assert!(pooled.odds_ratio > 1.19 && pooled.odds_ratio < 1.25);

        let alone = pooled_odds_ratio(&studies[..1], 1.15)?;
        assert!(pooled.standard_error < alone.standard_error);
        assert!(pooled.confidence_interval.0 < pooled.odds_ratio);
        assert!(pooled.confidence_interval.1 > pooled.odds_ratio);
        Ok(())
    }

    #[test]
    fn stronger_evidence_dominates() -> anyhow::Result<()> {
        let pooled = pooled_odds_ratio(
            &[Evidence::new(2.0, 0.95, 1e-20), Evidence::new(1.1, 0.95, 0.9)],
            1.0,
        )?;
        assert!(pooled.odds_ratio > 1.9);
        Ok(())
    }

    #[test]
    fn protective_and_risk_studies_partially_cancel() -> anyhow::Result<()> {
        let pooled = pooled_odds_ratio(
            &[Evidence::new(1.5, 0.95, 0.001), Evidence::new(1.0 / 1.5, 0.95, 0.001)],
            1.0,
        )?;
        assert!((pooled.odds_ratio - 1.0).abs() < 1e-9);
        assert!(pooled.p_value > 0.99);
        Ok(())
    }

    #[test]
    fn null_odds_ratio_is_rejected_not_pooled() {
        let null = Evidence::new(1.0, 0.95, 0.2);
        assert!(matches!(
            pooled_odds_ratio(&[Evidence::new(1.2, 0.95, 0.01), null], 1.0),
            Err(PoolError::InvalidEvidence(msg)) if msg.contains("odds ratio of 1")
        ));
    }

    #[test]
    fn rejects_invalid_evidence() {
        let bad = [
            Evidence::new(0.0, 0.95, 0.01),
            Evidence::new(-1.2, 0.95, 0.01),
            Evidence::new(1.0, 0.95, 0.01),
            Evidence::new(1.2, 0.95, 0.0),
            Evidence::new(1.2, 0.95, 1.0),
            Evidence::new(1.2, 1.0, 0.01),
            Evidence::new(1.2, 0.95, 0.01).with_inflation(0.5),
        ];
        for e in bad {
            assert!(
                matches!(pooled_odds_ratio(&[e], 1.0), Err(PoolError::InvalidEvidence(_))),
                "{:?}",
                e
            );
        }
        assert!(matches!(
            pooled_odds_ratio(&[Evidence::new(1.2, 0.95, 0.01)], 0.9),
            Err(PoolError::InvalidEvidence(_))
        ));
        assert!(matches!(
            pooled_odds_ratio(
                &[Evidence::new(1.2, 0.95, 0.01), Evidence::new(1.3, 0.99, 0.01)],
                1.0
            ),
            Err(PoolError::InvalidEvidence(_))
        ));
    }

    #[test]
    fn relative_risk_attenuates_odds_ratio() -> anyhow::Result<()> {
        let rr = relative_risk(1.19, 0.034)?;
        assert!(rr < 1.19);
        assert!(rr > 1.0);
        assert!((relative_risk(0.8, 0.034)? - 0.8).abs() < 0.01);
        assert!(relative_risk(0.8, 0.034)? > 0.8);
        assert!(matches!(relative_risk(1.19, 0.0), Err(PoolError::InvalidEvidence(_))));
        assert!(matches!(relative_risk(0.0, 0.1), Err(PoolError::InvalidEvidence(_))));
        Ok(())
    }
}
