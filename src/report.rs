//! Fault-isolating execution of health rules.
//!
//! A [`RuleSet`] is an ordered registration list. Running it invokes every
//! rule against the genome and records one [`RuleOutcome`] per rule, in
//! registration order, whatever the individual rules do.

use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::genome::Genome;
use crate::haplotype::HaplotypeCall;
use crate::odds::{PoolError, PooledEstimate};

/// Successful result of a rule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Finding {
    Text(String),
    Lines(Vec<String>),
    Haplotype(HaplotypeCall),
    Risk(RiskEstimate),
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::Text(text) => write!(f, "{}", text),
            Finding::Lines(lines) => write!(f, "{}", lines.join("\n")),
            Finding::Haplotype(call) => write!(f, "{}", call),
            Finding::Risk(risk) => write!(f, "{}", risk),
        }
    }
}

impl From<String> for Finding {
    fn from(text: String) -> Self {
        Finding::Text(text)
    }
}

impl From<&str> for Finding {
    fn from(text: &str) -> Self {
        Finding::Text(text.to_string())
    }
}

/// Pooled odds ratio turned into risk relative to the population baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskEstimate {
    pub relative_risk: f64,
    pub prevalence: f64,
    pub pooled: PooledEstimate,
}

impl RiskEstimate {
    pub fn new(pooled: PooledEstimate, prevalence: f64) -> Result<Self, PoolError> {
        Ok(Self {
            relative_risk: pooled.relative_risk(prevalence)?,
            prevalence,
            pooled,
        })
    }
}

impl fmt::Display for RiskEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2} relative risk, {:.2} odds ratio ({} markers)",
            self.relative_risk, self.pooled.odds_ratio, self.pooled.studies
        )
    }
}

/// Ways a rule can decline to produce a finding
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("not implemented")]
    NotImplemented,
    #[error("not applicable: {0}")]
    NotApplicable(String),
    #[error(transparent)]
    Evidence(#[from] PoolError),
    #[error("{0}")]
    Failed(String),
}

pub type RuleResult = Result<Finding, RuleError>;

/// Recorded result of one rule in one report run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum RuleOutcome {
    Success(Finding),
    NotApplicable(String),
    NotImplemented,
    Error(String),
}

impl RuleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RuleOutcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RuleOutcome::Error(_))
    }
}

impl From<RuleResult> for RuleOutcome {
    fn from(result: RuleResult) -> Self {
        match result {
            Ok(finding) => RuleOutcome::Success(finding),
            Err(RuleError::NotImplemented) => RuleOutcome::NotImplemented,
            Err(RuleError::NotApplicable(reason)) => RuleOutcome::NotApplicable(reason),
            // No evidence means no report for this subject, never zero risk.
            Err(RuleError::Evidence(PoolError::InsufficientEvidence)) => {
                RuleOutcome::NotApplicable("no evidence available for this subject".to_string())
            }
            Err(err @ RuleError::Evidence(_)) => RuleOutcome::Error(err.to_string()),
            Err(RuleError::Failed(message)) => RuleOutcome::Error(message),
        }
    }
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleOutcome::Success(finding) => write!(f, "{}", finding),
            RuleOutcome::NotApplicable(reason) => write!(f, "<Not applicable: {}>", reason),
            RuleOutcome::NotImplemented => write!(f, "<Not implemented>"),
            RuleOutcome::Error(message) => write!(f, "<Error: {}>", message),
        }
    }
}

type Check = Box<dyn Fn(&Genome) -> RuleResult + Send + Sync>;

/// A named health rule
pub struct Rule {
    pub name: &'static str,
    pub title: &'static str,
    check: Check,
}

impl Rule {
    pub fn new<F>(name: &'static str, title: &'static str, check: F) -> Self
    where
        F: Fn(&Genome) -> RuleResult + Send + Sync + 'static,
    {
        Self {
            name,
            title,
            check: Box::new(check),
        }
    }

    /// Run the rule, converting panics into an `Error` outcome.
    pub fn invoke(&self, genome: &Genome) -> RuleOutcome {
        install_panic_hook();
        debug!(rule = self.name, "running rule");
        let result = {
            let _running = RunningRule::enter();
            panic::catch_unwind(AssertUnwindSafe(|| (self.check)(genome)))
        };
        let outcome = match result {
            Ok(result) => RuleOutcome::from(result),
            Err(payload) => RuleOutcome::Error(format!("rule panicked: {}", panic_message(&*payload))),
        };
        if let RuleOutcome::Error(message) = &outcome {
            warn!(rule = self.name, "rule failed: {}", message);
        }
        outcome
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("title", &self.title)
            .finish()
    }
}

thread_local! {
    static RUNNING_RULE: Cell<bool> = const { Cell::new(false) };
}

static PANIC_HOOK: Once = Once::new();

/// Marks the current thread as executing a rule until dropped.
struct RunningRule {
    previous: bool,
}

impl RunningRule {
    fn enter() -> Self {
        Self {
            previous: RUNNING_RULE.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for RunningRule {
    fn drop(&mut self) {
        RUNNING_RULE.with(|flag| flag.set(self.previous));
    }
}

/// Whether the current thread is inside [`Rule::invoke`].
pub fn rule_running() -> bool {
    RUNNING_RULE.with(Cell::get)
}

/// Wrap the process panic hook once so that panics raised by a rule are
/// logged at debug level instead of printed to stderr. Panics anywhere
/// else still reach the previous hook.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if rule_running() {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}", l.file(), l.line()))
                    .unwrap_or_default();
                debug!(%location, "rule panicked: {}", panic_message(info.payload()));
            } else {
                previous(info);
            }
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Ordered registration list of rules
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, name: &'static str, title: &'static str, check: F) -> Self
    where
        F: Fn(&Genome) -> RuleResult + Send + Sync + 'static,
    {
        self.rules.push(Rule::new(name, title, check));
        self
    }

    /// Drop the named rules, keeping the order of the rest.
    pub fn without(mut self, names: &[String]) -> Self {
        self.rules
            .retain(|rule| !names.iter().any(|name| name == rule.name));
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every rule in registration order.
    pub fn run(&self, genome: &Genome) -> Report {
        info!("Running {} rules", self.rules.len());
        let entries = self
            .rules
            .iter()
            .map(|rule| ReportEntry::new(rule, rule.invoke(genome)))
            .collect();
        Report { entries }
    }

    /// Run rules on the rayon pool. Entries still come back in registration
    /// order.
    pub fn run_parallel(&self, genome: &Genome) -> Report {
        info!(
            "Running {} rules on {} threads",
            self.rules.len(),
            rayon::current_num_threads()
        );
        let entries = self
            .rules
            .par_iter()
            .map(|rule| ReportEntry::new(rule, rule.invoke(genome)))
            .collect();
        Report { entries }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: String,
    pub title: String,
    pub outcome: RuleOutcome,
}

impl ReportEntry {
    fn new(rule: &Rule, outcome: RuleOutcome) -> Self {
        Self {
            name: rule.name.to_string(),
            title: rule.title.to_string(),
            outcome,
        }
    }
}

/// Per-rule outcomes in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn get(&self, name: &str) -> Option<&RuleOutcome> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.outcome)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for entry in &self.entries {
            match entry.outcome {
                RuleOutcome::Success(_) => summary.succeeded += 1,
                RuleOutcome::NotApplicable(_) => summary.not_applicable += 1,
                RuleOutcome::NotImplemented => summary.not_implemented += 1,
                RuleOutcome::Error(_) => summary.failed += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub succeeded: usize,
    pub not_applicable: usize,
    pub not_implemented: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn three_rules_with_failing_middle() -> RuleSet {
        RuleSet::new()
            .register("first", "First", |_| Ok("one".into()))
            .register("second", "Second", |_| panic!("marker table exploded"))
            .register("third", "Third", |_| Ok("three".into()))
    }

    #[test]
    fn failing_rule_does_not_abort_the_batch() {
        let report = three_rules_with_failing_middle().run(&Genome::default());
        let names: Vec<&str> = report.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
        assert_eq!(report.get("first"), Some(&RuleOutcome::Success("one".into())));
        assert!(matches!(
            report.get("second"),
            Some(RuleOutcome::Error(msg)) if msg.contains("marker table exploded")
        ));
        assert_eq!(report.get("third"), Some(&RuleOutcome::Success("three".into())));
    }

    #[test]
    fn rule_errors_map_to_distinct_outcomes() {
        let rules = RuleSet::new()
            .register("todo", "Todo", |_| Err(RuleError::NotImplemented))
            .register("female_only", "Female only", |_| {
                Err(RuleError::NotApplicable("only applicable for females".to_string()))
            })
            .register("no_data", "No data", |_| {
                Err(RuleError::Evidence(PoolError::InsufficientEvidence))
            })
            .register("bad_data", "Bad data", |_| {
                Err(PoolError::InvalidEvidence("odds ratio must be positive".to_string()).into())
            })
            .register("failed", "Failed", |_| Err(RuleError::Failed("boom".to_string())));

        let report = rules.run(&Genome::default());
        assert_eq!(report.get("todo"), Some(&RuleOutcome::NotImplemented));
        assert_eq!(
            report.get("female_only"),
            Some(&RuleOutcome::NotApplicable("only applicable for females".to_string()))
        );
        assert!(matches!(report.get("no_data"), Some(RuleOutcome::NotApplicable(_))));
        assert!(matches!(report.get("bad_data"), Some(RuleOutcome::Error(_))));
        assert_eq!(report.get("failed"), Some(&RuleOutcome::Error("boom".to_string())));

        let summary = report.summary();
        assert_eq!(summary.not_implemented, 1);
        assert_eq!(summary.not_applicable, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 0);
    }

    #[test]
    fn parallel_run_keeps_registration_order() {
        let rules = RuleSet::new()
            .register("slow", "Slow", |_| {
                thread::sleep(Duration::from_millis(50));
                Ok("slow".into())
            })
            .register("fast", "Fast", |_| Ok("fast".into()))
            .register("panics", "Panics", |_| panic!("boom"))
            .register("medium", "Medium", |_| {
                thread::sleep(Duration::from_millis(10));
                Ok("medium".into())
            });

        let genome = Genome::default();
        let sequential = rules.run(&genome);
        let parallel = rules.run_parallel(&genome);
        assert_eq!(sequential, parallel);
        let names: Vec<&str> = parallel.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "panics", "medium"]);
    }

    #[test]
    fn contained_panics_are_scoped_to_the_rule() {
        let rules = RuleSet::new()
            .register("scope", "Scope", |_| {
                Ok(if rule_running() { "inside" } else { "outside" }.into())
            })
            .register("panics", "Panics", |_| panic!("quiet failure"));

        assert!(!rule_running());
        let report = rules.run(&Genome::default());
        assert!(!rule_running());
        assert_eq!(report.get("scope"), Some(&RuleOutcome::Success("inside".into())));
        assert!(matches!(
            report.get("panics"),
            Some(RuleOutcome::Error(msg)) if msg.contains("quiet failure")
        ));

        let parallel = rules.run_parallel(&Genome::default());
        assert_eq!(report, parallel);
    }

    #[test]
    fn without_removes_named_rules_only() {
        let rules = three_rules_with_failing_middle().without(&["second".to_string()]);
        let names: Vec<&str> = rules.rules().iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["first", "third"]);
    }

    #[test]
    fn outcomes_render_as_text() {
        assert_eq!(RuleOutcome::NotImplemented.to_string(), "<Not implemented>");
        assert_eq!(
            RuleOutcome::Success(Finding::Lines(vec!["a".into(), "b".into()])).to_string(),
            "a\nb"
        );
    }
}
