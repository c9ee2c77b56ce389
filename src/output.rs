use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::report::{Report, ReportSummary, RuleOutcome};
use crate::types::Subject;

/// Supported report formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    subject: &'a Subject,
    summary: ReportSummary,
    rules: &'a Report,
}

/// Writes a finished report to any sink
pub struct ReportRenderer {
    format: ReportFormat,
    color: bool,
}

impl ReportRenderer {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            color: console::colors_enabled(),
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn render<W: Write>(&self, report: &Report, subject: &Subject, out: &mut W) -> Result<()> {
        match self.format {
            ReportFormat::Text => self.render_text(report, out),
            ReportFormat::Json => self.render_json(report, subject, out),
        }
    }

    fn render_text<W: Write>(&self, report: &Report, out: &mut W) -> Result<()> {
        for entry in &report.entries {
            let title = if self.color {
                style(&entry.title).bold().cyan().to_string()
            } else {
                entry.title.clone()
            };
            writeln!(out, "{}", title).context("Failed to write report")?;

            let body = entry.outcome.to_string();
            for line in body.lines() {
                let line = match (&entry.outcome, self.color) {
                    (RuleOutcome::Success(_), _) | (_, false) => line.to_string(),
                    (RuleOutcome::Error(_), true) => style(line).red().to_string(),
                    (_, true) => style(line).dim().to_string(),
                };
                writeln!(out, "  {}", line).context("Failed to write report")?;
            }
            writeln!(out).context("Failed to write report")?;
        }

        let summary = report.summary();
        writeln!(
            out,
            "{} reported, {} not applicable, {} not implemented, {} failed",
            summary.succeeded, summary.not_applicable, summary.not_implemented, summary.failed
        )
        .context("Failed to write report")?;
        Ok(())
    }

    fn render_json<W: Write>(&self, report: &Report, subject: &Subject, out: &mut W) -> Result<()> {
        let document = JsonReport {
            generated_at: Local::now().to_rfc3339(),
            subject,
            summary: report.summary(),
            rules: report,
        };
        serde_json::to_writer_pretty(&mut *out, &document)
            .context("Failed to serialize JSON report")?;
        writeln!(out).context("Failed to write report")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Finding, RuleError, RuleSet};
    use crate::genome::Genome;

    fn sample_report() -> Report {
        RuleSet::new()
            .register("stroke", "Stroke", |_| Ok(Finding::Text("Typical risk".to_string())))
            .register("todo", "Todo", |_| Err(RuleError::NotImplemented))
            .run(&Genome::default())
    }

    #[test]
    fn text_report_lists_rules_in_order() -> Result<()> {
        let mut out = Vec::new();
        ReportRenderer::new(ReportFormat::Text)
            .with_color(false)
            .render(&sample_report(), &Subject::default(), &mut out)?;
        let text = String::from_utf8(out)?;
        assert!(text.starts_with("Stroke\n  Typical risk\n\nTodo\n  <Not implemented>\n"));
        assert!(text.contains("1 reported, 0 not applicable, 1 not implemented, 0 failed"));
        Ok(())
    }

    #[test]
    fn json_report_carries_outcomes() -> Result<()> {
        let mut out = Vec::new();
        ReportRenderer::new(ReportFormat::Json).render(
            &sample_report(),
            &Subject::default(),
            &mut out,
        )?;
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        let entries = &value["rules"]["entries"];
        assert_eq!(entries[0]["name"], "stroke");
        assert_eq!(entries[0]["outcome"]["status"], "success");
        assert_eq!(entries[0]["outcome"]["detail"]["value"], "Typical risk");
        assert_eq!(entries[1]["outcome"]["status"], "not_implemented");
        assert_eq!(value["summary"]["not_implemented"], 1);
        assert_eq!(value["subject"]["ethnicity"], "unknown");
        Ok(())
    }
}
