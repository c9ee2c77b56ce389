use snp_health::{
    health_rules, Ethnicity, Finding, Genome, ReportFormat, ReportRenderer, RuleOutcome, Sex,
    Subject,
};

fn subject_genome(subject: Subject, calls: &[(&str, &str)]) -> anyhow::Result<Genome> {
    let mut genome = Genome::new(subject);
    for (rsid, genotype) in calls {
        genome.insert_str(rsid, genotype)?;
    }
    Ok(genome)
}

#[test]
fn full_report_for_european_female() -> anyhow::Result<()> {
    let genome = subject_genome(
        Subject::new(Ethnicity::European, Sex::Female, Some(1935)),
        &[
            ("rs429358", "C|T"),
            ("rs7412", "T|C"),
            ("rs1219648", "AA"),
            ("rs3803662", "GG"),
            ("rs4293393", "AG"),
            ("rs7805747", "AA"),
            ("rs3923809", "GG"),
            ("rs7574865", "GT"),
            ("rs12425791", "GA"),
        ],
    )?;

    let report = health_rules().run(&genome);
    assert_eq!(report.len(), 9);

    assert_eq!(
        report.get("apoe_variants").map(ToString::to_string),
        Some("e1/e3".to_string())
    );
    assert!(report.get("breast_cancer").map_or(false, RuleOutcome::is_success));
    match report.get("chronic_kidney_disease") {
        Some(RuleOutcome::Success(Finding::Risk(risk))) => {
            assert_eq!(risk.pooled.studies, 2);
            assert!(risk.relative_risk > 1.0);
        }
        other => panic!("unexpected CKD outcome {:?}", other),
    }
    assert_eq!(
        report.get("rheumatoid_arthritis"),
        Some(&RuleOutcome::NotImplemented)
    );
    assert_eq!(
        report.get("stroke").map(ToString::to_string),
        Some("Slightly increased risk of having a stroke".to_string())
    );
    assert_eq!(report.summary().failed, 0);
    Ok(())
}

#[test]
fn inapplicable_rules_are_recorded_not_dropped() -> anyhow::Result<()> {
    let genome = subject_genome(
        Subject::new(Ethnicity::Asian, Sex::Male, None),
        &[("rs429358", "CT"), ("rs7412", "CT")],
    )?;
    let report = health_rules().run(&genome);

    let names: Vec<&str> = report.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names.len(), 9);
    assert_eq!(
        report.get("apoe_variants").map(ToString::to_string),
        Some("e1/e3 or e2/e4".to_string())
    );
    for rule in [
        "breast_cancer",
        "chronic_kidney_disease",
        "hypothyroidism",
        "migraines",
        "scleroderma",
    ] {
        assert!(
            matches!(report.get(rule), Some(RuleOutcome::NotApplicable(_))),
            "{} should not apply",
            rule
        );
    }
    Ok(())
}

#[test]
fn parallel_report_matches_sequential() -> anyhow::Result<()> {
    let genome = subject_genome(
        Subject::default(),
        &[("rs429358", "TT"), ("rs7412", "CT"), ("rs7805747", "AG")],
    )?;
    let rules = health_rules();
    assert_eq!(rules.run(&genome), rules.run_parallel(&genome));
    Ok(())
}

#[test]
fn skipped_rules_are_absent_from_rendered_report() -> anyhow::Result<()> {
    let genome = Genome::default();
    let report = health_rules()
        .without(&["stroke".to_string(), "migraines".to_string()])
        .run(&genome);
    assert_eq!(report.len(), 7);

    let mut out = Vec::new();
    ReportRenderer::new(ReportFormat::Text)
        .with_color(false)
        .render(&report, &genome.subject, &mut out)?;
    let text = String::from_utf8(out)?;
    assert!(text.contains("APOE variants"));
    assert!(!text.contains("Stroke"));
    Ok(())
}
