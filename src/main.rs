use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueHint};
use clap_complete::{generate, Shell};
use console::style;
use std::io;
use std::path::PathBuf;
use tracing::info;

use snp_health::genome::parse_assignment;
use snp_health::{
    health_rules, Ethnicity, Genome, Genotype, ReportFormat, ReportRenderer, Settings, Sex,
    Subject,
};

/// Health-risk report from SNP genotypes
#[derive(Parser, Debug)]
#[command(
    name = "snp-health",
    version,
    about = "Infer health-risk statements from SNP genotypes",
    long_about = r#"
Runs a fixed catalogue of health rules against genotypes given on the
command line, e.g.

  snp-health report -s rs429358=TC -s rs7412=CC --sex female

Phased genotypes are written with a bar (rs429358=C|T). The associations
are taken from individual studies and are not clinically validated.
"#
)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the health report
    Report(ReportArgs),
    /// List the registered rules in report order
    Rules,
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// Genotype assignment rsID=GT (repeatable)
    #[arg(short, long = "snp", value_name = "RSID=GT", value_parser = parse_snp)]
    snps: Vec<(String, Genotype)>,

    #[arg(long, value_enum, default_value = "unknown")]
    sex: Sex,

    #[arg(long, value_enum, default_value = "unknown")]
    ethnicity: Ethnicity,

    #[arg(long)]
    year_of_birth: Option<i32>,

    /// TOML settings file
    #[arg(short, long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Output format (overrides the settings file)
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Run rules on a thread pool
    #[arg(short, long)]
    parallel: bool,

    /// Number of threads (0 = auto)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Rule to leave out (repeatable)
    #[arg(long, value_name = "RULE")]
    skip: Vec<String>,
}

fn parse_snp(s: &str) -> Result<(String, Genotype), String> {
    parse_assignment(s).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Report(args) => run_report(args),
        Commands::Rules => {
            list_rules();
            Ok(())
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(format!("snp_health={}", level))
        .with_writer(io::stderr)
        .init();
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}

fn list_rules() {
    println!("{}", style("Registered health rules:").bold().cyan());
    println!();
    for rule in health_rules().rules() {
        println!("  {} - {}", style(rule.name).green().bold(), rule.title);
    }
}

fn settings_from_args(args: &ReportArgs) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(format) = args.format {
        settings.format = format;
    }
    if let Some(threads) = args.threads {
        settings.threads = threads;
    }
    settings.parallel |= args.parallel;
    settings.skip.extend(args.skip.iter().cloned());
    Ok(settings)
}

fn run_report(args: ReportArgs) -> Result<()> {
    let settings = settings_from_args(&args)?;

    let mut genome = Genome::new(Subject::new(args.ethnicity, args.sex, args.year_of_birth));
    for (rsid, genotype) in &args.snps {
        genome.insert(rsid, *genotype);
    }
    info!("Loaded {} genotypes", genome.len());

    let rules = health_rules().without(&settings.skip);
    let report = if settings.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.resolved_threads())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to initialize thread pool: {}", e))?;
        pool.install(|| rules.run_parallel(&genome))
    } else {
        rules.run(&genome)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    ReportRenderer::new(settings.format).render(&report, &genome.subject, &mut out)?;
    Ok(())
}
