use std::path::PathBuf;

use anyhow::{bail, ensure, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod analysis;
mod charts;
mod columns;
mod config;
mod error;
mod loader;
mod models;
mod output;
mod report;
mod stats;

use crate::config::Config;
use crate::error::AppError;

const MAX_LISTED_WARNINGS: usize = 10;

#[derive(Parser)]
#[command(name = "ab-ticket-analyzer")]
#[command(about = "A/B test analysis of support-ticket exports", long_about = None)]
struct Cli {
    /// Debug-level logging on stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the ticket export, test the groups and write charts and results
    Run(RunArgs),
    /// Compare two ad-hoc samples
    Compare {
        /// Group A observations, comma or space separated
        #[arg(long, allow_hyphen_values = true)]
        a: String,
        /// Group B observations, comma or space separated
        #[arg(long, allow_hyphen_values = true)]
        b: String,
        #[arg(long)]
        alpha: Option<f64>,
        /// Print the normalized JSON document instead of the conclusion
        #[arg(long)]
        json: bool,
    },
    /// Print the conclusion of a saved results document
    Show {
        #[arg(default_value = "reports/ab_test_results.json")]
        results: PathBuf,
    },
    /// Write the default configuration as TOML
    InitConfig {
        #[arg(long, default_value = "ab-ticket-analyzer.toml")]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ticket export CSV
    #[arg(long)]
    input: Option<PathBuf>,
    /// Daily counts CSV
    #[arg(long)]
    daily: Option<PathBuf>,
    #[arg(long)]
    reports_dir: Option<PathBuf>,
    #[arg(long)]
    alpha: Option<f64>,
    #[arg(long)]
    no_charts: bool,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Compare { a, b, alpha, json } => {
            let alpha = alpha.unwrap_or(Config::default().analysis.alpha);
            ensure!(alpha > 0.0 && alpha < 1.0, "alpha must be between 0 and 1, got {alpha}");
            let sample_a = parse_sample(&a).context("invalid --a sample")?;
            let sample_b = parse_sample(&b).context("invalid --b sample")?;

            let result = analysis::run_full_analysis(&sample_a, &sample_b, alpha)?;
            if json {
                println!("{}", output::to_json_string(&result, now())?);
            } else {
                for line in report::test_statistics_lines(&result) {
                    println!("{line}");
                }
                println!();
                println!("{}", result.conclusion);
            }
            Ok(())
        }
        Commands::Show { results } => {
            let result = output::read_results(&results)
                .with_context(|| format!("failed to read {}", results.display()))?;
            for line in report::test_statistics_lines(&result) {
                println!("{line}");
            }
            println!();
            println!("{}", result.conclusion);
            Ok(())
        }
        Commands::InitConfig { out, force } => {
            if out.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", out.display());
            }
            let content = Config::default().to_toml()?;
            std::fs::write(&out, content)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Default configuration written to {}.", out.display());
            Ok(())
        }
    }
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(input) = args.input {
        config.paths.tickets = input;
    }
    if let Some(daily) = args.daily {
        config.paths.daily = daily;
    }
    if let Some(dir) = args.reports_dir {
        config.paths.reports_dir = dir;
    }
    if let Some(alpha) = args.alpha {
        config.analysis.alpha = alpha;
    }
    let alpha = config.analysis.alpha;
    ensure!(alpha > 0.0 && alpha < 1.0, "alpha must be between 0 and 1, got {alpha}");

    println!("{}", "=".repeat(70));
    println!(" A/B TEST: effectiveness of the new instructions");
    println!("{}", "=".repeat(70));

    println!("\nSTEP 1: loading data...");
    let export = match loader::load_tickets(&config.paths.tickets, &config) {
        Err(AppError::MissingInput(path)) => {
            println!("Input file not found: {}", path.display());
            println!("Copy your CSV exports into the data directory:");
            println!("  - {}", config.paths.tickets.display());
            println!("  - {} (optional)", config.paths.daily.display());
            bail!("input file not found: {}", path.display());
        }
        other => other.context("failed to load ticket export")?,
    };
    println!(
        "Loaded {} rows (delimiter '{}')",
        export.total_rows, export.delimiter
    );
    for (role, header) in &export.detected_columns {
        println!("  {:<16} <- {header}", role.name());
    }
    if !export.missing_optional_columns.is_empty() {
        println!(
            "  not found: {}",
            export.missing_optional_columns.join(", ")
        );
    }
    if !export.warnings.is_empty() {
        println!("{} parse warning(s):", export.warnings.len());
        for warning in export.warnings.iter().take(MAX_LISTED_WARNINGS) {
            println!("  line {}: {}", warning.line, warning.message);
        }
    }
    let daily = loader::load_daily(&config.paths.daily, &config.daily);

    println!("\nSTEP 2: preparing samples...");
    let prepared = loader::prepare(&export).context("cannot build group samples")?;
    if prepared.skipped_rows > 0 {
        println!("Skipped {} row(s) without classroom or group", prepared.skipped_rows);
    }
    for line in report::group_profile_lines(&prepared.classrooms) {
        println!("{line}");
    }
    if let Some((first, last)) = report::test_period(&export.tickets) {
        println!(
            "Test period: {} .. {}",
            first.format("%Y-%m-%d"),
            last.format("%Y-%m-%d")
        );
    }

    println!("\nSTEP 3: statistical analysis...");
    let result = analysis::run_full_analysis(&prepared.sample_a, &prepared.sample_b, alpha)?;
    for line in report::test_statistics_lines(&result) {
        println!("  {line}");
    }

    let mut artifacts = Vec::new();
    if args.no_charts {
        info!("chart rendering disabled");
    } else {
        println!("\nSTEP 4: rendering charts...");
        let inputs = charts::ChartInputs {
            sample_a: &prepared.sample_a,
            sample_b: &prepared.sample_b,
            categories: &prepared.categories,
            daily: daily.as_deref(),
            result: &result,
        };
        match charts::render_all(&inputs, &config) {
            Ok(paths) => {
                println!("Rendered {} chart(s)", paths.len());
                artifacts.extend(paths);
            }
            Err(err) => {
                warn!(error = %err, "chart rendering failed");
                println!("Charts could not be rendered: {err}");
            }
        }
    }

    println!("\nSTEP 5: saving results...");
    match output::save_results(&result, &config.paths.reports_dir, now()) {
        Some(path) => {
            println!("Results saved to {}", path.display());
            artifacts.push(path);
        }
        None => println!("Results could not be saved"),
    }

    println!("\nSTEP 6: summary");
    print!("{}", report::build_summary(&result, &artifacts));
    Ok(())
}

/// Observations separated by commas and/or whitespace.
fn parse_sample(raw: &str) -> anyhow::Result<Vec<f64>> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .with_context(|| format!("not a number: {token:?}"))
        })
        .collect()
}

fn now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}
