mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::classify::{ClassifyArgs, QuartilesArgs};
use commands::compare::CompareArgs;
use commands::concentration::{HhiArgs, MergerArgs};
use commands::population::PopulationSharesArgs;
use commands::report::ReportArgs;
use commands::weighted::WeightedArgs;

/// Fair-lending analytics over aggregated loan records
#[derive(Parser)]
#[command(
    name = "lax",
    version,
    about = "Fair-lending analytics over aggregated loan records",
    long_about = "Classifies tracts and borrowers into income and minority bands, builds \
                  weighted summary tables, census population shares, HHI concentration \
                  and peer comparisons with chi-squared significance. Reads JSON from \
                  --input or stdin."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Engine configuration file (JSON or YAML); defaults apply otherwise
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify records into income and minority bands
    Classify(ClassifyArgs),
    /// Compute minority quartile thresholds for a record scope
    Quartiles(QuartilesArgs),
    /// Weighted mean and median with exemption-aware zero filtering
    Weighted(WeightedArgs),
    /// Population shares per band from census benchmarks
    PopulationShares(PopulationSharesArgs),
    /// Herfindahl-Hirschman Index per year and segment
    Hhi(HhiArgs),
    /// Simulate a merger and screen the HHI change
    Merger(MergerArgs),
    /// Compare a subject lender with its peers
    Compare(CompareArgs),
    /// Build the full area report
    Report(ReportArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let engine_config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Classify(args) => commands::classify::run_classify(args, &engine_config),
        Commands::Quartiles(args) => commands::classify::run_quartiles(args),
        Commands::Weighted(args) => commands::weighted::run_weighted(args),
        Commands::PopulationShares(args) => commands::population::run_population_shares(args),
        Commands::Hhi(args) => commands::concentration::run_hhi(args, &engine_config),
        Commands::Merger(args) => commands::concentration::run_merger(args, &engine_config),
        Commands::Compare(args) => commands::compare::run_compare(args, &engine_config),
        Commands::Report(args) => commands::report::run_report(args, cli.config.is_some(), &engine_config),
        Commands::Version => {
            println!("lax {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
