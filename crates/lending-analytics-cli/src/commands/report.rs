use clap::Args;
use serde_json::Value;

use lending_analytics_core::report::{build_area_report, ReportInput};
use lending_analytics_core::EngineConfig;

use crate::input;

/// Arguments for the full area report
#[derive(Args)]
pub struct ReportArgs {
    /// Path to JSON report input (records plus optional benchmarks, tract
    /// populations, subject lender and peers)
    #[arg(long)]
    pub input: Option<String>,

    /// Subject lender id for the peer comparison
    #[arg(long)]
    pub subject: Option<String>,
}

/// `--config` takes precedence over a config embedded in the input.
pub fn run_report(
    args: ReportArgs,
    config_overridden: bool,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let mut report_input: ReportInput = input::read_input(args.input.as_deref(), "the area report")?;
    if config_overridden {
        report_input.config = config.clone();
    }
    if args.subject.is_some() {
        report_input.subject_lender = args.subject;
    }

    let result = build_area_report(&report_input)?;
    Ok(serde_json::to_value(result)?)
}
