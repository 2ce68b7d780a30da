use clap::{Args, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

use lending_analytics_core::concentration::hhi::{hhi_by_year_segment, EntityVolume, VolumeMeasure};
use lending_analytics_core::concentration::merger::simulate_merger;
use lending_analytics_core::records::ensure_records;
use lending_analytics_core::{with_metadata, EngineConfig};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MeasureArg {
    LoanCount,
    LoanAmount,
}

impl From<MeasureArg> for VolumeMeasure {
    fn from(m: MeasureArg) -> Self {
        match m {
            MeasureArg::LoanCount => VolumeMeasure::LoanCount,
            MeasureArg::LoanAmount => VolumeMeasure::LoanAmount,
        }
    }
}

/// Arguments for HHI per year and segment
#[derive(Args)]
pub struct HhiArgs {
    /// Path to JSON records (array, or object with "records")
    #[arg(long)]
    pub input: Option<String>,

    /// Volume measure for market share
    #[arg(long, value_enum, default_value = "loan-count")]
    pub measure: MeasureArg,
}

/// Arguments for merger simulation
#[derive(Args)]
pub struct MergerArgs {
    /// Path to JSON entity volumes (array, or object with "volumes")
    #[arg(long)]
    pub input: Option<String>,

    /// Surviving entity
    #[arg(long)]
    pub acquirer: String,

    /// Entity folded into the acquirer
    #[arg(long)]
    pub target: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VolumeSource {
    Bare(Vec<EntityVolume>),
    Wrapped { volumes: Vec<EntityVolume> },
}

pub fn run_hhi(args: HhiArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let records = input::read_records(args.input.as_deref())?;
    ensure_records(&records)?;
    let start = Instant::now();
    let mut warnings = Vec::new();

    let results = hhi_by_year_segment(&records, args.measure.into(), config, &mut warnings);

    let result = with_metadata(
        "HHI = sum of squared market shares (0-100 scale), per year and segment",
        &config.hhi_thresholds,
        warnings,
        start.elapsed().as_micros() as u64,
        results,
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_merger(args: MergerArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let source: VolumeSource = input::read_input(args.input.as_deref(), "merger simulation")?;
    let volumes = match source {
        VolumeSource::Bare(v) | VolumeSource::Wrapped { volumes: v } => v,
    };
    let start = Instant::now();

    let simulation = simulate_merger(&volumes, &args.acquirer, &args.target, &config.hhi_thresholds)?;

    let result = with_metadata(
        "Pre/post-merger HHI screened against the 2010 Horizontal Merger Guidelines",
        &config.hhi_thresholds,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        simulation,
    );
    Ok(serde_json::to_value(result)?)
}
