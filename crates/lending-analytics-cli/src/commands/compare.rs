use clap::Args;
use serde_json::Value;
use std::time::Instant;

use lending_analytics_core::classification::classify_in_scope;
use lending_analytics_core::comparison::peer::{compare_to_peers, PeerSelection};
use lending_analytics_core::records::ensure_records;
use lending_analytics_core::{with_metadata, EngineConfig};

use crate::input;

/// Arguments for subject-versus-peer comparison
#[derive(Args)]
pub struct CompareArgs {
    /// Path to JSON records (array, or object with "records")
    #[arg(long)]
    pub input: Option<String>,

    /// Subject lender id
    #[arg(long)]
    pub subject: String,

    /// Comma-separated peer lender ids; volume band otherwise
    #[arg(long, value_delimiter = ',')]
    pub peers: Vec<String>,
}

pub fn run_compare(args: CompareArgs, config: &EngineConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let records = input::read_records(args.input.as_deref())?;
    ensure_records(&records)?;
    let start = Instant::now();
    let mut warnings = Vec::new();

    let (_, classified) = classify_in_scope(&records, config, &mut warnings);
    let selection = if args.peers.is_empty() {
        PeerSelection::VolumeBand
    } else {
        PeerSelection::Explicit(args.peers)
    };

    let comparison = compare_to_peers(&classified, &args.subject, &selection, config, &mut warnings)
        .ok_or_else(|| format!("Subject lender '{}' has no records in scope", args.subject))?;

    let result = with_metadata(
        "2x2 chi-squared per metric and year; flagged when significant and subject below peers",
        &serde_json::json!({
            "significance_level": config.significance_level,
            "yates_correction": config.yates_correction,
            "peer_band": config.peer_band,
        }),
        warnings,
        start.elapsed().as_micros() as u64,
        comparison,
    );
    Ok(serde_json::to_value(result)?)
}
