use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

use lending_analytics_core::aggregation::weighted::{summarize, ExemptionPolicy, WeightedMetric};
use lending_analytics_core::with_metadata;

use crate::input;

/// Arguments for weighted mean / median
#[derive(Args)]
pub struct WeightedArgs {
    /// Path to JSON input: {"metrics": [...], "exempt_entities": [...]}
    #[arg(long)]
    pub input: Option<String>,

    /// Comma-separated exempt entity ids (added to any in the input)
    #[arg(long, value_delimiter = ',')]
    pub exempt: Vec<String>,
}

#[derive(Deserialize)]
struct WeightedInput {
    metrics: Vec<WeightedMetric>,
    #[serde(default)]
    exempt_entities: Vec<String>,
}

pub fn run_weighted(args: WeightedArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let data: WeightedInput = input::read_input(args.input.as_deref(), "weighted statistics")?;
    let start = Instant::now();

    let policy = ExemptionPolicy::from_entities(data.exempt_entities.into_iter().chain(args.exempt));
    let summary = summarize(&data.metrics, &policy);

    let mut warnings = Vec::new();
    if summary.rejected_negative_weight > 0 {
        warnings.push(format!(
            "{} metric(s) with negative weight rejected",
            summary.rejected_negative_weight
        ));
    }
    if summary.excluded_exempt_zeros > 0 {
        warnings.push(format!(
            "{} zero value(s) from exempt entities excluded",
            summary.excluded_exempt_zeros
        ));
    }
    if summary.overflowed {
        warnings.push("Weighted values exceed the decimal range; statistics shown as N/A".to_string());
    }

    for w in &warnings {
        tracing::warn!("{}", w);
    }

    let exempt: Vec<&str> = policy.exempt_entities().collect();
    let result = with_metadata(
        "Weighted mean sum(v*w)/sum(w); weighted median at half cumulative weight",
        &serde_json::json!({ "exempt_entities": exempt }),
        warnings,
        start.elapsed().as_micros() as u64,
        summary,
    );
    Ok(serde_json::to_value(result)?)
}
