use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Instant;

use lending_analytics_core::classification::income::{
    borrower_income_distribution, tract_income_distribution, IncomeDistribution,
};
use lending_analytics_core::classification::minority::{
    minority_distribution, MinorityDistribution, QuartileThresholds,
};
use lending_analytics_core::classification::{
    classify_in_scope, income_band_record_counts, minority_band_record_counts, ClassifiedRecord,
};
use lending_analytics_core::{with_metadata, EngineConfig, IncomeBand, MinorityBand};

use crate::input;

/// Arguments for band classification
#[derive(Args)]
pub struct ClassifyArgs {
    /// Path to JSON records (array, or object with "records")
    #[arg(long)]
    pub input: Option<String>,

    /// Include every classified record in the output
    #[arg(long)]
    pub with_records: bool,
}

/// Arguments for minority quartile thresholds
#[derive(Args)]
pub struct QuartilesArgs {
    /// Path to JSON records (array, or object with "records")
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Serialize)]
struct ClassificationOutput<'a> {
    thresholds: Option<QuartileThresholds>,
    income_band_records: BTreeMap<IncomeBand, usize>,
    minority_band_records: BTreeMap<MinorityBand, usize>,
    tract_income: IncomeDistribution,
    borrower_income: Option<IncomeDistribution>,
    minority: Option<MinorityDistribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    records: Option<Vec<ClassifiedRecord<'a>>>,
}

pub fn run_classify(
    args: ClassifyArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let records = input::read_records(args.input.as_deref())?;
    lending_analytics_core::records::ensure_records(&records)?;
    let start = Instant::now();
    let mut warnings = Vec::new();

    let (scope, classified) = classify_in_scope(&records, config, &mut warnings);
    let tolerance = config.lmi_reconciliation_tolerance;

    let output = ClassificationOutput {
        thresholds: scope.as_ref().map(|s| s.thresholds().clone()),
        income_band_records: income_band_record_counts(&classified),
        minority_band_records: minority_band_record_counts(&classified),
        tract_income: tract_income_distribution(&classified, tolerance, &mut warnings),
        borrower_income: borrower_income_distribution(&records, tolerance, &mut warnings),
        minority: scope.as_ref().map(|s| minority_distribution(&classified, s)),
        records: args.with_records.then(|| classified.clone()),
    };

    let result = with_metadata(
        "Income banding by ratio to AMFI; minority quartiles over distinct tracts",
        &config.income_thresholds,
        warnings,
        start.elapsed().as_micros() as u64,
        output,
    );
    Ok(serde_json::to_value(result)?)
}

pub fn run_quartiles(args: QuartilesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let records = input::read_records(args.input.as_deref())?;
    let start = Instant::now();
    let mut warnings = Vec::new();

    let thresholds = QuartileThresholds::from_records(&records, &mut warnings)?;
    let labels: BTreeMap<MinorityBand, String> = MinorityBand::KNOWN
        .iter()
        .map(|&band| (band, thresholds.label(band)))
        .collect();

    let result = with_metadata(
        "Linear-interpolation quartiles over distinct tracts",
        &serde_json::json!({ "tract_dedup": "first value wins" }),
        warnings,
        start.elapsed().as_micros() as u64,
        serde_json::json!({ "thresholds": thresholds, "labels": labels }),
    );
    Ok(serde_json::to_value(result)?)
}
