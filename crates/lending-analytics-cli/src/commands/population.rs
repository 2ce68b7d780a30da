use clap::{Args, ValueEnum};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;

use lending_analytics_core::population::shares::{
    population_shares, GeographyDemographics, Vintage, VintageRequest,
};
use lending_analytics_core::with_metadata;

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum VintageArg {
    Best,
    Acs,
    Census2020,
    Census2010,
}

impl From<VintageArg> for VintageRequest {
    fn from(v: VintageArg) -> Self {
        match v {
            VintageArg::Best => VintageRequest::BestAvailable,
            VintageArg::Acs => VintageRequest::Specific(Vintage::Acs),
            VintageArg::Census2020 => VintageRequest::Specific(Vintage::Census2020),
            VintageArg::Census2010 => VintageRequest::Specific(Vintage::Census2010),
        }
    }
}

/// Arguments for census population shares
#[derive(Args)]
pub struct PopulationSharesArgs {
    /// Path to JSON geographies (array, or object with "geographies")
    #[arg(long)]
    pub input: Option<String>,

    /// Census vintage to use
    #[arg(long, value_enum, default_value = "best")]
    pub vintage: VintageArg,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GeographySource {
    Bare(Vec<GeographyDemographics>),
    Wrapped { geographies: Vec<GeographyDemographics> },
}

pub fn run_population_shares(args: PopulationSharesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let source: GeographySource = input::read_input(args.input.as_deref(), "population shares")?;
    let geographies = match source {
        GeographySource::Bare(g) | GeographySource::Wrapped { geographies: g } => g,
    };
    let start = Instant::now();
    let mut warnings = Vec::new();

    let request = VintageRequest::from(args.vintage);
    let shares = population_shares(&geographies, request, &mut warnings);

    let result = with_metadata(
        "Population summed across geographies, then divided within each band dimension",
        &serde_json::json!({ "vintage": request, "preference": Vintage::PREFERENCE }),
        warnings,
        start.elapsed().as_micros() as u64,
        shares,
    );
    Ok(serde_json::to_value(result)?)
}
