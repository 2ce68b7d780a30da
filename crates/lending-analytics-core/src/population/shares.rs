//! Census population shares per classification bucket.
//!
//! Populations are summed across geographies first and divided once, so a
//! large county weighs more than a small one. Shares are normalised within
//! each band dimension: income buckets sum to 100, minority quartiles sum to
//! 100, majority-minority yes/no sum to 100.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{push_warning, Band, BandDimension, MetricValue};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Census data period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vintage {
    Census2010,
    Census2020,
    Acs,
}

impl Vintage {
    /// Preference order for "best available": most recent first.
    pub const PREFERENCE: [Vintage; 3] = [Vintage::Acs, Vintage::Census2020, Vintage::Census2010];
}

impl fmt::Display for Vintage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vintage::Census2010 => "2010 Census",
            Vintage::Census2020 => "2020 Census",
            Vintage::Acs => "ACS",
        };
        f.write_str(s)
    }
}

/// Which vintage the caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "vintage")]
pub enum VintageRequest {
    Specific(Vintage),
    BestAvailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketPopulation {
    pub bucket: Band,
    pub population: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VintageData {
    pub vintage: Vintage,
    pub buckets: Vec<BucketPopulation>,
}

/// Census benchmark for one geography, possibly across several vintages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyDemographics {
    pub geoid: String,
    pub vintages: Vec<VintageData>,
}

impl GeographyDemographics {
    pub fn vintage(&self, vintage: Vintage) -> Option<&VintageData> {
        self.vintages.iter().find(|v| v.vintage == vintage)
    }

    /// The vintage a request resolves to for this geography.
    pub fn resolve(&self, request: VintageRequest) -> Option<&VintageData> {
        match request {
            VintageRequest::Specific(v) => self.vintage(v),
            VintageRequest::BestAvailable => {
                Vintage::PREFERENCE.iter().find_map(|&v| self.vintage(v))
            }
        }
    }
}

/// Population-weighted share of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationShare {
    pub bucket: Band,
    pub population: u64,
    pub share_pct: MetricValue,
    /// The vintage contributing the most population to this share.
    pub vintage: Vintage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyVintage {
    pub geoid: String,
    pub vintage: Vintage,
}

/// Shares for one vintage request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationShareSet {
    pub request: VintageRequest,
    pub shares: Vec<PopulationShare>,
    pub vintages_used: Vec<GeographyVintage>,
    /// More than one vintage contributed.
    pub blended: bool,
    /// Geographies without any usable vintage.
    pub skipped_geographies: Vec<String>,
}

impl PopulationShareSet {
    pub fn share(&self, bucket: Band) -> MetricValue {
        self.shares
            .iter()
            .find(|s| s.bucket == bucket)
            .map(|s| s.share_pct)
            .unwrap_or_default()
    }

    /// Sum of shares within one dimension, over available shares.
    pub fn dimension_total(&self, dimension: BandDimension) -> MetricValue {
        let mut total = None;
        for s in self.shares.iter().filter(|s| s.bucket.dimension() == dimension) {
            if let Some(v) = s.share_pct.value() {
                total = Some(total.unwrap_or_default() + v);
            }
        }
        total.into()
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Population shares across geographies for one vintage request.
pub fn population_shares(
    geographies: &[GeographyDemographics],
    request: VintageRequest,
    warnings: &mut Vec<String>,
) -> PopulationShareSet {
    let mut bucket_pop: BTreeMap<Band, u64> = BTreeMap::new();
    let mut bucket_vintage_pop: BTreeMap<Band, BTreeMap<Vintage, u64>> = BTreeMap::new();
    let mut dimension_pop: BTreeMap<BandDimension, u64> = BTreeMap::new();
    let mut vintages_used = Vec::new();
    let mut skipped = Vec::new();

    for geo in geographies {
        let Some(data) = geo.resolve(request) else {
            push_warning(
                warnings,
                format!("Geography {} has no census data for {:?}; left out", geo.geoid, request),
            );
            skipped.push(geo.geoid.clone());
            continue;
        };
        vintages_used.push(GeographyVintage {
            geoid: geo.geoid.clone(),
            vintage: data.vintage,
        });
        for b in data.buckets.iter().filter(|b| b.bucket.is_known()) {
            *bucket_pop.entry(b.bucket).or_insert(0) += b.population;
            *bucket_vintage_pop
                .entry(b.bucket)
                .or_default()
                .entry(data.vintage)
                .or_insert(0) += b.population;
            *dimension_pop.entry(b.bucket.dimension()).or_insert(0) += b.population;
        }
    }

    let mut distinct: Vec<Vintage> = vintages_used.iter().map(|g| g.vintage).collect();
    distinct.sort();
    distinct.dedup();
    let blended = distinct.len() > 1;
    if blended {
        let detail: Vec<String> = vintages_used
            .iter()
            .map(|g| format!("{}={}", g.geoid, g.vintage))
            .collect();
        push_warning(
            warnings,
            format!("Population shares blend census vintages: {}", detail.join(", ")),
        );
    }

    let shares = bucket_pop
        .iter()
        .map(|(&bucket, &population)| {
            let denominator = dimension_pop.get(&bucket.dimension()).copied().unwrap_or(0);
            let vintage = bucket_vintage_pop
                .get(&bucket)
                .and_then(|by_v| {
                    // Ties go to the more recent vintage.
                    by_v.iter()
                        .max_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(b.0)))
                        .map(|(v, _)| *v)
                })
                .unwrap_or(Vintage::Acs);
            PopulationShare {
                bucket,
                population,
                share_pct: MetricValue::percent_of(population, denominator),
                vintage,
            }
        })
        .collect();

    PopulationShareSet {
        request,
        shares,
        vintages_used,
        blended,
        skipped_geographies: skipped,
    }
}

/// One share set per requested vintage.
pub fn population_shares_by_vintage(
    geographies: &[GeographyDemographics],
    vintages: &[Vintage],
    warnings: &mut Vec<String>,
) -> Vec<PopulationShareSet> {
    vintages
        .iter()
        .map(|&v| population_shares(geographies, VintageRequest::Specific(v), warnings))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
