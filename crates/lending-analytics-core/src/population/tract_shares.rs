//! Population share of each minority quartile, built from tract populations.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::classification::minority::{flag_empty_bin, MinorityScope};
use crate::records::{is_valid_tract_id, AggregateLoanRecord};
use crate::types::{push_warning, MetricValue, MinorityBand, Percent};

/// Resolves an 11-digit tract identifier to its population.
pub trait TractPopulationLookup {
    fn population(&self, tract: &str) -> Option<u64>;
}

impl TractPopulationLookup for HashMap<String, u64> {
    fn population(&self, tract: &str) -> Option<u64> {
        self.get(tract).copied()
    }
}

impl TractPopulationLookup for BTreeMap<String, u64> {
    fn population(&self, tract: &str) -> Option<u64> {
        self.get(tract).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartileShare {
    pub band: MinorityBand,
    pub label: String,
    pub tract_count: u64,
    /// Population, or tract count when the result is approximate.
    pub weight: u64,
    pub share_pct: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartilePopulationShares {
    pub rows: Vec<QuartileShare>,
    pub mmct_share_pct: MetricValue,
    /// At least one tract had no population, so every tract counts as 1.
    pub approximate: bool,
    pub unresolved_tracts: Vec<String>,
}

/// Share of population (or of tracts) in each minority quartile of `scope`.
///
/// One unresolved tract switches the whole computation to unweighted tract
/// counts. `None` when no record carries both a tract and a minority share.
pub fn quartile_population_shares(
    records: &[AggregateLoanRecord],
    scope: &MinorityScope,
    lookup: &impl TractPopulationLookup,
    warnings: &mut Vec<String>,
) -> Option<QuartilePopulationShares> {
    let mut tracts: BTreeMap<&str, Percent> = BTreeMap::new();
    for r in records {
        if let (Some(tract), Some(pct)) = (r.tract.as_deref(), r.tract_minority_pct) {
            tracts.entry(tract).or_insert(pct);
        }
    }
    if tracts.is_empty() {
        push_warning(
            warnings,
            "No tracts with a minority share in scope; quartile population shares unavailable"
                .into(),
        );
        return None;
    }

    let resolved: Vec<(&str, Percent, Option<u64>)> = tracts
        .iter()
        .map(|(&tract, &pct)| {
            let population = if is_valid_tract_id(tract) {
                lookup.population(tract)
            } else {
                None
            };
            (tract, pct, population)
        })
        .collect();

    let unresolved_tracts: Vec<String> = resolved
        .iter()
        .filter(|(_, _, p)| p.is_none())
        .map(|(t, _, _)| t.to_string())
        .collect();
    let approximate = !unresolved_tracts.is_empty();
    if approximate {
        push_warning(
            warnings,
            format!(
                "{} of {} tract(s) have no population; quartile shares use unweighted tract counts",
                unresolved_tracts.len(),
                resolved.len()
            ),
        );
    }

    let mut weights = [0u64; 4];
    let mut tract_counts = [0u64; 4];
    let mut mmct_weight = 0u64;
    let mut total = 0u64;
    for &(_, pct, population) in &resolved {
        let weight = if approximate { 1 } else { population.unwrap_or(0) };
        if let Some(i) = MinorityBand::KNOWN
            .iter()
            .position(|b| *b == scope.classify(Some(pct)))
        {
            weights[i] += weight;
            tract_counts[i] += 1;
        }
        if scope.majority_minority(Some(pct)) == Some(true) {
            mmct_weight += weight;
        }
        total += weight;
    }

    let rows = MinorityBand::KNOWN
        .iter()
        .enumerate()
        .map(|(i, &band)| QuartileShare {
            band,
            label: flag_empty_bin(scope.thresholds().label(band), tract_counts[i]),
            tract_count: tract_counts[i],
            weight: weights[i],
            share_pct: MetricValue::percent_of(weights[i], total),
        })
        .collect();

    Some(QuartilePopulationShares {
        rows,
        mmct_share_pct: MetricValue::percent_of(mmct_weight, total),
        approximate,
        unresolved_tracts,
    })
}
