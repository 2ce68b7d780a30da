//! Minority-population quartiles for a report scope.
//!
//! Cut points come from the distinct tracts in scope, each tract counted
//! once regardless of how many loans it holds. Percentiles use linear
//! interpolation between order statistics:
//!
//! `h = (n - 1) * p`, `q = x[floor(h)] + (h - floor(h)) * (x[floor(h) + 1] - x[floor(h)])`
//!
//! Majority-minority status is a fixed absolute threshold, independent of the
//! quartiles.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::LendingAnalyticsError;
use crate::records::AggregateLoanRecord;
use crate::types::{push_warning, MetricValue, MinorityBand, Percent};
use crate::LendingAnalyticsResult;

use super::ClassifiedRecord;

// ---------------------------------------------------------------------------
// Percentiles
// ---------------------------------------------------------------------------

/// Linear-interpolation percentile of an ascending slice; `p` in [0, 1].
pub fn percentile_linear(sorted: &[Decimal], p: Decimal) -> Option<Decimal> {
    if sorted.is_empty() || p < Decimal::ZERO || p > Decimal::ONE {
        return None;
    }
    let h = Decimal::from(sorted.len() as u64 - 1) * p;
    let lo = h.floor();
    let frac = h - lo;
    let i = lo.to_usize()?;
    let lower = sorted[i];
    match sorted.get(i + 1) {
        Some(&upper) => Some(lower + frac * (upper - lower)),
        None => Some(lower),
    }
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Quartile cut points over the distinct tracts of one report scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuartileThresholds {
    pub q25: Percent,
    pub q50: Percent,
    pub q75: Percent,
    pub min: Percent,
    pub max: Percent,
    pub tract_count: usize,
}

impl QuartileThresholds {
    /// Compute cut points from `(tract_id, minority_pct)` pairs.
    ///
    /// Repeated tracts count once; a tract seen with two different
    /// percentages keeps the first.
    pub fn from_tracts<'a>(
        tracts: impl IntoIterator<Item = (&'a str, Percent)>,
        warnings: &mut Vec<String>,
    ) -> LendingAnalyticsResult<Self> {
        let mut unique: BTreeMap<&str, Percent> = BTreeMap::new();
        for (tract, pct) in tracts {
            match unique.get(tract) {
                Some(&existing) if existing != pct => push_warning(
                    warnings,
                    format!(
                        "Tract {tract} reported with minority shares {existing} and {pct}; keeping {existing}"
                    ),
                ),
                Some(_) => {}
                None => {
                    unique.insert(tract, pct);
                }
            }
        }

        if unique.is_empty() {
            return Err(LendingAnalyticsError::InsufficientData(
                "No tracts with a known minority percentage in scope".into(),
            ));
        }

        let mut values: Vec<Decimal> = unique.into_values().collect();
        values.sort();
        if values.len() < 4 {
            push_warning(
                warnings,
                format!(
                    "Only {} distinct tract(s) in scope; minority quartiles may collapse",
                    values.len()
                ),
            );
        }

        // Non-empty, so every percentile exists.
        let q = |p: Decimal| percentile_linear(&values, p).unwrap_or(Decimal::ZERO);
        Ok(Self {
            q25: q(dec!(0.25)),
            q50: q(dec!(0.50)),
            q75: q(dec!(0.75)),
            min: values[0],
            max: values[values.len() - 1],
            tract_count: values.len(),
        })
    }

    /// Compute cut points from the tracts referenced by a record collection.
    pub fn from_records(
        records: &[AggregateLoanRecord],
        warnings: &mut Vec<String>,
    ) -> LendingAnalyticsResult<Self> {
        Self::from_tracts(
            records
                .iter()
                .filter_map(|r| Some((r.tract.as_deref()?, r.tract_minority_pct?))),
            warnings,
        )
    }

    /// `<= q25` Low, `<= q50` Moderate, `<= q75` Middle, otherwise High.
    pub fn classify(&self, pct: Option<Percent>) -> MinorityBand {
        match pct {
            None => MinorityBand::Unknown,
            Some(p) if p <= self.q25 => MinorityBand::Low,
            Some(p) if p <= self.q50 => MinorityBand::Moderate,
            Some(p) if p <= self.q75 => MinorityBand::Middle,
            Some(_) => MinorityBand::High,
        }
    }

    /// The minority-percentage range a band spans in this scope.
    pub fn range(&self, band: MinorityBand) -> Option<(Percent, Percent)> {
        match band {
            MinorityBand::Low => Some((self.min, self.q25)),
            MinorityBand::Moderate => Some((self.q25, self.q50)),
            MinorityBand::Middle => Some((self.q50, self.q75)),
            MinorityBand::High => Some((self.q75, self.max)),
            MinorityBand::Unknown => None,
        }
    }

    /// Display label, e.g. `Low Minority (0.0-22.3%)`.
    pub fn label(&self, band: MinorityBand) -> String {
        match self.range(band) {
            Some((lo, hi)) => format!("{} ({:.1}-{:.1}%)", band.label(), lo, hi),
            None => band.label().to_string(),
        }
    }
}

/// Append an asterisk to the label of a bin with no raw count.
pub fn flag_empty_bin(label: String, raw_count: u64) -> String {
    if raw_count == 0 {
        format!("{label}*")
    } else {
        label
    }
}

/// `Some(true)` at or above the threshold, `None` when the share is unknown.
pub fn is_majority_minority(pct: Option<Percent>, threshold: Percent) -> Option<bool> {
    pct.map(|p| p >= threshold)
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Minority classification context for a single report.
///
/// Built once per report scope; every table in the report classifies through
/// the same instance so bucket boundaries stay consistent.
#[derive(Debug, Clone, Serialize)]
pub struct MinorityScope {
    thresholds: QuartileThresholds,
    majority_minority_threshold: Percent,
}

impl MinorityScope {
    pub fn new(thresholds: QuartileThresholds, majority_minority_threshold: Percent) -> Self {
        Self {
            thresholds,
            majority_minority_threshold,
        }
    }

    pub fn build(
        records: &[AggregateLoanRecord],
        config: &EngineConfig,
        warnings: &mut Vec<String>,
    ) -> LendingAnalyticsResult<Self> {
        let thresholds = QuartileThresholds::from_records(records, warnings)?;
        tracing::debug!(
            q25 = %thresholds.q25,
            q50 = %thresholds.q50,
            q75 = %thresholds.q75,
            tracts = thresholds.tract_count,
            "minority quartiles computed"
        );
        Ok(Self::new(thresholds, config.majority_minority_threshold))
    }

    pub fn thresholds(&self) -> &QuartileThresholds {
        &self.thresholds
    }

    pub fn classify(&self, pct: Option<Percent>) -> MinorityBand {
        self.thresholds.classify(pct)
    }

    pub fn majority_minority(&self, pct: Option<Percent>) -> Option<bool> {
        is_majority_minority(pct, self.majority_minority_threshold)
    }
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

/// One quartile row of a minority distribution table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorityBandRow {
    pub band: MinorityBand,
    /// Range label, asterisked when the bin is empty.
    pub label: String,
    pub count: u64,
    pub share_pct: MetricValue,
}

/// Loans by tract minority quartile, with majority-minority side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinorityDistribution {
    pub rows: Vec<MinorityBandRow>,
    pub unknown: u64,
    pub classified_total: u64,
    pub mmct_count: u64,
    pub mmct_share_pct: MetricValue,
    pub thresholds: QuartileThresholds,
}

/// Tally classified records (loan-weighted) into a minority distribution.
pub fn minority_distribution(
    classified: &[ClassifiedRecord<'_>],
    scope: &MinorityScope,
) -> MinorityDistribution {
    let mut counts = [0u64; 4];
    let mut unknown = 0u64;
    let mut mmct_count = 0u64;
    let mut mmct_known = 0u64;

    for c in classified {
        let loans = c.record.total_loans;
        match MinorityBand::KNOWN.iter().position(|b| *b == c.minority_band) {
            Some(i) => counts[i] += loans,
            None => unknown += loans,
        }
        if let Some(is_mmct) = c.majority_minority {
            mmct_known += loans;
            if is_mmct {
                mmct_count += loans;
            }
        }
    }

    let classified_total: u64 = counts.iter().sum();
    let rows = MinorityBand::KNOWN
        .iter()
        .zip(counts.iter())
        .map(|(&band, &count)| MinorityBandRow {
            band,
            label: flag_empty_bin(scope.thresholds().label(band), count),
            count,
            share_pct: MetricValue::percent_of(count, classified_total),
        })
        .collect();

    MinorityDistribution {
        rows,
        unknown,
        classified_total,
        mmct_count,
        mmct_share_pct: MetricValue::percent_of(mmct_count, mmct_known),
        thresholds: scope.thresholds().clone(),
    }
}

/// Compare the sum of upstream majority-minority counts with the recomputed
/// figure. `None` unless every record carries the upstream column.
pub fn reconcile_mmct(
    classified: &[ClassifiedRecord<'_>],
    recomputed: u64,
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> Option<i64> {
    let upstream: u64 = classified
        .iter()
        .map(|c| c.record.upstream_mmct)
        .sum::<Option<u64>>()?;
    let discrepancy = upstream as i64 - recomputed as i64;
    if discrepancy.unsigned_abs() > tolerance {
        push_warning(
            warnings,
            format!(
                "MMCT: upstream total {upstream} differs from recomputed {recomputed}; using recomputed value"
            ),
        );
    }
    Some(discrepancy)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
