//! Herfindahl-Hirschman Index of lender market share.
//!
//! `HHI = sum(share_i^2)` with `share_i` on a 0-100 scale, so a monopoly
//! scores 10,000 and N equal lenders score 10,000 / N.
//!
//! Evaluated as `sum(volume_i^2) * 10,000 / total^2` with a single division,
//! so rounded shares never feed the index. Displayed shares are derived
//! separately. All arithmetic uses `rust_decimal::Decimal`. No `f64`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{EngineConfig, HhiThresholds};
use crate::error::LendingAnalyticsError;
use crate::records::AggregateLoanRecord;
use crate::types::{checked_sum, push_warning, LoanPurpose, Money, Percent};
use crate::LendingAnalyticsResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// One lender's volume in a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityVolume {
    pub entity_id: String,
    pub volume: Decimal,
}

impl EntityVolume {
    pub fn new(entity_id: impl Into<String>, volume: Decimal) -> Self {
        Self {
            entity_id: entity_id.into(),
            volume,
        }
    }
}

/// What counts as a lender's size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMeasure {
    #[default]
    LoanCount,
    LoanAmount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationLevel {
    Low,
    Moderate,
    High,
}

impl ConcentrationLevel {
    /// `< moderate_min` Low, up to and including `high_above` Moderate, above it High.
    pub fn from_hhi(hhi: Decimal, thresholds: &HhiThresholds) -> Self {
        if hhi < thresholds.moderate_min {
            ConcentrationLevel::Low
        } else if hhi <= thresholds.high_above {
            ConcentrationLevel::Moderate
        } else {
            ConcentrationLevel::High
        }
    }
}

impl fmt::Display for ConcentrationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConcentrationLevel::Low => "Unconcentrated",
            ConcentrationLevel::Moderate => "Moderately Concentrated",
            ConcentrationLevel::High => "Highly Concentrated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketShare {
    pub entity_id: String,
    pub volume: Decimal,
    pub share_pct: Percent,
}

/// HHI of one market, with shares sorted largest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HhiResult {
    pub year: Option<i32>,
    pub segment: Option<LoanPurpose>,
    pub hhi: Decimal,
    pub concentration_level: ConcentrationLevel,
    pub total_volume: Decimal,
    pub entity_count: usize,
    pub shares: Vec<MarketShare>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Compute HHI over entity volumes.
///
/// Volumes are summed per entity first; entities whose total is zero or
/// negative take no part.
pub fn calculate_hhi(
    volumes: &[EntityVolume],
    thresholds: &HhiThresholds,
) -> LendingAnalyticsResult<HhiResult> {
    let mut totals: BTreeMap<&str, Decimal> = BTreeMap::new();
    for v in volumes {
        let total = totals.entry(v.entity_id.as_str()).or_insert(Decimal::ZERO);
        *total = total.checked_add(v.volume).ok_or_else(volume_overflow)?;
    }
    totals.retain(|_, total| *total > Decimal::ZERO);

    let total_volume = checked_sum(totals.values().copied()).ok_or_else(volume_overflow)?;
    if total_volume <= Decimal::ZERO {
        return Err(LendingAnalyticsError::InsufficientData(
            "No entity with positive volume for HHI".into(),
        ));
    }

    let sum_of_squares = totals
        .values()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v.checked_mul(*v)?))
        .ok_or_else(volume_overflow)?;
    let hhi = sum_of_squares
        .checked_mul(dec!(10000))
        .and_then(|n| n.checked_div(total_volume.checked_mul(total_volume)?))
        .ok_or_else(volume_overflow)?;

    let mut shares: Vec<MarketShare> = totals
        .iter()
        .map(|(&id, &volume)| MarketShare {
            entity_id: id.to_string(),
            volume,
            share_pct: volume / total_volume * dec!(100),
        })
        .collect();

    shares.sort_by(|a, b| {
        b.share_pct
            .cmp(&a.share_pct)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });

    Ok(HhiResult {
        year: None,
        segment: None,
        hhi,
        concentration_level: ConcentrationLevel::from_hhi(hhi, thresholds),
        total_volume,
        entity_count: shares.len(),
        shares,
    })
}

fn volume_overflow() -> LendingAnalyticsError {
    LendingAnalyticsError::InvalidInput {
        field: "volume".into(),
        reason: "Volumes exceed the decimal range".into(),
    }
}

/// Volume of one record under `measure`.
fn record_volume(record: &AggregateLoanRecord, measure: VolumeMeasure) -> Option<Money> {
    match measure {
        VolumeMeasure::LoanCount => Some(Decimal::from(record.total_loans)),
        VolumeMeasure::LoanAmount => record.total_amount,
    }
}

/// HHI for every (year, segment) partition present in `records`.
///
/// Partitions are computed independently; one without positive volume is
/// skipped with a warning.
pub fn hhi_by_year_segment(
    records: &[AggregateLoanRecord],
    measure: VolumeMeasure,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> Vec<HhiResult> {
    let mut partitions: BTreeMap<(i32, LoanPurpose), Vec<EntityVolume>> = BTreeMap::new();
    let mut missing_amounts = 0usize;
    for r in records {
        let entry = partitions.entry((r.year, r.purpose)).or_default();
        match record_volume(r, measure) {
            Some(volume) => entry.push(EntityVolume::new(r.lender_id.clone(), volume)),
            None => missing_amounts += 1,
        }
    }
    if missing_amounts > 0 {
        push_warning(
            warnings,
            format!("{missing_amounts} record(s) without a loan amount left out of dollar-volume HHI"),
        );
    }

    let mut results = Vec::with_capacity(partitions.len());
    for ((year, segment), volumes) in partitions {
        match calculate_hhi(&volumes, &config.hhi_thresholds) {
            Ok(mut result) => {
                result.year = Some(year);
                result.segment = Some(segment);
                results.push(result);
            }
            Err(e) => push_warning(warnings, format!("HHI skipped for {year} {segment}: {e}")),
        }
    }
    results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::record;

    fn t() -> HhiThresholds {
        HhiThresholds::default()
    }

    #[test]
    fn test_hhi_four_equal_lenders() {
        let v: Vec<EntityVolume> = ["A", "B", "C", "D"]
            .iter()
            .map(|id| EntityVolume::new(*id, dec!(250)))
            .collect();
        let out = calculate_hhi(&v, &t()).unwrap();
        assert_eq!(out.hhi, dec!(2500));
        // Exactly at the upper threshold is still Moderate.
        assert_eq!(out.concentration_level, ConcentrationLevel::Moderate);
    }

    #[test]
    fn test_hhi_sixty_thirty_ten_is_high() {
        let v = vec![
            EntityVolume::new("A", dec!(60)),
            EntityVolume::new("B", dec!(30)),
            EntityVolume::new("C", dec!(10)),
        ];
        let out = calculate_hhi(&v, &t()).unwrap();
        assert_eq!(out.hhi, dec!(4600));
        assert_eq!(out.concentration_level, ConcentrationLevel::High);
        assert_eq!(out.shares[0].entity_id, "A");
    }

    #[test]
    fn test_monopoly() {
        let out = calculate_hhi(&[EntityVolume::new("A", dec!(5))], &t()).unwrap();
        assert_eq!(out.hhi, dec!(10000));
    }

    #[test]
    fn test_entity_volumes_are_grouped_and_nonpositive_discarded() {
        let v = vec![
            EntityVolume::new("A", dec!(30)),
            EntityVolume::new("A", dec!(30)),
            EntityVolume::new("B", dec!(40)),
            EntityVolume::new("C", dec!(0)),
            EntityVolume::new("D", dec!(-5)),
        ];
        let out = calculate_hhi(&v, &t()).unwrap();
        assert_eq!(out.entity_count, 2);
        assert_eq!(out.hhi, dec!(5200));
    }

    #[test]
    fn test_no_positive_volume_is_error() {
        let v = vec![EntityVolume::new("A", dec!(0))];
        assert!(matches!(
            calculate_hhi(&v, &t()),
            Err(LendingAnalyticsError::InsufficientData(_))
        ));
        assert!(calculate_hhi(&[], &t()).is_err());
    }

    #[test]
    fn test_overflowing_volumes_are_rejected() {
        let v = vec![
            EntityVolume::new("A", Decimal::MAX),
            EntityVolume::new("B", dec!(1)),
        ];
        assert!(matches!(
            calculate_hhi(&v, &t()),
            Err(LendingAnalyticsError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_overflowing_partition_is_skipped_with_warning() {
        let mut a = record("A", 2022, "36061000100", 1);
        a.total_amount = Some(Decimal::MAX);
        let mut b = record("B", 2022, "36061000100", 1);
        b.total_amount = Some(Decimal::MAX);
        let mut w = Vec::new();
        let out = hhi_by_year_segment(&[a, b], VolumeMeasure::LoanAmount, &EngineConfig::default(), &mut w);
        assert!(out.is_empty());
        assert!(w[0].contains("decimal range"));
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(ConcentrationLevel::from_hhi(dec!(1499.99), &t()), ConcentrationLevel::Low);
        assert_eq!(ConcentrationLevel::from_hhi(dec!(1500), &t()), ConcentrationLevel::Moderate);
        assert_eq!(ConcentrationLevel::from_hhi(dec!(2500.01), &t()), ConcentrationLevel::High);
    }

    #[test]
    fn test_partitions_are_independent() {
        let mut recs = vec![
            record("A", 2021, "36061000100", 50),
            record("B", 2021, "36061000100", 50),
            record("A", 2022, "36061000100", 100),
            record("X", 2023, "36061000100", 0),
        ];
        recs[2].purpose = LoanPurpose::Refinance;
        let mut w = Vec::new();
        let out = hhi_by_year_segment(&recs, VolumeMeasure::LoanCount, &EngineConfig::default(), &mut w);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].year, Some(2021));
        assert_eq!(out[0].hhi, dec!(5000));
        assert_eq!(out[1].segment, Some(LoanPurpose::Refinance));
        assert_eq!(out[1].hhi, dec!(10000));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn test_dollar_volume_skips_missing_amounts() {
        let mut a = record("A", 2022, "36061000100", 1);
        a.total_amount = Some(dec!(300000));
        let b = record("B", 2022, "36061000100", 1);
        let mut w = Vec::new();
        let out = hhi_by_year_segment(&[a, b], VolumeMeasure::LoanAmount, &EngineConfig::default(), &mut w);
        assert_eq!(out[0].hhi, dec!(10000));
        assert!(w[0].contains("without a loan amount"));
    }
}
