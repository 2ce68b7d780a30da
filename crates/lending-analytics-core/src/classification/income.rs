//! Income bracket classification and LMI reconciliation.
//!
//! Covers:
//! 1. **Banding** -- ratio to AMFI mapped to Low / Moderate / Middle / Upper.
//! 2. **Tract distribution (LMICT)** -- loans counted by the income band of their tract.
//! 3. **Borrower distribution (LMIB)** -- loans counted by the borrower's own income band.
//! 4. **Reconciliation** -- Low-to-Moderate is always Low + Moderate; upstream
//!    totals are only compared against it.

use serde::{Deserialize, Serialize};

use crate::config::IncomeThresholds;
use crate::records::AggregateLoanRecord;
use crate::types::{push_warning, IncomeBand, MetricValue, Percent};

use super::ClassifiedRecord;

// ---------------------------------------------------------------------------
// Banding
// ---------------------------------------------------------------------------

/// Map a ratio to AMFI onto its band. Missing ratios are `Unknown`.
pub fn classify_income_ratio(ratio: Option<Percent>, thresholds: &IncomeThresholds) -> IncomeBand {
    match ratio {
        None => IncomeBand::Unknown,
        Some(r) if r <= thresholds.low_max => IncomeBand::Low,
        Some(r) if r <= thresholds.moderate_max => IncomeBand::Moderate,
        Some(r) if r <= thresholds.middle_max => IncomeBand::Middle,
        Some(_) => IncomeBand::Upper,
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Outcome of comparing an upstream LMI total with Low + Moderate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmiReconciliation {
    /// The figure used everywhere downstream.
    pub recomputed: u64,
    pub upstream: Option<u64>,
    /// upstream - recomputed
    pub discrepancy: Option<i64>,
    pub mismatch: bool,
}

/// One row of an income distribution table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeBandRow {
    pub label: String,
    pub count: u64,
    pub share_pct: MetricValue,
}

/// Loans distributed over the four income bands plus the derived LMI row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeDistribution {
    /// Low, Moderate, Middle, Upper in that order.
    pub rows: Vec<IncomeBandRow>,
    /// Low + Moderate, built from `rows[0]` and `rows[1]`.
    pub lmi: IncomeBandRow,
    /// Loans whose band could not be determined; excluded from shares.
    pub unknown: u64,
    pub classified_total: u64,
    pub reconciliation: LmiReconciliation,
}

impl IncomeDistribution {
    /// Build the table from per-band counts in `IncomeBand::KNOWN` order.
    pub fn from_counts(
        lmi_label: &str,
        counts: [u64; 4],
        unknown: u64,
        upstream_lmi: Option<u64>,
        tolerance: u64,
        warnings: &mut Vec<String>,
    ) -> Self {
        let classified_total: u64 = counts.iter().sum();
        let rows: Vec<IncomeBandRow> = IncomeBand::KNOWN
            .iter()
            .zip(counts.iter())
            .map(|(band, &count)| IncomeBandRow {
                label: band.label().to_string(),
                count,
                share_pct: MetricValue::percent_of(count, classified_total),
            })
            .collect();

        let reconciliation = reconcile_lmi(
            lmi_label,
            counts[0],
            counts[1],
            upstream_lmi,
            tolerance,
            warnings,
        );
        let lmi = IncomeBandRow {
            label: lmi_label.to_string(),
            count: rows[0].count + rows[1].count,
            share_pct: match (rows[0].share_pct, rows[1].share_pct) {
                (MetricValue::Value(a), MetricValue::Value(b)) => MetricValue::Value(a + b),
                _ => MetricValue::NotAvailable,
            },
        };

        Self {
            rows,
            lmi,
            unknown,
            classified_total,
            reconciliation,
        }
    }

    pub fn count(&self, band: IncomeBand) -> Option<u64> {
        IncomeBand::KNOWN
            .iter()
            .position(|b| *b == band)
            .map(|i| self.rows[i].count)
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// Recompute LMI as `low + moderate` and compare it with an upstream total.
///
/// The recomputed figure always wins; a gap larger than `tolerance` is only
/// reported.
pub fn reconcile_lmi(
    label: &str,
    low: u64,
    moderate: u64,
    upstream: Option<u64>,
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> LmiReconciliation {
    let recomputed = low + moderate;
    let discrepancy = upstream.map(|u| u as i64 - recomputed as i64);
    let mismatch = discrepancy.is_some_and(|d| d.unsigned_abs() > tolerance);
    if mismatch {
        push_warning(
            warnings,
            format!(
                "{label}: upstream total {} differs from Low + Moderate ({recomputed}); using recomputed value",
                upstream.unwrap_or_default()
            ),
        );
    }
    LmiReconciliation {
        recomputed,
        upstream,
        discrepancy,
        mismatch,
    }
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

/// Sum an optional upstream column; `None` unless every record carries it.
fn upstream_total<'a>(
    records: impl Iterator<Item = &'a AggregateLoanRecord>,
    field: impl Fn(&AggregateLoanRecord) -> Option<u64>,
) -> Option<u64> {
    let mut total = 0u64;
    for r in records {
        total += field(r)?;
    }
    Some(total)
}

/// Loans by the income band of the tract they were made in (LMICT).
pub fn tract_income_distribution(
    classified: &[ClassifiedRecord<'_>],
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> IncomeDistribution {
    let mut counts = [0u64; 4];
    let mut unknown = 0u64;
    for c in classified {
        match IncomeBand::KNOWN.iter().position(|b| *b == c.income_band) {
            Some(i) => counts[i] += c.record.total_loans,
            None => unknown += c.record.total_loans,
        }
    }
    let upstream = upstream_total(classified.iter().map(|c| c.record), |r| r.upstream_lmict);
    IncomeDistribution::from_counts(
        "LMI Tracts (LMICT)",
        counts,
        unknown,
        upstream,
        tolerance,
        warnings,
    )
}

/// Loans by borrower income band (LMIB).
///
/// Records missing any of the four band counts are left out and reported;
/// `None` when no record carries the full set.
pub fn borrower_income_distribution<'a>(
    records: impl IntoIterator<Item = &'a AggregateLoanRecord>,
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> Option<IncomeDistribution> {
    let mut counts = [0u64; 4];
    let mut unknown = 0u64;
    let mut used: Vec<&'a AggregateLoanRecord> = Vec::new();
    let mut skipped = 0usize;

    for r in records {
        let b = &r.borrower_income;
        match (b.low, b.moderate, b.middle, b.upper) {
            (Some(low), Some(moderate), Some(middle), Some(upper)) => {
                counts[0] += low;
                counts[1] += moderate;
                counts[2] += middle;
                counts[3] += upper;
                unknown += b.unknown.unwrap_or(0);
                used.push(r);
            }
            _ => skipped += 1,
        }
    }

    if used.is_empty() {
        push_warning(
            warnings,
            "Borrower income counts absent from every record; LMIB table unavailable".into(),
        );
        return None;
    }
    if skipped > 0 {
        push_warning(
            warnings,
            format!("{skipped} record(s) lack borrower income counts and were left out of LMIB"),
        );
    }

    let upstream = upstream_total(used.iter().copied(), |r| r.upstream_lmib);
    Some(IncomeDistribution::from_counts(
        "LMI Borrowers (LMIB)",
        counts,
        unknown,
        upstream,
        tolerance,
        warnings,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
