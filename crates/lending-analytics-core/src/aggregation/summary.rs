//! Year-by-year summary tables.
//!
//! Rows are fixed metrics, columns are years, and each row ends with the
//! change from the first year to the last. Cost-type rows go through the
//! exemption-aware aggregator. LMI rows reuse the income distributions but
//! leave reconciliation warnings to the report-level tables, so they are not
//! repeated for every year and segment.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classification::income::{borrower_income_distribution, tract_income_distribution};
use crate::classification::ClassifiedRecord;
use crate::records::{AggregateLoanRecord, AverageField};
use crate::types::{checked_sum, push_warning, LoanPurpose, MetricValue};

use super::weighted::{summarize, ExemptionPolicy, NoExemption, WeightedMetric};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Rows of a summary table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMetric {
    TotalLoans,
    TotalAmount,
    AverageLoanAmount,
    MedianInterestRate,
    MeanTotalLoanCosts,
    MeanOriginationCharges,
    MedianPropertyValue,
    LmiBorrowerPct,
    LmiTractPct,
    MmctPct,
}

impl SummaryMetric {
    pub const ALL: [SummaryMetric; 10] = [
        SummaryMetric::TotalLoans,
        SummaryMetric::TotalAmount,
        SummaryMetric::AverageLoanAmount,
        SummaryMetric::MedianInterestRate,
        SummaryMetric::MeanTotalLoanCosts,
        SummaryMetric::MeanOriginationCharges,
        SummaryMetric::MedianPropertyValue,
        SummaryMetric::LmiBorrowerPct,
        SummaryMetric::LmiTractPct,
        SummaryMetric::MmctPct,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SummaryMetric::TotalLoans => "Total Loans",
            SummaryMetric::TotalAmount => "Total Amount ($)",
            SummaryMetric::AverageLoanAmount => "Average Loan Amount ($)",
            SummaryMetric::MedianInterestRate => "Median Interest Rate (%)",
            SummaryMetric::MeanTotalLoanCosts => "Mean Total Loan Costs ($)",
            SummaryMetric::MeanOriginationCharges => "Mean Origination Charges ($)",
            SummaryMetric::MedianPropertyValue => "Median Property Value ($)",
            SummaryMetric::LmiBorrowerPct => "LMI Borrowers (%)",
            SummaryMetric::LmiTractPct => "LMI Tracts (%)",
            SummaryMetric::MmctPct => "Majority-Minority Tracts (%)",
        }
    }

    fn average_field(&self) -> Option<AverageField> {
        match self {
            SummaryMetric::AverageLoanAmount => Some(AverageField::LoanAmount),
            SummaryMetric::MedianInterestRate => Some(AverageField::InterestRate),
            SummaryMetric::MeanTotalLoanCosts => Some(AverageField::TotalLoanCosts),
            SummaryMetric::MeanOriginationCharges => Some(AverageField::OriginationCharges),
            SummaryMetric::MedianPropertyValue => Some(AverageField::PropertyValue),
            _ => None,
        }
    }
}

/// One cell of a summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearValue {
    pub year: i32,
    pub value: MetricValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub metric: SummaryMetric,
    pub label: String,
    pub values: Vec<YearValue>,
    /// Last year minus first year.
    pub change: MetricValue,
}

impl SummaryRow {
    pub fn value_for(&self, year: i32) -> MetricValue {
        self.values
            .iter()
            .find(|v| v.year == year)
            .map(|v| v.value)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    /// `None` when all segments are pooled.
    pub segment: Option<LoanPurpose>,
    pub years: Vec<i32>,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn row(&self, metric: SummaryMetric) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.metric == metric)
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Loan-weighted metrics for one per-loan average field.
pub fn metrics_for_field<'a>(
    records: impl IntoIterator<Item = &'a AggregateLoanRecord>,
    field: AverageField,
) -> Vec<WeightedMetric> {
    records
        .into_iter()
        .filter_map(|r| {
            field.get(&r.averages).map(|v| {
                WeightedMetric::for_entity(v, Decimal::from(r.total_loans), r.lender_id.clone())
            })
        })
        .collect()
}

fn change_over_time(values: &[YearValue]) -> MetricValue {
    match (values.first(), values.last()) {
        (Some(first), Some(last)) if values.len() > 1 => last.value.minus(first.value),
        _ => MetricValue::NotAvailable,
    }
}

fn year_value(
    metric: SummaryMetric,
    rows: &[ClassifiedRecord<'_>],
    exemption: &ExemptionPolicy,
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> MetricValue {
    let records = || rows.iter().map(|c| c.record);
    match metric {
        SummaryMetric::TotalLoans => records()
            .try_fold(0u64, |acc, r| acc.checked_add(r.total_loans))
            .map(Decimal::from)
            .into(),
        SummaryMetric::TotalAmount => records()
            .map(|r| r.total_amount)
            .collect::<Option<Vec<Decimal>>>()
            .and_then(checked_sum)
            .into(),
        SummaryMetric::AverageLoanAmount
        | SummaryMetric::MedianInterestRate
        | SummaryMetric::MeanTotalLoanCosts
        | SummaryMetric::MeanOriginationCharges
        | SummaryMetric::MedianPropertyValue => {
            let field = match metric.average_field() {
                Some(f) => f,
                None => return MetricValue::NotAvailable,
            };
            let metrics = metrics_for_field(records(), field);
            let summary = if field.is_exemptible() {
                summarize(&metrics, exemption)
            } else {
                summarize(&metrics, &NoExemption)
            };
            if summary.overflowed {
                push_warning(
                    warnings,
                    format!("{}: values exceed the decimal range; shown as N/A", metric.label()),
                );
            }
            match metric {
                SummaryMetric::MedianInterestRate | SummaryMetric::MedianPropertyValue => summary.median,
                _ => summary.mean,
            }
        }
        SummaryMetric::LmiBorrowerPct => {
            borrower_income_distribution(records(), tolerance, &mut Vec::new())
                .map(|d| d.lmi.share_pct)
                .unwrap_or_default()
        }
        SummaryMetric::LmiTractPct => {
            tract_income_distribution(rows, tolerance, &mut Vec::new()).lmi.share_pct
        }
        SummaryMetric::MmctPct => {
            let (mmct, known) = rows.iter().fold((0u64, 0u64), |(m, k), c| match c.majority_minority {
                Some(true) => (m + c.record.total_loans, k + c.record.total_loans),
                Some(false) => (m, k + c.record.total_loans),
                None => (m, k),
            });
            MetricValue::percent_of(mmct, known)
        }
    }
}

/// Build the summary table for one segment (`None` pools every segment).
///
/// `exemption` applies to cost-type rows only. Returns `None`, with a
/// warning, when no record falls in the segment.
pub fn build_summary_table(
    classified: &[ClassifiedRecord<'_>],
    segment: Option<LoanPurpose>,
    exemption: &ExemptionPolicy,
    tolerance: u64,
    warnings: &mut Vec<String>,
) -> Option<SummaryTable> {
    let mut by_year: BTreeMap<i32, Vec<ClassifiedRecord<'_>>> = BTreeMap::new();
    for c in classified {
        if segment.map_or(true, |s| c.record.purpose == s) {
            by_year.entry(c.record.year).or_default().push(c.clone());
        }
    }
    if by_year.is_empty() {
        let name = segment.map_or_else(|| "all segments".to_string(), |s| s.to_string());
        push_warning(warnings, format!("No records for {name}; summary table unavailable"));
        return None;
    }

    let years: Vec<i32> = by_year.keys().copied().collect();
    let rows = SummaryMetric::ALL
        .iter()
        .map(|&metric| {
            let values: Vec<YearValue> = by_year
                .iter()
                .map(|(&year, rows)| YearValue {
                    year,
                    value: year_value(metric, rows, exemption, tolerance, warnings),
                })
                .collect();
            if values.iter().all(|v| !v.value.is_available()) {
                push_warning(
                    warnings,
                    format!("{}: no source data in any year; row shows N/A", metric.label()),
                );
            }
            SummaryRow {
                metric,
                label: metric.label().to_string(),
                change: change_over_time(&values),
                values,
            }
        })
        .collect();

    Some(SummaryTable {
        segment,
        years,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
