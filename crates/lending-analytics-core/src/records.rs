//! Aggregate loan records supplied by the upstream query engine.
//!
//! One record per (lender, year, geography, tract, loan-purpose segment).
//! Records are read-only here. Every field a query may omit is an `Option`,
//! so "the column was not returned" is never confused with a true zero.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::LendingAnalyticsError;
use crate::types::{LoanPurpose, Money, Percent};
use crate::LendingAnalyticsResult;

/// Loan counts by applicant race/ethnicity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceCounts {
    pub hispanic: Option<u64>,
    pub black: Option<u64>,
    pub asian: Option<u64>,
    pub white: Option<u64>,
    pub native_american: Option<u64>,
    pub pacific_islander: Option<u64>,
    pub multi_racial: Option<u64>,
    pub not_reported: Option<u64>,
}

/// Race/ethnicity categories reported on comparison tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceCategory {
    Hispanic,
    Black,
    Asian,
    NativeAmerican,
    PacificIslander,
    MultiRacial,
    White,
}

impl RaceCategory {
    pub fn count(&self, race: &RaceCounts) -> Option<u64> {
        match self {
            RaceCategory::Hispanic => race.hispanic,
            RaceCategory::Black => race.black,
            RaceCategory::Asian => race.asian,
            RaceCategory::NativeAmerican => race.native_american,
            RaceCategory::PacificIslander => race.pacific_islander,
            RaceCategory::MultiRacial => race.multi_racial,
            RaceCategory::White => race.white,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RaceCategory::Hispanic => "Hispanic",
            RaceCategory::Black => "Black",
            RaceCategory::Asian => "Asian",
            RaceCategory::NativeAmerican => "Native American",
            RaceCategory::PacificIslander => "Pacific Islander",
            RaceCategory::MultiRacial => "Multi-Racial",
            RaceCategory::White => "White",
        }
    }
}

/// Loan counts by borrower income relative to AMFI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BorrowerIncomeCounts {
    pub low: Option<u64>,
    pub moderate: Option<u64>,
    pub middle: Option<u64>,
    pub upper: Option<u64>,
    pub unknown: Option<u64>,
}

/// Loan-weighted averages of per-loan fields within a record.
///
/// Cost fields may legitimately be zero for lenders exempt from reporting
/// them; see [`crate::aggregation::weighted::ExemptionPolicy`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanAverages {
    pub loan_amount: Option<Money>,
    pub interest_rate: Option<Decimal>,
    pub total_loan_costs: Option<Money>,
    pub origination_charges: Option<Money>,
    pub property_value: Option<Money>,
}

/// A per-loan average field, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AverageField {
    LoanAmount,
    InterestRate,
    TotalLoanCosts,
    OriginationCharges,
    PropertyValue,
}

impl AverageField {
    pub fn get(&self, averages: &LoanAverages) -> Option<Decimal> {
        match self {
            AverageField::LoanAmount => averages.loan_amount,
            AverageField::InterestRate => averages.interest_rate,
            AverageField::TotalLoanCosts => averages.total_loan_costs,
            AverageField::OriginationCharges => averages.origination_charges,
            AverageField::PropertyValue => averages.property_value,
        }
    }

    /// Fields that exempt reporters fill with zero by convention.
    pub fn is_exemptible(&self) -> bool {
        matches!(
            self,
            AverageField::InterestRate
                | AverageField::TotalLoanCosts
                | AverageField::OriginationCharges
                | AverageField::PropertyValue
        )
    }
}

/// One pre-aggregated row from the warehouse query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateLoanRecord {
    pub lender_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lender_name: Option<String>,
    pub year: i32,
    /// County or CBSA code of the geography the row belongs to.
    pub geoid: String,
    /// 11-digit census tract identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tract: Option<String>,
    pub purpose: LoanPurpose,
    pub total_loans: u64,
    #[serde(default)]
    pub total_amount: Option<Money>,
    #[serde(default)]
    pub tract_minority_pct: Option<Percent>,
    /// Tract median family income as a percentage of AMFI.
    #[serde(default)]
    pub tract_income_ratio: Option<Percent>,
    #[serde(default)]
    pub race: RaceCounts,
    #[serde(default)]
    pub borrower_income: BorrowerIncomeCounts,
    /// Upstream LMI-borrower total; reconciled, never trusted.
    #[serde(default)]
    pub upstream_lmib: Option<u64>,
    /// Upstream LMI-tract total; reconciled, never trusted.
    #[serde(default)]
    pub upstream_lmict: Option<u64>,
    #[serde(default)]
    pub upstream_mmct: Option<u64>,
    #[serde(default)]
    pub averages: LoanAverages,
}

/// Census tract identifiers are 11 ASCII digits (state, county, tract).
pub fn is_valid_tract_id(tract: &str) -> bool {
    tract.len() == 11 && tract.bytes().all(|b| b.is_ascii_digit())
}

/// The only hard failure in the engine: nothing to report on.
pub fn ensure_records(records: &[AggregateLoanRecord]) -> LendingAnalyticsResult<()> {
    if records.is_empty() {
        return Err(LendingAnalyticsError::EmptyRecordSet);
    }
    Ok(())
}

/// Distinct years present, ascending.
pub fn years(records: &[AggregateLoanRecord]) -> BTreeSet<i32> {
    records.iter().map(|r| r.year).collect()
}

/// Distinct segments present.
pub fn segments(records: &[AggregateLoanRecord]) -> BTreeSet<LoanPurpose> {
    records.iter().map(|r| r.purpose).collect()
}

/// Total loans per lender across the given records.
pub fn lender_loan_totals(records: &[AggregateLoanRecord]) -> BTreeMap<String, u64> {
    let mut totals: BTreeMap<String, u64> = BTreeMap::new();
    for r in records {
        *totals.entry(r.lender_id.clone()).or_insert(0) += r.total_loans;
    }
    totals
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A bare record with every optional column absent.
    pub fn record(lender: &str, year: i32, tract: &str, total_loans: u64) -> AggregateLoanRecord {
        AggregateLoanRecord {
            lender_id: lender.into(),
            lender_name: None,
            year,
            geoid: tract.get(..5).unwrap_or("00000").into(),
            tract: Some(tract.into()),
            purpose: LoanPurpose::Purchase,
            total_loans,
            total_amount: None,
            tract_minority_pct: None,
            tract_income_ratio: None,
            race: RaceCounts::default(),
            borrower_income: BorrowerIncomeCounts::default(),
            upstream_lmib: None,
            upstream_lmict: None,
            upstream_mmct: None,
            averages: LoanAverages::default(),
        }
    }
}
