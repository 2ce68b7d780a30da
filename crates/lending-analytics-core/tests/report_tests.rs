#![cfg(feature = "report")]

use lending_analytics_core::aggregation::summary::SummaryMetric;
use lending_analytics_core::population::shares::{
    BucketPopulation, GeographyDemographics, Vintage, VintageData, VintageRequest,
};
use lending_analytics_core::report::{build_area_report, ReportInput};
use lending_analytics_core::{
    AggregateLoanRecord, Band, BandDimension, IncomeBand, LendingAnalyticsError, LoanPurpose,
    MetricValue, MinorityBand,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::HashMap;

// ===========================================================================
// Fixtures
// ===========================================================================

fn area_records() -> Vec<AggregateLoanRecord> {
    let minority = [10, 20, 30, 40, 50, 60, 70, 80];
    let income = [40, 60, 85, 100, 115, 130, 75, 45];
    let mut rows = Vec::new();
    for year in [2021, 2022] {
        for (i, (m, r)) in minority.iter().zip(income.iter()).enumerate() {
            let lender = if i % 2 == 0 { "BANK" } else { "CU" };
            rows.push(json!({
                "lender_id": lender,
                "year": year,
                "geoid": "36061",
                "tract": format!("360610{:05}", i + 1),
                "purpose": if i < 6 { "purchase" } else { "refinance" },
                "total_loans": 10 + i as u64 + (year - 2021) as u64 * 5,
                "total_amount": format!("{}", (10 + i) * 250_000),
                "tract_minority_pct": m.to_string(),
                "tract_income_ratio": r.to_string(),
                "race": { "hispanic": 2 + i as u64, "black": 1, "white": 5 },
                "borrower_income": { "low": 1, "moderate": 2, "middle": 3, "upper": 4 },
                "upstream_lmib": 3,
                "averages": {
                    "loan_amount": "250000",
                    "interest_rate": format!("6.{i}"),
                    "total_loan_costs": if lender == "CU" { "0" } else { "4500" }
                }
            }));
        }
    }
    serde_json::from_value(serde_json::Value::Array(rows)).unwrap()
}

fn benchmarks() -> Vec<GeographyDemographics> {
    let bucket = |band: Band, population: u64| BucketPopulation {
        bucket: band,
        population,
    };
    vec![GeographyDemographics {
        geoid: "36061".into(),
        vintages: vec![VintageData {
            vintage: Vintage::Census2020,
            buckets: vec![
                bucket(Band::Income(IncomeBand::Low), 210),
                bucket(Band::Income(IncomeBand::Moderate), 340),
                bucket(Band::Income(IncomeBand::Middle), 290),
                bucket(Band::Income(IncomeBand::Upper), 160),
                bucket(Band::Minority(MinorityBand::Low), 250),
                bucket(Band::Minority(MinorityBand::Moderate), 250),
                bucket(Band::Minority(MinorityBand::Middle), 260),
                bucket(Band::Minority(MinorityBand::High), 240),
            ],
        }],
    }]
}

// ===========================================================================
// Report tests
// ===========================================================================

#[test]
fn test_empty_collection_is_rejected() {
    let err = build_area_report(&ReportInput::new(Vec::new())).unwrap_err();
    assert!(matches!(err, LendingAnalyticsError::EmptyRecordSet));
}

#[test]
fn test_full_report() {
    let records = area_records();
    let mut input = ReportInput::new(records.clone());
    input.benchmarks = Some(benchmarks());
    input.vintage = Some(VintageRequest::BestAvailable);
    input.tract_populations = Some(
        records
            .iter()
            .filter_map(|r| r.tract.clone())
            .map(|t| (t, 4000))
            .collect::<HashMap<String, u64>>(),
    );
    input.subject_lender = Some("BANK".into());

    let out = build_area_report(&input).unwrap();
    let r = &out.result;

    assert_eq!(r.years, vec![2021, 2022]);
    assert_eq!(r.record_count, 16);

    let q = r.thresholds.as_ref().unwrap();
    assert_eq!(q.q25, dec!(27.5));
    assert_eq!(q.q50, dec!(45));
    assert_eq!(q.q75, dec!(62.5));
    assert_eq!(q.tract_count, 8);

    // LMI is always Low + Moderate of the same table.
    let lmict = &r.tract_income;
    assert_eq!(lmict.lmi.count, lmict.rows[0].count + lmict.rows[1].count);
    let lmib = r.borrower_income.as_ref().unwrap();
    assert_eq!(lmib.lmi.count, 48);
    assert!(!lmib.reconciliation.mismatch);

    // Pooled, purchase, refinance.
    assert_eq!(r.summaries.len(), 3);
    assert_eq!(r.summaries[0].segment, None);
    assert_eq!(r.summaries[1].segment, Some(LoanPurpose::Purchase));

    // One HHI per year per segment.
    assert_eq!(r.concentration.len(), 4);

    let shares = r.population_shares.as_ref().unwrap();
    let income_total = shares.dimension_total(BandDimension::Income).value().unwrap();
    assert!((income_total - dec!(100)).abs() <= dec!(0.1));
    assert!(!shares.blended);

    let quartiles = r.quartile_population_shares.as_ref().unwrap();
    assert!(!quartiles.approximate);
    assert!(quartiles
        .rows
        .iter()
        .all(|row| row.share_pct == MetricValue::Value(dec!(25))));

    let peers = r.peer_comparison.as_ref().unwrap();
    assert_eq!(peers.peers_by_year[&2022], vec!["CU".to_string()]);
    assert_eq!(peers.rows.len(), 11);

    assert!(out.methodology.contains("Area lending"));
}

#[test]
fn test_exempt_zero_costs_do_not_drag_the_mean() {
    let input = ReportInput::new(area_records());
    let out = build_area_report(&input).unwrap();
    // Every lender is under the 1,000-loan exemption line, so CU's zero costs
    // are placeholders.
    let pooled = &out.result.summaries[0];
    let costs = pooled.row(SummaryMetric::MeanTotalLoanCosts).unwrap();
    assert_eq!(costs.values[0].value, MetricValue::Value(dec!(4500)));
}

#[test]
fn test_population_shares_sum_to_one_hundred_per_dimension() {
    let input = {
        let mut i = ReportInput::new(area_records());
        i.benchmarks = Some(benchmarks());
        i
    };
    let out = build_area_report(&input).unwrap();
    let shares = out.result.population_shares.unwrap();
    for dim in [BandDimension::Income, BandDimension::Minority] {
        let total: Decimal = shares
            .shares
            .iter()
            .filter(|s| s.bucket.dimension() == dim)
            .filter_map(|s| s.share_pct.value())
            .sum();
        assert!((total - dec!(100)).abs() <= dec!(0.1), "{dim:?}: {total}");
    }
}
