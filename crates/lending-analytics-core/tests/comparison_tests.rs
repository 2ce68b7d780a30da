#![cfg(feature = "comparison")]

use lending_analytics_core::classification::classify_records;
use lending_analytics_core::classification::minority::MinorityScope;
use lending_analytics_core::comparison::peer::{
    compare_to_peers, ComparisonMetric, PeerSelection,
};
use lending_analytics_core::comparison::significance::{
    chi_squared_2x2, ContingencyTable, SignificanceError,
};
use lending_analytics_core::records::RaceCategory;
use lending_analytics_core::{AggregateLoanRecord, EngineConfig, MetricValue};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::json;

// ===========================================================================
// Chi-squared tests
// ===========================================================================

#[test]
fn test_forty_of_hundred_vs_twenty_of_two_hundred() {
    let table = ContingencyTable::from_totals(40, 100, 20, 200).unwrap();
    assert_eq!((table.subject_without, table.peer_without), (60, 180));
    let out = chi_squared_2x2(&table, true).unwrap();
    assert!(out.p_value < 0.05);
    assert_eq!(out.degrees_of_freedom, 1);
}

#[test]
fn test_identical_ratios_across_scales() {
    for (sw, st, pw, pt) in [(1, 4, 25, 100), (3, 10, 300, 1000), (50, 100, 7, 14)] {
        let table = ContingencyTable::from_totals(sw, st, pw, pt).unwrap();
        let out = chi_squared_2x2(&table, true).unwrap();
        assert!(out.p_value > 0.99, "{sw}/{st} vs {pw}/{pt}: p = {}", out.p_value);
    }
}

#[test]
fn test_zero_total_is_not_tested() {
    let table = ContingencyTable::from_totals(0, 0, 3, 9).unwrap();
    assert!(matches!(
        chi_squared_2x2(&table, false),
        Err(SignificanceError::EmptyGroup { .. })
    ));
}

// ===========================================================================
// Peer comparison tests
// ===========================================================================

fn market() -> Vec<AggregateLoanRecord> {
    serde_json::from_value(json!([
        {
            "lender_id": "SUBJ", "year": 2022, "geoid": "36061", "tract": "36061000100",
            "purpose": "purchase", "total_loans": 100,
            "tract_minority_pct": "60", "tract_income_ratio": "70",
            "race": { "hispanic": 40, "black": 5, "white": 50 },
            "borrower_income": { "low": 10, "moderate": 20, "middle": 30, "upper": 40 }
        },
        {
            "lender_id": "PEER1", "year": 2022, "geoid": "36061", "tract": "36061000200",
            "purpose": "purchase", "total_loans": 120,
            "tract_minority_pct": "20", "tract_income_ratio": "140",
            "race": { "hispanic": 12, "black": 30, "white": 70 },
            "borrower_income": { "low": 20, "moderate": 30, "middle": 40, "upper": 30 }
        },
        {
            "lender_id": "PEER2", "year": 2022, "geoid": "36061", "tract": "36061000300",
            "purpose": "purchase", "total_loans": 80,
            "tract_minority_pct": "35", "tract_income_ratio": "90",
            "race": { "hispanic": 8, "black": 20, "white": 45 },
            "borrower_income": { "low": 10, "moderate": 10, "middle": 30, "upper": 30 }
        },
        {
            "lender_id": "GIANT", "year": 2022, "geoid": "36061", "tract": "36061000300",
            "purpose": "purchase", "total_loans": 4000,
            "tract_minority_pct": "35", "tract_income_ratio": "90"
        }
    ]))
    .unwrap()
}

#[test]
fn test_peer_comparison_rows_in_fixed_order() {
    let records = market();
    let config = EngineConfig::default();
    let mut w = Vec::new();
    let scope = MinorityScope::build(&records, &config, &mut w).unwrap();
    let classified = classify_records(&records, &scope, &config);
    let cmp = compare_to_peers(&classified, "SUBJ", &PeerSelection::VolumeBand, &config, &mut w)
        .unwrap();

    let names: Vec<&str> = cmp.rows.iter().map(|r| r.metric_name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Total Loans",
            "LMI Borrower %",
            "LMI Tract %",
            "Majority-Minority Tract %",
            "Hispanic %",
            "Black %",
            "Asian %",
            "Native American %",
            "Pacific Islander %",
            "Multi-Racial %",
            "White %",
        ]
    );
    assert_eq!(
        cmp.peers_by_year[&2022],
        vec!["PEER1".to_string(), "PEER2".to_string()]
    );
}

#[test]
fn test_peer_values_are_loan_weighted() {
    let records = market();
    let config = EngineConfig::default();
    let mut w = Vec::new();
    let scope = MinorityScope::build(&records, &config, &mut w).unwrap();
    let classified = classify_records(&records, &scope, &config);
    let cmp = compare_to_peers(&classified, "SUBJ", &PeerSelection::VolumeBand, &config, &mut w)
        .unwrap();

    let hispanic = cmp
        .rows
        .iter()
        .find(|r| r.metric == ComparisonMetric::Race(RaceCategory::Hispanic))
        .unwrap();
    let cell = &hispanic.years[0];
    assert_eq!(cell.subject_value, MetricValue::Value(dec!(40)));
    // (12 + 8) / (120 + 80)
    assert_eq!(cell.peer_value, MetricValue::Value(dec!(10)));
    assert!(cell.is_significant);
    assert!(!cell.flagged);

    let black = cmp
        .rows
        .iter()
        .find(|r| r.metric == ComparisonMetric::Race(RaceCategory::Black))
        .unwrap();
    assert!(black.years[0].flagged);

    // LMI tract: subject's tract is Moderate (70%), peers' are Upper and Middle.
    let lmict = cmp
        .rows
        .iter()
        .find(|r| r.metric == ComparisonMetric::LmiTractPct)
        .unwrap();
    assert_eq!(lmict.years[0].subject_value, MetricValue::Value(dec!(100)));
    assert_eq!(lmict.years[0].peer_value, MetricValue::Value(dec!(0)));
}
