//! Assembles every table of an area report from one record collection.
//!
//! Quartile thresholds are computed once and shared by every table. Each
//! table degrades on its own: a missing column blanks that table and adds a
//! warning, never the whole report.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

use crate::aggregation::summary::{build_summary_table, SummaryTable};
use crate::aggregation::weighted::ExemptionPolicy;
use crate::classification::income::{
    borrower_income_distribution, tract_income_distribution, IncomeDistribution,
};
use crate::classification::minority::{
    minority_distribution, reconcile_mmct, MinorityDistribution, QuartileThresholds,
};
use crate::classification::classify_in_scope;
use crate::comparison::peer::{compare_to_peers, PeerComparison, PeerSelection};
use crate::concentration::hhi::{hhi_by_year_segment, HhiResult, VolumeMeasure};
use crate::config::EngineConfig;
use crate::population::shares::{
    population_shares, GeographyDemographics, PopulationShareSet, VintageRequest,
};
use crate::population::tract_shares::{quartile_population_shares, QuartilePopulationShares};
use crate::records::{ensure_records, segments, years, AggregateLoanRecord};
use crate::types::{push_warning, with_metadata, ComputationOutput, LoanPurpose};
use crate::LendingAnalyticsResult;

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

/// Everything needed for one report scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    pub records: Vec<AggregateLoanRecord>,
    #[serde(default)]
    pub config: EngineConfig,
    /// Segments to summarise besides the pooled table; empty means every
    /// segment present.
    #[serde(default)]
    pub segments: Vec<LoanPurpose>,
    #[serde(default)]
    pub volume_measure: VolumeMeasure,
    #[serde(default)]
    pub benchmarks: Option<Vec<GeographyDemographics>>,
    #[serde(default)]
    pub vintage: Option<VintageRequest>,
    #[serde(default)]
    pub tract_populations: Option<HashMap<String, u64>>,
    #[serde(default)]
    pub subject_lender: Option<String>,
    /// Explicit peers; otherwise chosen by volume band.
    #[serde(default)]
    pub peers: Option<Vec<String>>,
    /// Explicit exempt lenders; otherwise every lender under
    /// `config.exemption_min_loans`.
    #[serde(default)]
    pub exempt_lenders: Option<Vec<String>>,
}

impl ReportInput {
    pub fn new(records: Vec<AggregateLoanRecord>) -> Self {
        Self {
            records,
            config: EngineConfig::default(),
            segments: Vec::new(),
            volume_measure: VolumeMeasure::default(),
            benchmarks: None,
            vintage: None,
            tract_populations: None,
            subject_lender: None,
            peers: None,
            exempt_lenders: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaReport {
    pub years: Vec<i32>,
    pub record_count: usize,
    pub thresholds: Option<QuartileThresholds>,
    pub tract_income: IncomeDistribution,
    pub borrower_income: Option<IncomeDistribution>,
    pub minority: Option<MinorityDistribution>,
    /// Pooled table first, then one per segment.
    pub summaries: Vec<SummaryTable>,
    pub concentration: Vec<HhiResult>,
    pub population_shares: Option<PopulationShareSet>,
    pub quartile_population_shares: Option<QuartilePopulationShares>,
    pub peer_comparison: Option<PeerComparison>,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Build the full area report.
///
/// Fails only on an empty record collection or an invalid configuration.
pub fn build_area_report(
    input: &ReportInput,
) -> LendingAnalyticsResult<ComputationOutput<AreaReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let config = &input.config;

    ensure_records(&input.records)?;
    config.validate()?;
    tracing::info!(records = input.records.len(), "building area report");

    let (scope, classified) = classify_in_scope(&input.records, config, &mut warnings);
    let tolerance = config.lmi_reconciliation_tolerance;

    let tract_income = tract_income_distribution(&classified, tolerance, &mut warnings);
    if tract_income.classified_total == 0 {
        push_warning(
            &mut warnings,
            "No record carries a tract income ratio; LMICT table is empty".into(),
        );
    }
    let borrower_income = borrower_income_distribution(&input.records, tolerance, &mut warnings);
    let minority = scope
        .as_ref()
        .map(|scope| minority_distribution(&classified, scope));
    if let Some(dist) = &minority {
        reconcile_mmct(&classified, dist.mmct_count, tolerance, &mut warnings);
    }

    let exemption = match &input.exempt_lenders {
        Some(ids) => ExemptionPolicy::from_entities(ids.iter().cloned()),
        None => ExemptionPolicy::from_volume(&input.records, config.exemption_min_loans),
    };
    let summary_segments: Vec<LoanPurpose> = if input.segments.is_empty() {
        segments(&input.records).into_iter().collect()
    } else {
        input.segments.clone()
    };
    let mut summaries = Vec::with_capacity(summary_segments.len() + 1);
    for segment in std::iter::once(None).chain(summary_segments.into_iter().map(Some)) {
        if let Some(table) =
            build_summary_table(&classified, segment, &exemption, tolerance, &mut warnings)
        {
            summaries.push(table);
        }
    }

    let concentration =
        hhi_by_year_segment(&input.records, input.volume_measure, config, &mut warnings);

    let population_shares = input.benchmarks.as_ref().map(|geos| {
        population_shares(
            geos,
            input.vintage.unwrap_or(VintageRequest::BestAvailable),
            &mut warnings,
        )
    });

    let quartile_population_shares = match (&scope, &input.tract_populations) {
        (Some(scope), Some(lookup)) => {
            quartile_population_shares(&input.records, scope, lookup, &mut warnings)
        }
        _ => None,
    };

    let peer_comparison = input.subject_lender.as_deref().and_then(|subject| {
        let selection = match &input.peers {
            Some(ids) => PeerSelection::Explicit(ids.clone()),
            None => PeerSelection::VolumeBand,
        };
        compare_to_peers(&classified, subject, &selection, config, &mut warnings)
    });

    let report = AreaReport {
        years: years(&input.records).into_iter().collect(),
        record_count: input.records.len(),
        thresholds: scope.as_ref().map(|s| s.thresholds().clone()),
        tract_income,
        borrower_income,
        minority,
        summaries,
        concentration,
        population_shares,
        quartile_population_shares,
        peer_comparison,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "income_bands": "Low <= 50%, Moderate <= 80%, Middle <= 120% of AMFI (configurable)",
        "minority_quartiles": "linear-interpolation percentiles over distinct tracts in scope",
        "lmi": "always recomputed as Low + Moderate",
        "exemption": "zero cost fields from exempt lenders are excluded",
        "significance": "2x2 chi-squared, flagged only when significant and subject below peers",
        "config": config,
    });

    Ok(with_metadata(
        "Area lending analysis (income/minority banding, HHI, peer significance)",
        &assumptions,
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LendingAnalyticsError;
    use crate::records::fixtures::record;
    use rust_decimal_macros::dec;

    fn records() -> Vec<AggregateLoanRecord> {
        let mut a = record("A", 2022, "36061000100", 40);
        a.tract_income_ratio = Some(dec!(45));
        a.tract_minority_pct = Some(dec!(20));
        let mut b = record("B", 2022, "36061000200", 60);
        b.tract_income_ratio = Some(dec!(110));
        b.tract_minority_pct = Some(dec!(65));
        vec![a, b]
    }

    #[test]
    fn test_empty_records_is_the_only_data_error() {
        let out = build_area_report(&ReportInput::new(Vec::new()));
        assert!(matches!(out, Err(LendingAnalyticsError::EmptyRecordSet)));
    }

    #[test]
    fn test_optional_tables_absent_without_inputs() {
        let out = build_area_report(&ReportInput::new(records())).unwrap();
        let r = &out.result;
        assert!(r.thresholds.is_some());
        assert!(r.population_shares.is_none());
        assert!(r.quartile_population_shares.is_none());
        assert!(r.peer_comparison.is_none());
        assert!(r.borrower_income.is_none());
        assert_eq!(r.tract_income.lmi.count, 40);
        assert_eq!(r.concentration.len(), 1);
        // Pooled plus the one segment present.
        assert_eq!(r.summaries.len(), 2);
    }

    #[test]
    fn test_missing_minority_column_degrades_locally() {
        let mut recs = records();
        for r in &mut recs {
            r.tract_minority_pct = None;
        }
        let out = build_area_report(&ReportInput::new(recs)).unwrap();
        assert!(out.result.thresholds.is_none());
        assert!(out.result.minority.is_none());
        assert_eq!(out.result.tract_income.classified_total, 100);
        assert!(out.warnings.iter().any(|w| w.contains("Minority quartiles unavailable")));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut input = ReportInput::new(records());
        input.config.income_thresholds.low_max = dec!(90);
        assert!(matches!(
            build_area_report(&input),
            Err(LendingAnalyticsError::InvalidInput { .. })
        ));
    }
}
