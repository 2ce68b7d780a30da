//! Tract and borrower classification into regulatory bands.

pub mod income;
pub mod minority;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::records::AggregateLoanRecord;
use crate::types::{push_warning, IncomeBand, MinorityBand};

use self::income::classify_income_ratio;
use self::minority::MinorityScope;

/// A record annotated with the bands of its tract.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedRecord<'a> {
    pub record: &'a AggregateLoanRecord,
    pub income_band: IncomeBand,
    pub minority_band: MinorityBand,
    /// `None` when the tract's minority share is unknown.
    pub majority_minority: Option<bool>,
}

/// Annotate every record with its tract bands.
///
/// Returns a new collection; the input is never touched.
pub fn classify_records<'a>(
    records: &'a [AggregateLoanRecord],
    scope: &MinorityScope,
    config: &EngineConfig,
) -> Vec<ClassifiedRecord<'a>> {
    records
        .iter()
        .map(|record| ClassifiedRecord {
            record,
            income_band: classify_income_ratio(record.tract_income_ratio, &config.income_thresholds),
            minority_band: scope.classify(record.tract_minority_pct),
            majority_minority: scope.majority_minority(record.tract_minority_pct),
        })
        .collect()
}

/// Classification when no quartile thresholds could be built.
///
/// Minority bands are all `Unknown`; majority-minority status uses the fixed
/// threshold and is still reported.
pub fn classify_records_unscoped<'a>(
    records: &'a [AggregateLoanRecord],
    config: &EngineConfig,
) -> Vec<ClassifiedRecord<'a>> {
    records
        .iter()
        .map(|record| ClassifiedRecord {
            record,
            income_band: classify_income_ratio(record.tract_income_ratio, &config.income_thresholds),
            minority_band: MinorityBand::Unknown,
            majority_minority: minority::is_majority_minority(
                record.tract_minority_pct,
                config.majority_minority_threshold,
            ),
        })
        .collect()
}

/// Build the quartile scope once and classify against it, falling back to
/// [`classify_records_unscoped`] with a warning when no thresholds exist.
pub fn classify_in_scope<'a>(
    records: &'a [AggregateLoanRecord],
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> (Option<MinorityScope>, Vec<ClassifiedRecord<'a>>) {
    match MinorityScope::build(records, config, warnings) {
        Ok(scope) => {
            let classified = classify_records(records, &scope, config);
            (Some(scope), classified)
        }
        Err(e) => {
            push_warning(warnings, format!("Minority quartiles unavailable: {e}"));
            (None, classify_records_unscoped(records, config))
        }
    }
}

/// Number of records per income band, `Unknown` included.
pub fn income_band_record_counts(classified: &[ClassifiedRecord<'_>]) -> BTreeMap<IncomeBand, usize> {
    let mut counts = BTreeMap::new();
    for c in classified {
        *counts.entry(c.income_band).or_insert(0) += 1;
    }
    counts
}

/// Number of records per minority band, `Unknown` included.
pub fn minority_band_record_counts(
    classified: &[ClassifiedRecord<'_>],
) -> BTreeMap<MinorityBand, usize> {
    let mut counts = BTreeMap::new();
    for c in classified {
        *counts.entry(c.minority_band).or_insert(0) += 1;
    }
    counts
}
