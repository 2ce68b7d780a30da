//! Subject lender versus peer group, per metric and year.
//!
//! Covers:
//! 1. **Peer selection** -- an explicit list, or every other lender whose
//!    yearly volume sits inside a band around the subject's.
//! 2. **Values** -- subject share from its own counts; peer share as the
//!    loan-weighted mean of each peer lender's share.
//! 3. **Significance** -- 2x2 chi-squared on the raw counts. Only a
//!    significant shortfall (subject below peers) is flagged.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregation::weighted::{weighted_mean, NoExemption, WeightedMetric};
use crate::classification::ClassifiedRecord;
use crate::config::{EngineConfig, PeerBand};
use crate::records::RaceCategory;
use crate::types::{push_warning, IncomeBand, MetricValue};

use super::significance::{chi_squared_2x2, ChiSquaredOutcome, ContingencyTable};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMetric {
    TotalLoans,
    LmiBorrowerPct,
    LmiTractPct,
    MmctPct,
    Race(RaceCategory),
}

impl ComparisonMetric {
    /// Row order of every comparison table.
    pub const ALL: [ComparisonMetric; 11] = [
        ComparisonMetric::TotalLoans,
        ComparisonMetric::LmiBorrowerPct,
        ComparisonMetric::LmiTractPct,
        ComparisonMetric::MmctPct,
        ComparisonMetric::Race(RaceCategory::Hispanic),
        ComparisonMetric::Race(RaceCategory::Black),
        ComparisonMetric::Race(RaceCategory::Asian),
        ComparisonMetric::Race(RaceCategory::NativeAmerican),
        ComparisonMetric::Race(RaceCategory::PacificIslander),
        ComparisonMetric::Race(RaceCategory::MultiRacial),
        ComparisonMetric::Race(RaceCategory::White),
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ComparisonMetric::TotalLoans => "Total Loans",
            ComparisonMetric::LmiBorrowerPct => "LMI Borrower %",
            ComparisonMetric::LmiTractPct => "LMI Tract %",
            ComparisonMetric::MmctPct => "Majority-Minority Tract %",
            ComparisonMetric::Race(r) => match r {
                RaceCategory::Hispanic => "Hispanic %",
                RaceCategory::Black => "Black %",
                RaceCategory::Asian => "Asian %",
                RaceCategory::NativeAmerican => "Native American %",
                RaceCategory::PacificIslander => "Pacific Islander %",
                RaceCategory::MultiRacial => "Multi-Racial %",
                RaceCategory::White => "White %",
            },
        }
    }

    /// Informational rows get no difference and no test.
    pub fn is_percentage(&self) -> bool {
        !matches!(self, ComparisonMetric::TotalLoans)
    }
}

/// `(with, total)` loan counts behind a percentage metric; `None` when no
/// record carries the source field.
fn proportion_counts<'a, 'r: 'a>(
    metric: ComparisonMetric,
    rows: impl IntoIterator<Item = &'a ClassifiedRecord<'r>>,
) -> Option<(u64, u64)> {
    let mut with = 0u64;
    let mut total = 0u64;
    let mut seen = false;
    for c in rows {
        let r = c.record;
        match metric {
            ComparisonMetric::TotalLoans => return None,
            ComparisonMetric::LmiBorrowerPct => {
                let b = &r.borrower_income;
                if let (Some(low), Some(moderate), Some(middle), Some(upper)) =
                    (b.low, b.moderate, b.middle, b.upper)
                {
                    with += low + moderate;
                    total += low + moderate + middle + upper;
                    seen = true;
                }
            }
            ComparisonMetric::LmiTractPct => {
                if c.income_band != IncomeBand::Unknown {
                    if c.income_band.is_lmi() {
                        with += r.total_loans;
                    }
                    total += r.total_loans;
                    seen = true;
                }
            }
            ComparisonMetric::MmctPct => {
                if let Some(is_mmct) = c.majority_minority {
                    if is_mmct {
                        with += r.total_loans;
                    }
                    total += r.total_loans;
                    seen = true;
                }
            }
            ComparisonMetric::Race(category) => {
                if let Some(count) = category.count(&r.race) {
                    with += count;
                    total += r.total_loans;
                    seen = true;
                }
            }
        }
    }
    seen.then_some((with, total))
}

// ---------------------------------------------------------------------------
// Peer selection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerSelection {
    /// These lenders, every year.
    Explicit(Vec<String>),
    /// Lenders whose yearly volume is within the configured band of the subject's.
    VolumeBand,
}

/// Lenders other than `subject` whose total loans fall within `band` times
/// the subject's volume.
pub fn select_peers<'a, 'r: 'a>(
    classified: impl IntoIterator<Item = &'a ClassifiedRecord<'r>>,
    subject: &str,
    band: &PeerBand,
) -> BTreeSet<String> {
    let mut volumes: BTreeMap<&str, u64> = BTreeMap::new();
    for c in classified {
        *volumes.entry(c.record.lender_id.as_str()).or_insert(0) += c.record.total_loans;
    }
    let subject_volume = Decimal::from(volumes.get(subject).copied().unwrap_or(0));
    if subject_volume.is_zero() {
        return BTreeSet::new();
    }
    let lo = subject_volume * band.min_ratio;
    let hi = subject_volume * band.max_ratio;
    volumes
        .into_iter()
        .filter(|(id, v)| {
            let v = Decimal::from(*v);
            *id != subject && v >= lo && v <= hi
        })
        .map(|(id, _)| id.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearComparison {
    pub year: i32,
    pub subject_value: MetricValue,
    pub peer_value: MetricValue,
    /// subject - peer
    pub difference: MetricValue,
    pub table: Option<ContingencyTable>,
    pub test: Option<ChiSquaredOutcome>,
    /// Why no test ran, when one would have.
    pub untested_reason: Option<String>,
    pub is_significant: bool,
    /// The subject trails its peers (difference below zero).
    pub is_negative: bool,
    /// Significant and the subject trails its peers.
    pub flagged: bool,
}

fn trails_peers(difference: MetricValue) -> bool {
    difference.value().is_some_and(|d| d < Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub metric: ComparisonMetric,
    pub metric_name: String,
    pub years: Vec<YearComparison>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerComparison {
    pub subject: String,
    pub peers_by_year: BTreeMap<i32, Vec<String>>,
    pub rows: Vec<ComparisonRow>,
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

fn informational_cell(
    year: i32,
    subject_rows: &[&ClassifiedRecord<'_>],
    peer_rows: &BTreeMap<&str, Vec<&ClassifiedRecord<'_>>>,
) -> YearComparison {
    let subject_total: u64 = subject_rows.iter().map(|c| c.record.total_loans).sum();
    let per_peer: Vec<WeightedMetric> = peer_rows
        .iter()
        .map(|(id, rows)| {
            let total: u64 = rows.iter().map(|c| c.record.total_loans).sum();
            WeightedMetric::for_entity(Decimal::from(total), Decimal::ONE, *id)
        })
        .collect();
    YearComparison {
        year,
        subject_value: MetricValue::Value(Decimal::from(subject_total)),
        peer_value: weighted_mean(&per_peer, &NoExemption),
        difference: MetricValue::NotAvailable,
        table: None,
        test: None,
        untested_reason: None,
        is_significant: false,
        is_negative: false,
        flagged: false,
    }
}

fn percentage_cell(
    metric: ComparisonMetric,
    year: i32,
    subject_rows: &[&ClassifiedRecord<'_>],
    peer_rows: &BTreeMap<&str, Vec<&ClassifiedRecord<'_>>>,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> YearComparison {
    let subject_counts = proportion_counts(metric, subject_rows.iter().copied());
    let subject_value = subject_counts
        .map(|(w, t)| MetricValue::percent_of(w, t))
        .unwrap_or_default();

    let mut per_peer = Vec::new();
    let mut peer_with = 0u64;
    let mut peer_total = 0u64;
    let mut peer_seen = false;
    for (id, rows) in peer_rows {
        if let Some((w, t)) = proportion_counts(metric, rows.iter().copied()) {
            peer_seen = true;
            peer_with += w;
            peer_total += t;
            if let Some(pct) = MetricValue::percent_of(w, t).value() {
                per_peer.push(WeightedMetric::for_entity(pct, Decimal::from(t), *id));
            }
        }
    }
    let peer_value = if peer_seen {
        weighted_mean(&per_peer, &NoExemption)
    } else {
        MetricValue::NotAvailable
    };
    let difference = subject_value.minus(peer_value);

    let mut cell = YearComparison {
        year,
        subject_value,
        peer_value,
        difference,
        table: None,
        test: None,
        untested_reason: None,
        is_significant: false,
        is_negative: trails_peers(difference),
        flagged: false,
    };

    let Some((subject_with, subject_total)) = subject_counts else {
        cell.untested_reason = Some("Subject has no source data".into());
        return cell;
    };
    if !peer_seen {
        cell.untested_reason = Some("Peers have no source data".into());
        return cell;
    }
    if subject_total == 0 || peer_total == 0 {
        cell.untested_reason = Some("A group has no loans".into());
        return cell;
    }

    let outcome = ContingencyTable::from_totals(subject_with, subject_total, peer_with, peer_total)
        .and_then(|table| {
            cell.table = Some(table);
            chi_squared_2x2(&table, config.yates_correction)
        });
    match outcome {
        Ok(test) => {
            cell.is_significant = test.is_significant(config.significance_level);
            cell.flagged = cell.is_significant && cell.is_negative;
            cell.test = Some(test);
        }
        Err(e) => {
            tracing::info!(metric = metric.label(), year, error = %e, "significance not tested");
            cell.untested_reason = Some(e.to_string());
        }
    }
    if cell.flagged {
        push_warning(
            warnings,
            format!("{year} {}: subject significantly below peers", metric.label()),
        );
    }
    cell
}

/// Compare `subject` against its peers for every year the subject reports.
///
/// `None`, with a warning, when the subject has no records.
pub fn compare_to_peers(
    classified: &[ClassifiedRecord<'_>],
    subject: &str,
    selection: &PeerSelection,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> Option<PeerComparison> {
    let mut by_year: BTreeMap<i32, Vec<&ClassifiedRecord<'_>>> = BTreeMap::new();
    for c in classified {
        by_year.entry(c.record.year).or_default().push(c);
    }

    let mut peers_by_year: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    let mut cells: Vec<Vec<YearComparison>> = vec![Vec::new(); ComparisonMetric::ALL.len()];

    for (&year, rows) in &by_year {
        let subject_rows: Vec<&ClassifiedRecord<'_>> = rows
            .iter()
            .copied()
            .filter(|c| c.record.lender_id == subject)
            .collect();
        if subject_rows.is_empty() {
            continue;
        }

        let peer_ids: BTreeSet<String> = match selection {
            PeerSelection::Explicit(ids) => ids.iter().filter(|id| *id != subject).cloned().collect(),
            PeerSelection::VolumeBand => {
                select_peers(rows.iter().copied(), subject, &config.peer_band)
            }
        };
        if peer_ids.is_empty() {
            push_warning(warnings, format!("No peers for {subject} in {year}; peer values N/A"));
        }

        let mut peer_rows: BTreeMap<&str, Vec<&ClassifiedRecord<'_>>> = BTreeMap::new();
        for c in rows.iter().copied() {
            if peer_ids.contains(&c.record.lender_id) {
                peer_rows.entry(c.record.lender_id.as_str()).or_default().push(c);
            }
        }
        peers_by_year.insert(year, peer_ids.into_iter().collect());

        for (i, metric) in ComparisonMetric::ALL.iter().enumerate() {
            let cell = if metric.is_percentage() {
                percentage_cell(*metric, year, &subject_rows, &peer_rows, config, warnings)
            } else {
                informational_cell(year, &subject_rows, &peer_rows)
            };
            cells[i].push(cell);
        }
    }

    if peers_by_year.is_empty() {
        push_warning(
            warnings,
            format!("Subject lender {subject} has no records in scope; peer comparison unavailable"),
        );
        return None;
    }

    let rows = ComparisonMetric::ALL
        .iter()
        .zip(cells)
        .map(|(&metric, years)| ComparisonRow {
            metric,
            metric_name: metric.label().to_string(),
            years,
        })
        .collect();

    Some(PeerComparison {
        subject: subject.to_string(),
        peers_by_year,
        rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
