//! Weighted mean and weighted median with an exemption-aware zero filter.
//!
//! Covers:
//! 1. **Weighted mean** -- sum(v * w) / sum(w); unavailable when sum(w) = 0.
//! 2. **Weighted median** -- ascending by value, first value whose cumulative
//!    weight passes half the total (upper median on an exact tie).
//! 3. **Exemption policy** -- a zero reported by an exempt entity is a
//!    placeholder, not an observation, and is dropped from both statistics.
//!    Zeros from non-exempt entities are always kept.
//!
//! All arithmetic uses `rust_decimal::Decimal`. No `f64`. A sum or product
//! that leaves the `Decimal` range makes the statistic unavailable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::records::{lender_loan_totals, AggregateLoanRecord};
use crate::types::{checked_sum, MetricValue};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A value with a non-negative weight, optionally tagged with its reporting entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedMetric {
    pub value: Decimal,
    pub weight: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl WeightedMetric {
    pub fn new(value: Decimal, weight: Decimal) -> Self {
        Self {
            value,
            weight,
            entity_id: None,
        }
    }

    pub fn for_entity(value: Decimal, weight: Decimal, entity_id: impl Into<String>) -> Self {
        Self {
            value,
            weight,
            entity_id: Some(entity_id.into()),
        }
    }
}

/// Decides whether a metric was reported by an entity exempt from the field.
pub trait Exemption {
    fn is_exempt(&self, metric: &WeightedMetric) -> bool;
}

impl<F> Exemption for F
where
    F: Fn(&WeightedMetric) -> bool,
{
    fn is_exempt(&self, metric: &WeightedMetric) -> bool {
        self(metric)
    }
}

/// No entity is exempt; every zero counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExemption;

impl Exemption for NoExemption {
    fn is_exempt(&self, _metric: &WeightedMetric) -> bool {
        false
    }
}

/// A fixed set of exempt entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExemptionPolicy {
    exempt: BTreeSet<String>,
}

impl ExemptionPolicy {
    pub fn from_entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exempt: entities.into_iter().map(Into::into).collect(),
        }
    }

    /// Lenders with fewer than `min_loans` total loans in the given scope.
    pub fn from_volume(records: &[AggregateLoanRecord], min_loans: u64) -> Self {
        Self {
            exempt: lender_loan_totals(records)
                .into_iter()
                .filter(|(_, total)| *total < min_loans)
                .map(|(lender, _)| lender)
                .collect(),
        }
    }

    pub fn contains(&self, entity_id: &str) -> bool {
        self.exempt.contains(entity_id)
    }

    pub fn exempt_entities(&self) -> impl Iterator<Item = &str> {
        self.exempt.iter().map(String::as_str)
    }
}

impl Exemption for ExemptionPolicy {
    fn is_exempt(&self, metric: &WeightedMetric) -> bool {
        metric
            .entity_id
            .as_deref()
            .is_some_and(|e| self.contains(e))
    }
}

/// Mean and median computed over the same admitted set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedSummary {
    pub mean: MetricValue,
    pub median: MetricValue,
    pub total_weight: MetricValue,
    pub included: usize,
    /// Zeros dropped because their entity is exempt.
    pub excluded_exempt_zeros: usize,
    /// Entries dropped for a negative weight.
    pub rejected_negative_weight: usize,
    /// Weights or weighted values overflowed; mean and median are unavailable.
    pub overflowed: bool,
}

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

struct Admitted<'a> {
    metrics: Vec<&'a WeightedMetric>,
    excluded_exempt_zeros: usize,
    rejected_negative_weight: usize,
}

fn admit<'a>(metrics: &'a [WeightedMetric], exemption: &impl Exemption) -> Admitted<'a> {
    let mut admitted = Admitted {
        metrics: Vec::with_capacity(metrics.len()),
        excluded_exempt_zeros: 0,
        rejected_negative_weight: 0,
    };
    for m in metrics {
        if m.weight < Decimal::ZERO {
            admitted.rejected_negative_weight += 1;
        } else if m.value.is_zero() && exemption.is_exempt(m) {
            admitted.excluded_exempt_zeros += 1;
        } else {
            admitted.metrics.push(m);
        }
    }
    if admitted.rejected_negative_weight > 0 {
        tracing::warn!(
            count = admitted.rejected_negative_weight,
            "negative weights rejected from weighted statistic"
        );
    }
    admitted
}

fn total_weight_of(metrics: &[&WeightedMetric]) -> Option<Decimal> {
    checked_sum(metrics.iter().map(|m| m.weight))
}

fn weighted_sum_of(metrics: &[&WeightedMetric]) -> Option<Decimal> {
    metrics
        .iter()
        .try_fold(Decimal::ZERO, |acc, m| acc.checked_add(m.value.checked_mul(m.weight)?))
}

fn overflow_warning(statistic: &str, entries: usize) {
    tracing::warn!(statistic, entries, "weighted statistic overflowed; reported as unavailable");
}

fn mean_of(metrics: &[&WeightedMetric]) -> MetricValue {
    match (weighted_sum_of(metrics), total_weight_of(metrics)) {
        (Some(sum), Some(weight)) => MetricValue::ratio(sum, weight),
        _ => {
            overflow_warning("mean", metrics.len());
            MetricValue::NotAvailable
        }
    }
}

fn median_of(metrics: &[&WeightedMetric]) -> MetricValue {
    let total_weight = match total_weight_of(metrics) {
        Some(w) if !w.is_zero() => w,
        Some(_) => return MetricValue::NotAvailable,
        None => {
            overflow_warning("median", metrics.len());
            return MetricValue::NotAvailable;
        }
    };
    let mut sorted: Vec<&WeightedMetric> = metrics.to_vec();
    sorted.sort_by(|a, b| a.value.cmp(&b.value));

    let half = total_weight / dec!(2);
    let mut cumulative = Decimal::ZERO;
    for m in &sorted {
        cumulative += m.weight;
        // Strictly past half: an exact tie moves on to the next value.
        if cumulative > half {
            return MetricValue::Value(m.value);
        }
    }
    // The final cumulative weight equals the positive total, so the loop returns.
    MetricValue::NotAvailable
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Weighted mean after applying the exemption filter.
pub fn weighted_mean(metrics: &[WeightedMetric], exemption: &impl Exemption) -> MetricValue {
    mean_of(&admit(metrics, exemption).metrics)
}

/// Weighted median after applying the exemption filter.
pub fn weighted_median(metrics: &[WeightedMetric], exemption: &impl Exemption) -> MetricValue {
    median_of(&admit(metrics, exemption).metrics)
}

/// Mean, median and bookkeeping in one pass over the admitted set.
pub fn summarize(metrics: &[WeightedMetric], exemption: &impl Exemption) -> WeightedSummary {
    let admitted = admit(metrics, exemption);
    let total_weight = total_weight_of(&admitted.metrics);
    let overflowed = total_weight.is_none() || weighted_sum_of(&admitted.metrics).is_none();
    WeightedSummary {
        mean: mean_of(&admitted.metrics),
        median: median_of(&admitted.metrics),
        total_weight: total_weight.into(),
        included: admitted.metrics.len(),
        excluded_exempt_zeros: admitted.excluded_exempt_zeros,
        rejected_negative_weight: admitted.rejected_negative_weight,
        overflowed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::record;

    fn wm(v: Decimal, w: Decimal) -> WeightedMetric {
        WeightedMetric::new(v, w)
    }

    #[test]
    fn test_mean_with_equal_weights_is_arithmetic_mean() {
        let m = vec![wm(dec!(2), dec!(5)), wm(dec!(4), dec!(5)), wm(dec!(9), dec!(5))];
        assert_eq!(weighted_mean(&m, &NoExemption), MetricValue::Value(dec!(5)));
    }

    #[test]
    fn test_mean_respects_weights() {
        let m = vec![wm(dec!(10), dec!(3)), wm(dec!(20), dec!(1))];
        assert_eq!(weighted_mean(&m, &NoExemption), MetricValue::Value(dec!(12.5)));
    }

    #[test]
    fn test_zero_total_weight_is_not_available() {
        let m = vec![wm(dec!(10), dec!(0)), wm(dec!(20), dec!(0))];
        assert_eq!(weighted_mean(&m, &NoExemption), MetricValue::NotAvailable);
        assert_eq!(weighted_median(&m, &NoExemption), MetricValue::NotAvailable);
        assert_eq!(weighted_mean(&[], &NoExemption), MetricValue::NotAvailable);
    }

    #[test]
    fn test_median_basic() {
        let m = vec![wm(dec!(3), dec!(1)), wm(dec!(1), dec!(2)), wm(dec!(2), dec!(1))];
        // sorted: 1(2) 2(1) 3(1); half = 2; cum 2 is not past half, cum 3 is
        assert_eq!(weighted_median(&m, &NoExemption), MetricValue::Value(dec!(2)));
    }

    #[test]
    fn test_median_upper_on_exact_tie() {
        let m = vec![wm(dec!(1), dec!(1)), wm(dec!(2), dec!(1))];
        assert_eq!(weighted_median(&m, &NoExemption), MetricValue::Value(dec!(2)));
    }

    #[test]
    fn test_median_dominant_weight() {
        let m = vec![wm(dec!(1), dec!(1)), wm(dec!(5), dec!(10)), wm(dec!(9), dec!(1))];
        assert_eq!(weighted_median(&m, &NoExemption), MetricValue::Value(dec!(5)));
    }

    #[test]
    fn test_zero_weight_entries_do_not_shift_median() {
        let base = vec![wm(dec!(1), dec!(1)), wm(dec!(3), dec!(1)), wm(dec!(5), dec!(1))];
        let mut padded = base.clone();
        padded.push(wm(dec!(0.5), dec!(0)));
        padded.push(wm(dec!(0.7), dec!(0)));
        assert_eq!(
            weighted_median(&base, &NoExemption),
            weighted_median(&padded, &NoExemption)
        );
        assert_eq!(weighted_mean(&base, &NoExemption), weighted_mean(&padded, &NoExemption));
    }

    #[test]
    fn test_exempt_zeros_are_excluded() {
        let m = vec![
            WeightedMetric::for_entity(dec!(0), dec!(100), "small"),
            WeightedMetric::for_entity(dec!(4000), dec!(10), "big"),
            WeightedMetric::for_entity(dec!(2000), dec!(10), "big"),
        ];
        let policy = ExemptionPolicy::from_entities(["small"]);
        assert_eq!(weighted_mean(&m, &policy), MetricValue::Value(dec!(3000)));
        // Without the policy the placeholder zeros swamp the mean.
        assert_eq!(weighted_mean(&m, &NoExemption), MetricValue::Value(dec!(500)));
    }

    #[test]
    fn test_non_exempt_true_zeros_are_kept() {
        let m = vec![
            WeightedMetric::for_entity(dec!(0), dec!(1), "big"),
            WeightedMetric::for_entity(dec!(10), dec!(1), "big"),
        ];
        let policy = ExemptionPolicy::from_entities(["small"]);
        assert_eq!(weighted_mean(&m, &policy), MetricValue::Value(dec!(5)));
    }

    #[test]
    fn test_exempt_nonzero_values_are_kept() {
        let m = vec![
            WeightedMetric::for_entity(dec!(7), dec!(1), "small"),
            WeightedMetric::for_entity(dec!(0), dec!(1), "small"),
        ];
        let policy = ExemptionPolicy::from_entities(["small"]);
        let s = summarize(&m, &policy);
        assert_eq!(s.mean, MetricValue::Value(dec!(7)));
        assert_eq!(s.median, MetricValue::Value(dec!(7)));
        assert_eq!(s.excluded_exempt_zeros, 1);
        assert_eq!(s.included, 1);
    }

    #[test]
    fn test_closure_predicate() {
        let m = vec![
            WeightedMetric::for_entity(dec!(0), dec!(1), "x"),
            WeightedMetric::for_entity(dec!(8), dec!(1), "y"),
        ];
        let only_x = |w: &WeightedMetric| w.entity_id.as_deref() == Some("x");
        assert_eq!(weighted_mean(&m, &only_x), MetricValue::Value(dec!(8)));
    }

    #[test]
    fn test_negative_weights_rejected() {
        let m = vec![wm(dec!(10), dec!(-1)), wm(dec!(4), dec!(1))];
        let s = summarize(&m, &NoExemption);
        assert_eq!(s.mean, MetricValue::Value(dec!(4)));
        assert_eq!(s.rejected_negative_weight, 1);
    }

    #[test]
    fn test_overflowing_product_degrades_to_not_available() {
        let m = vec![wm(dec!(10000000000000000000), dec!(100000000000))];
        assert_eq!(weighted_mean(&m, &NoExemption), MetricValue::NotAvailable);
        let s = summarize(&m, &NoExemption);
        assert!(s.overflowed);
        assert_eq!(s.mean, MetricValue::NotAvailable);
        // The median never multiplies, so it survives.
        assert_eq!(s.median, MetricValue::Value(dec!(10000000000000000000)));
    }

    #[test]
    fn test_overflowing_weights_degrade_both_statistics() {
        let m = vec![wm(dec!(1), Decimal::MAX), wm(dec!(2), Decimal::MAX)];
        let s = summarize(&m, &NoExemption);
        assert!(s.overflowed);
        assert_eq!(s.mean, MetricValue::NotAvailable);
        assert_eq!(s.median, MetricValue::NotAvailable);
        assert_eq!(s.total_weight, MetricValue::NotAvailable);
    }

    #[test]
    fn test_volume_policy_marks_small_lenders() {
        let rows = vec![
            record("small", 2022, "36061000100", 400),
            record("small", 2023, "36061000100", 500),
            record("big", 2022, "36061000100", 1000),
        ];
        let policy = ExemptionPolicy::from_volume(&rows, 1000);
        assert!(policy.contains("small"));
        assert!(!policy.contains("big"));
    }
}
