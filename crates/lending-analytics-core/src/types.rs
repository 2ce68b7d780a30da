use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dollar amounts (loan amounts, costs, property values).
pub type Money = Decimal;

/// Percentages expressed on a 0-100 scale (22.5 = 22.5%). Never as fractions.
pub type Percent = Decimal;

/// Rendering used for every unavailable figure in a table.
pub const NOT_AVAILABLE: &str = "N/A";

// ---------------------------------------------------------------------------
// MetricValue
// ---------------------------------------------------------------------------

/// A computed figure, or an explicit marker that it could not be computed.
///
/// Zero denominators, absent source fields and empty inputs all produce
/// `NotAvailable`; it serializes as `null` and renders as `N/A`, so it can
/// never leak into a percentage column as `0` or `NaN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum MetricValue {
    Value(Decimal),
    #[default]
    NotAvailable,
}

impl MetricValue {
    /// `numerator / denominator`, unavailable when the denominator is zero
    /// or the quotient leaves the `Decimal` range.
    pub fn ratio(numerator: Decimal, denominator: Decimal) -> Self {
        numerator.checked_div(denominator).into()
    }

    /// `numerator / denominator * 100`, unavailable when the denominator is zero.
    pub fn percent(numerator: Decimal, denominator: Decimal) -> Self {
        Self::ratio(numerator, denominator).and_then(|r| r.checked_mul(dec!(100)))
    }

    /// Percentage of two counts.
    pub fn percent_of(numerator: u64, denominator: u64) -> Self {
        Self::percent(Decimal::from(numerator), Decimal::from(denominator))
    }

    pub fn value(&self) -> Option<Decimal> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::NotAvailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, MetricValue::Value(_))
    }

    pub fn map(self, f: impl FnOnce(Decimal) -> Decimal) -> Self {
        match self {
            MetricValue::Value(v) => MetricValue::Value(f(v)),
            MetricValue::NotAvailable => MetricValue::NotAvailable,
        }
    }

    pub fn and_then(self, f: impl FnOnce(Decimal) -> Option<Decimal>) -> Self {
        self.value().and_then(f).into()
    }

    /// `self - other`; unavailable if either side is.
    pub fn minus(self, other: MetricValue) -> Self {
        match (self, other) {
            (MetricValue::Value(a), MetricValue::Value(b)) => a.checked_sub(b).into(),
            _ => MetricValue::NotAvailable,
        }
    }

    /// Fixed-precision rendering for tables.
    pub fn render(&self, dp: u32) -> String {
        match self {
            MetricValue::Value(v) => v.round_dp(dp).to_string(),
            MetricValue::NotAvailable => NOT_AVAILABLE.to_string(),
        }
    }
}

impl From<Option<Decimal>> for MetricValue {
    fn from(v: Option<Decimal>) -> Self {
        match v {
            Some(v) => MetricValue::Value(v),
            None => MetricValue::NotAvailable,
        }
    }
}

impl From<MetricValue> for Option<Decimal> {
    fn from(v: MetricValue) -> Self {
        v.value()
    }
}

impl From<Decimal> for MetricValue {
    fn from(v: Decimal) -> Self {
        MetricValue::Value(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value(v) => write!(f, "{}", v.normalize()),
            MetricValue::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

/// Sum that yields `None` instead of overflowing.
pub fn checked_sum<I>(values: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// Loan-purpose segment. Every metric is computed independently per segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanPurpose {
    Purchase,
    Refinance,
    CashOutRefinance,
    HomeImprovement,
    HomeEquity,
    Other,
}

impl fmt::Display for LoanPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoanPurpose::Purchase => "Home Purchase",
            LoanPurpose::Refinance => "Refinance",
            LoanPurpose::CashOutRefinance => "Cash-Out Refinance",
            LoanPurpose::HomeImprovement => "Home Improvement",
            LoanPurpose::HomeEquity => "Home Equity",
            LoanPurpose::Other => "Other",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Bands
// ---------------------------------------------------------------------------

/// Income band relative to area median family income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeBand {
    Low,
    Moderate,
    Middle,
    Upper,
    Unknown,
}

impl IncomeBand {
    /// The four bands that take part in percentage denominators.
    pub const KNOWN: [IncomeBand; 4] = [
        IncomeBand::Low,
        IncomeBand::Moderate,
        IncomeBand::Middle,
        IncomeBand::Upper,
    ];

    pub fn is_lmi(&self) -> bool {
        matches!(self, IncomeBand::Low | IncomeBand::Moderate)
    }

    pub fn label(&self) -> &'static str {
        match self {
            IncomeBand::Low => "Low Income",
            IncomeBand::Moderate => "Moderate Income",
            IncomeBand::Middle => "Middle Income",
            IncomeBand::Upper => "Upper Income",
            IncomeBand::Unknown => "Income Unknown",
        }
    }
}

impl fmt::Display for IncomeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tract minority-population quartile within a report scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinorityBand {
    Low,
    Moderate,
    Middle,
    High,
    Unknown,
}

impl MinorityBand {
    pub const KNOWN: [MinorityBand; 4] = [
        MinorityBand::Low,
        MinorityBand::Moderate,
        MinorityBand::Middle,
        MinorityBand::High,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MinorityBand::Low => "Low Minority",
            MinorityBand::Moderate => "Moderate Minority",
            MinorityBand::Middle => "Middle Minority",
            MinorityBand::High => "High Minority",
            MinorityBand::Unknown => "Minority Unknown",
        }
    }
}

impl fmt::Display for MinorityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which classification scheme a band belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandDimension {
    Income,
    Minority,
    MajorityMinority,
}

/// Any classification bucket a population or loan count can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    Income(IncomeBand),
    Minority(MinorityBand),
    MajorityMinority(bool),
}

impl Band {
    pub fn dimension(&self) -> BandDimension {
        match self {
            Band::Income(_) => BandDimension::Income,
            Band::Minority(_) => BandDimension::Minority,
            Band::MajorityMinority(_) => BandDimension::MajorityMinority,
        }
    }

    /// Unknown buckets never enter a share denominator.
    pub fn is_known(&self) -> bool {
        !matches!(
            self,
            Band::Income(IncomeBand::Unknown) | Band::Minority(MinorityBand::Unknown)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Band::Income(b) => b.label(),
            Band::Minority(b) => b.label(),
            Band::MajorityMinority(true) => "Majority-Minority Tracts",
            Band::MajorityMinority(false) => "Non-Majority-Minority Tracts",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Output envelope
// ---------------------------------------------------------------------------

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

/// Records a degradation: emitted as a `tracing` warning and kept for the
/// output envelope.
pub(crate) fn push_warning(warnings: &mut Vec<String>, message: String) {
    tracing::warn!("{}", message);
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_guards_zero_denominator() {
        assert_eq!(MetricValue::percent_of(3, 0), MetricValue::NotAvailable);
        assert_eq!(MetricValue::percent_of(1, 4), MetricValue::Value(dec!(25)));
    }

    #[test]
    fn test_not_available_renders_na() {
        assert_eq!(MetricValue::NotAvailable.render(2), "N/A");
        assert_eq!(MetricValue::NotAvailable.to_string(), "N/A");
        assert_eq!(MetricValue::Value(dec!(12.345)).render(1), "12.3");
    }

    #[test]
    fn test_minus_propagates_unavailable() {
        let a = MetricValue::Value(dec!(5));
        assert_eq!(a.minus(MetricValue::NotAvailable), MetricValue::NotAvailable);
        assert_eq!(a.minus(MetricValue::Value(dec!(7))), MetricValue::Value(dec!(-2)));
    }

    #[test]
    fn test_out_of_range_arithmetic_is_not_available() {
        assert_eq!(MetricValue::ratio(Decimal::MAX, dec!(0.5)), MetricValue::NotAvailable);
        assert_eq!(MetricValue::percent(Decimal::MAX, dec!(1)), MetricValue::NotAvailable);
        assert_eq!(
            MetricValue::Value(Decimal::MIN).minus(MetricValue::Value(dec!(1))),
            MetricValue::NotAvailable
        );
        assert_eq!(checked_sum([Decimal::MAX, dec!(1)]), None);
        assert_eq!(checked_sum([dec!(1), dec!(2)]), Some(dec!(3)));
    }

    #[test]
    fn test_metric_value_serializes_as_null() {
        let json = serde_json::to_string(&MetricValue::NotAvailable).unwrap();
        assert_eq!(json, "null");
        let back: MetricValue = serde_json::from_str("null").unwrap();
        assert_eq!(back, MetricValue::NotAvailable);
    }

    #[test]
    fn test_unknown_bands_are_not_known() {
        assert!(!Band::Income(IncomeBand::Unknown).is_known());
        assert!(Band::MajorityMinority(false).is_known());
        assert_eq!(Band::Minority(MinorityBand::High).dimension(), BandDimension::Minority);
    }
}
