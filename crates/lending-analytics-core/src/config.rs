//! Policy constants for a report run.
//!
//! Every threshold the engine applies lives here so that a caller can audit
//! or override it in one place. Missing keys in a serialized config fall back
//! to the regulatory defaults.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::LendingAnalyticsError;
use crate::types::Percent;
use crate::LendingAnalyticsResult;

/// Income band cut points, as a percentage of area median family income.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeThresholds {
    /// Upper bound (inclusive) of the Low band.
    pub low_max: Percent,
    /// Upper bound (inclusive) of the Moderate band.
    pub moderate_max: Percent,
    /// Upper bound (inclusive) of the Middle band.
    pub middle_max: Percent,
}

impl Default for IncomeThresholds {
    fn default() -> Self {
        Self {
            low_max: dec!(50),
            moderate_max: dec!(80),
            middle_max: dec!(120),
        }
    }
}

/// HHI concentration cut points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HhiThresholds {
    /// HHI below this is unconcentrated.
    pub moderate_min: Decimal,
    /// HHI above this is highly concentrated.
    pub high_above: Decimal,
}

impl Default for HhiThresholds {
    fn default() -> Self {
        Self {
            moderate_min: dec!(1500),
            high_above: dec!(2500),
        }
    }
}

/// Volume band used to pick peer lenders, relative to the subject's volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerBand {
    pub min_ratio: Decimal,
    pub max_ratio: Decimal,
}

impl Default for PeerBand {
    fn default() -> Self {
        Self {
            min_ratio: dec!(0.5),
            max_ratio: dec!(2.0),
        }
    }
}

/// Engine-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub income_thresholds: IncomeThresholds,
    /// Minority percentage at or above which a tract is majority-minority.
    pub majority_minority_threshold: Percent,
    /// Lenders with fewer total loans than this in scope may report cost
    /// fields as zero.
    pub exemption_min_loans: u64,
    /// p-value below which a subject/peer difference is significant.
    pub significance_level: f64,
    /// Apply the Yates continuity correction to 2x2 tables.
    pub yates_correction: bool,
    pub hhi_thresholds: HhiThresholds,
    pub peer_band: PeerBand,
    /// Largest tolerated gap between an upstream LMI total and Low + Moderate.
    pub lmi_reconciliation_tolerance: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            income_thresholds: IncomeThresholds::default(),
            majority_minority_threshold: dec!(50),
            exemption_min_loans: 1000,
            significance_level: 0.05,
            yates_correction: true,
            hhi_thresholds: HhiThresholds::default(),
            peer_band: PeerBand::default(),
            lmi_reconciliation_tolerance: 1,
        }
    }
}

impl EngineConfig {
    /// Reject configurations whose thresholds are out of order.
    pub fn validate(&self) -> LendingAnalyticsResult<()> {
        let t = &self.income_thresholds;
        if !(t.low_max < t.moderate_max && t.moderate_max < t.middle_max) {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "income_thresholds".into(),
                reason: "Must be strictly increasing: low < moderate < middle".into(),
            });
        }
        if self.majority_minority_threshold < Decimal::ZERO
            || self.majority_minority_threshold > dec!(100)
        {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "majority_minority_threshold".into(),
                reason: "Must be between 0 and 100".into(),
            });
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "significance_level".into(),
                reason: "Must be between 0 and 1 exclusive".into(),
            });
        }
        if self.hhi_thresholds.moderate_min > self.hhi_thresholds.high_above {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "hhi_thresholds".into(),
                reason: "moderate_min cannot exceed high_above".into(),
            });
        }
        if self.peer_band.min_ratio < Decimal::ZERO
            || self.peer_band.min_ratio > self.peer_band.max_ratio
        {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "peer_band".into(),
                reason: "Need 0 <= min_ratio <= max_ratio".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_regulatory_values() {
        let c = EngineConfig::default();
        assert_eq!(c.income_thresholds.low_max, dec!(50));
        assert_eq!(c.income_thresholds.moderate_max, dec!(80));
        assert_eq!(c.income_thresholds.middle_max, dec!(120));
        assert_eq!(c.exemption_min_loans, 1000);
        assert_eq!(c.hhi_thresholds.high_above, dec!(2500));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let c: EngineConfig = serde_json::from_str(r#"{"exemption_min_loans": 500}"#).unwrap();
        assert_eq!(c.exemption_min_loans, 500);
        assert_eq!(c.majority_minority_threshold, dec!(50));
        assert!(c.yates_correction);
    }

    #[test]
    fn test_reject_unordered_income_thresholds() {
        let mut c = EngineConfig::default();
        c.income_thresholds.moderate_max = dec!(40);
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_reject_bad_significance_level() {
        let mut c = EngineConfig::default();
        c.significance_level = 1.5;
        assert!(c.validate().is_err());
    }
}
