//! Chi-squared test of independence on a 2x2 subject/peer table.
//!
//! Rows are subject and peer; columns are loans with and without the
//! characteristic. With one degree of freedom the Yates continuity
//! correction shrinks each `|observed - expected|` by `min(0.5, |O - E|)`.
//!
//! Counts are converted to `f64` here and nowhere else; the p-value comes
//! from the chi-squared survival function in `statrs`.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use thiserror::Error;

/// Why a table could not be tested. Every variant reads as "not significant".
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SignificanceError {
    #[error("{group} group has no loans")]
    EmptyGroup { group: String },

    #[error("Expected frequency is zero in at least one cell")]
    ZeroExpectedFrequency,

    #[error("Malformed contingency table: {0}")]
    MalformedTable(String),

    #[error("Chi-squared distribution unavailable: {0}")]
    Distribution(String),
}

/// `[[subject_with, subject_without], [peer_with, peer_without]]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub subject_with: u64,
    pub subject_without: u64,
    pub peer_with: u64,
    pub peer_without: u64,
}

impl ContingencyTable {
    /// Build from "with" counts and group totals.
    pub fn from_totals(
        subject_with: u64,
        subject_total: u64,
        peer_with: u64,
        peer_total: u64,
    ) -> Result<Self, SignificanceError> {
        if subject_with > subject_total || peer_with > peer_total {
            return Err(SignificanceError::MalformedTable(format!(
                "count exceeds total (subject {subject_with}/{subject_total}, peer {peer_with}/{peer_total})"
            )));
        }
        Ok(Self {
            subject_with,
            subject_without: subject_total - subject_with,
            peer_with,
            peer_without: peer_total - peer_with,
        })
    }

    pub fn subject_total(&self) -> u64 {
        self.subject_with + self.subject_without
    }

    pub fn peer_total(&self) -> u64 {
        self.peer_with + self.peer_without
    }

    fn cells(&self) -> [[f64; 2]; 2] {
        [
            [self.subject_with as f64, self.subject_without as f64],
            [self.peer_with as f64, self.peer_without as f64],
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiSquaredOutcome {
    pub statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: u32,
    pub yates_corrected: bool,
    pub expected: [[f64; 2]; 2],
}

impl ChiSquaredOutcome {
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }
}

/// Chi-squared test of independence on a 2x2 table.
pub fn chi_squared_2x2(
    table: &ContingencyTable,
    yates: bool,
) -> Result<ChiSquaredOutcome, SignificanceError> {
    if table.subject_total() == 0 {
        return Err(SignificanceError::EmptyGroup {
            group: "Subject".into(),
        });
    }
    if table.peer_total() == 0 {
        return Err(SignificanceError::EmptyGroup {
            group: "Peer".into(),
        });
    }

    let observed = table.cells();
    let row_totals = [observed[0][0] + observed[0][1], observed[1][0] + observed[1][1]];
    let col_totals = [observed[0][0] + observed[1][0], observed[0][1] + observed[1][1]];
    let grand_total = row_totals[0] + row_totals[1];

    let mut expected = [[0.0f64; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            expected[i][j] = row_totals[i] * col_totals[j] / grand_total;
            if expected[i][j] == 0.0 {
                return Err(SignificanceError::ZeroExpectedFrequency);
            }
        }
    }

    let mut statistic = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let mut diff = (observed[i][j] - expected[i][j]).abs();
            if yates {
                diff -= diff.min(0.5);
            }
            statistic += diff * diff / expected[i][j];
        }
    }

    let dist =
        ChiSquared::new(1.0).map_err(|e| SignificanceError::Distribution(e.to_string()))?;
    let p_value = dist.sf(statistic);

    Ok(ChiSquaredOutcome {
        statistic,
        p_value,
        degrees_of_freedom: 1,
        yates_corrected: yates,
        expected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_difference_is_significant() {
        let t = ContingencyTable::from_totals(40, 100, 20, 200).unwrap();
        assert_eq!(
            t,
            ContingencyTable {
                subject_with: 40,
                subject_without: 60,
                peer_with: 20,
                peer_without: 180
            }
        );
        let out = chi_squared_2x2(&t, true).unwrap();
        assert!((out.expected[0][0] - 20.0).abs() < 1e-9);
        assert!(out.is_significant(0.05), "p = {}", out.p_value);
        assert!(out.p_value < 1e-6);
    }

    #[test]
    fn test_identical_ratios_never_significant() {
        for yates in [true, false] {
            let t = ContingencyTable::from_totals(10, 100, 30, 300).unwrap();
            let out = chi_squared_2x2(&t, yates).unwrap();
            assert!(out.statistic.abs() < 1e-12);
            assert!(!out.is_significant(0.05));
        }
    }

    #[test]
    fn test_yates_lowers_statistic() {
        let t = ContingencyTable::from_totals(12, 50, 5, 50).unwrap();
        let plain = chi_squared_2x2(&t, false).unwrap();
        let corrected = chi_squared_2x2(&t, true).unwrap();
        assert!(corrected.statistic < plain.statistic);
        assert!(corrected.p_value > plain.p_value);
    }

    #[test]
    fn test_uncorrected_statistic_matches_closed_form() {
        // n(ad - bc)^2 / (r1 r2 c1 c2)
        let t = ContingencyTable::from_totals(30, 50, 20, 50).unwrap();
        let out = chi_squared_2x2(&t, false).unwrap();
        let expected = 100.0 * (30.0 * 30.0 - 20.0 * 20.0f64).powi(2) / (50.0 * 50.0 * 50.0 * 50.0);
        assert!((out.statistic - expected).abs() < 1e-9);
    }

    #[test]
    fn test_empty_group_and_zero_expected() {
        let empty = ContingencyTable::from_totals(0, 0, 5, 10).unwrap();
        assert!(matches!(
            chi_squared_2x2(&empty, true),
            Err(SignificanceError::EmptyGroup { .. })
        ));
        let none_with = ContingencyTable::from_totals(0, 10, 0, 10).unwrap();
        assert_eq!(
            chi_squared_2x2(&none_with, true),
            Err(SignificanceError::ZeroExpectedFrequency)
        );
    }

    #[test]
    fn test_count_above_total_is_malformed() {
        assert!(matches!(
            ContingencyTable::from_totals(11, 10, 0, 10),
            Err(SignificanceError::MalformedTable(_))
        ));
    }
}
