//! Merger simulation: HHI before and after two lenders combine, screened
//! against the 2010 Horizontal Merger Guidelines.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::HhiThresholds;
use crate::error::LendingAnalyticsError;
use crate::LendingAnalyticsResult;

use super::hhi::{calculate_hhi, ConcentrationLevel, EntityVolume, HhiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergerScreen {
    /// Unlikely to have adverse competitive effects.
    Unlikely,
    /// Potentially raises significant competitive concerns.
    RaisesConcerns,
    /// Presumed likely to enhance market power.
    PresumedMarketPower,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergerSimulation {
    pub acquirer: String,
    pub target: String,
    pub pre: HhiResult,
    pub post: HhiResult,
    pub delta: Decimal,
    pub screen: MergerScreen,
}

/// Screen a post-merger HHI and its change.
pub fn screen_merger(post_level: ConcentrationLevel, delta: Decimal) -> MergerScreen {
    match post_level {
        ConcentrationLevel::Low => MergerScreen::Unlikely,
        ConcentrationLevel::Moderate if delta > dec!(100) => MergerScreen::RaisesConcerns,
        ConcentrationLevel::Moderate => MergerScreen::Unlikely,
        ConcentrationLevel::High if delta > dec!(200) => MergerScreen::PresumedMarketPower,
        ConcentrationLevel::High if delta >= dec!(100) => MergerScreen::RaisesConcerns,
        ConcentrationLevel::High => MergerScreen::Unlikely,
    }
}

/// Fold `target` into `acquirer` and compare HHI before and after.
pub fn simulate_merger(
    volumes: &[EntityVolume],
    acquirer: &str,
    target: &str,
    thresholds: &HhiThresholds,
) -> LendingAnalyticsResult<MergerSimulation> {
    if acquirer == target {
        return Err(LendingAnalyticsError::InvalidInput {
            field: "target".into(),
            reason: "Acquirer and target must be different entities".into(),
        });
    }
    for id in [acquirer, target] {
        if !volumes.iter().any(|v| v.entity_id == id) {
            return Err(LendingAnalyticsError::InvalidInput {
                field: "entity_id".into(),
                reason: format!("Entity {id} not present in market"),
            });
        }
    }

    let pre = calculate_hhi(volumes, thresholds)?;
    let merged: Vec<EntityVolume> = volumes
        .iter()
        .map(|v| {
            if v.entity_id == target {
                EntityVolume::new(acquirer, v.volume)
            } else {
                v.clone()
            }
        })
        .collect();
    let post = calculate_hhi(&merged, thresholds)?;
    let delta = post.hhi - pre.hhi;
    let screen = screen_merger(post.concentration_level, delta);
    tracing::debug!(acquirer, target, %delta, ?screen, "merger simulated");

    Ok(MergerSimulation {
        acquirer: acquirer.to_string(),
        target: target.to_string(),
        pre,
        post,
        delta,
        screen,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market() -> Vec<EntityVolume> {
        vec![
            EntityVolume::new("A", dec!(30)),
            EntityVolume::new("B", dec!(20)),
            EntityVolume::new("C", dec!(50)),
        ]
    }

    #[test]
    fn test_delta_is_twice_product_of_shares() {
        let sim = simulate_merger(&market(), "A", "B", &HhiThresholds::default()).unwrap();
        // 2 * 30 * 20
        assert_eq!(sim.delta, dec!(1200));
        assert_eq!(sim.post.hhi, dec!(5000));
        assert_eq!(sim.screen, MergerScreen::PresumedMarketPower);
        assert_eq!(sim.post.entity_count, 2);
    }

    #[test]
    fn test_screen_bands() {
        assert_eq!(screen_merger(ConcentrationLevel::Low, dec!(900)), MergerScreen::Unlikely);
        assert_eq!(
            screen_merger(ConcentrationLevel::Moderate, dec!(101)),
            MergerScreen::RaisesConcerns
        );
        assert_eq!(screen_merger(ConcentrationLevel::Moderate, dec!(100)), MergerScreen::Unlikely);
        assert_eq!(screen_merger(ConcentrationLevel::High, dec!(150)), MergerScreen::RaisesConcerns);
        assert_eq!(screen_merger(ConcentrationLevel::High, dec!(50)), MergerScreen::Unlikely);
    }

    #[test]
    fn test_unknown_or_identical_parties_rejected() {
        let t = HhiThresholds::default();
        assert!(simulate_merger(&market(), "A", "A", &t).is_err());
        assert!(simulate_merger(&market(), "A", "Z", &t).is_err());
    }
}
