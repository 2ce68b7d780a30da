//! Census population benchmarks.

pub mod benchmark_cache;
pub mod shares;
pub mod tract_shares;

use chrono::{DateTime, Utc};

use self::benchmark_cache::BenchmarkCache;
use self::shares::{population_shares, GeographyDemographics, PopulationShareSet, VintageRequest};

/// Population shares for a benchmark geography set, served from `cache` while
/// fresh.
///
/// `fetch` loads the raw demographics on a miss; the computed shares are what
/// gets cached.
pub fn cached_population_shares<'c, E>(
    cache: &'c mut BenchmarkCache<PopulationShareSet>,
    key: &str,
    request: VintageRequest,
    now: DateTime<Utc>,
    warnings: &mut Vec<String>,
    fetch: impl FnOnce() -> Result<Vec<GeographyDemographics>, E>,
) -> Result<&'c PopulationShareSet, E> {
    let cache_key = format!("{key}:{request:?}");
    cache.get_or_try_insert_with(&cache_key, now, || {
        let geographies = fetch()?;
        Ok(population_shares(&geographies, request, warnings))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Band, IncomeBand};
    use chrono::{Duration, TimeZone};
    use shares::{BucketPopulation, Vintage, VintageData};

    fn national() -> Vec<GeographyDemographics> {
        vec![GeographyDemographics {
            geoid: "US".into(),
            vintages: vec![VintageData {
                vintage: Vintage::Acs,
                buckets: IncomeBand::KNOWN
                    .iter()
                    .map(|&b| BucketPopulation {
                        bucket: Band::Income(b),
                        population: 100,
                    })
                    .collect(),
            }],
        }]
    }

    #[test]
    fn test_national_shares_cached_per_request() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut cache = BenchmarkCache::new(Duration::days(1));
        let mut warnings = Vec::new();
        let mut fetches = 0;

        for _ in 0..2 {
            let set = cached_population_shares(
                &mut cache,
                "national",
                VintageRequest::BestAvailable,
                now,
                &mut warnings,
                || {
                    fetches += 1;
                    Ok::<_, String>(national())
                },
            )
            .unwrap();
            assert_eq!(set.shares.len(), 4);
        }
        assert_eq!(fetches, 1);

        cached_population_shares(
            &mut cache,
            "national",
            VintageRequest::Specific(Vintage::Acs),
            now,
            &mut warnings,
            || Ok::<_, String>(national()),
        )
        .unwrap();
        assert_eq!(cache.len(), 2);
    }
}
