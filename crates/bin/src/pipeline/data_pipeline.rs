//! Data pipeline for loading census tracts.
//!
//! Tracts come from a CSV file, the SQLite cache, or the census API. API
//! downloads are either one state-wide request or one request per county,
//! issued concurrently behind the client's shared rate limiter.

use super::cache_manager;
use super::config::AppConfig;
use futures::stream::{self, StreamExt};
use gini::{California, County, Region};
use gini_data::cache::SqliteCache;
use gini_data::census::{CensusClient, CensusQuery, Geography};
use gini_data::{DataError, TractSet};
use indicatif::ProgressBar;
use std::path::Path;
use std::pin::pin;
use tracing::{debug, info, warn};

/// Error type for data pipeline operations.
#[derive(Debug, thiserror::Error)]
pub(crate) enum DataPipelineError {
    /// Fetch, cache or parse error.
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    /// County name or code not found.
    #[error("Unknown county: {0}")]
    UnknownCounty(String),
    /// Counties can only be resolved within California.
    #[error("County selection requires state {expected}, configured state is {actual}")]
    UnsupportedState { expected: &'static str, actual: String },
    /// Nothing was loaded.
    #[error("No tracts loaded{}", failed_suffix(.failed))]
    NoTracts { failed: Vec<String> },
}

fn failed_suffix(failed: &[String]) -> String {
    if failed.is_empty() {
        String::new()
    } else {
        format!(" (failed: {})", failed.join(", "))
    }
}

/// Configuration for data fetching.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Whether to use the cache.
    pub use_cache: bool,
    /// Whether to force refresh (ignore cached tracts, still write new ones).
    pub force_refresh: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            force_refresh: false,
        }
    }
}

/// Tracts plus the geographies that could not be fetched.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedTracts {
    /// Loaded tracts.
    pub tracts: TractSet,
    /// Counties (or the state) whose request failed, by name.
    pub failed: Vec<String>,
}

/// Resolve county arguments given as names or FIPS codes.
pub(crate) fn resolve_counties(keys: &[String]) -> Result<Vec<County>, DataPipelineError> {
    let mut counties = Vec::with_capacity(keys.len());
    for key in keys {
        let county = California
            .resolve(key)
            .ok_or_else(|| DataPipelineError::UnknownCounty(key.clone()))?;
        if !counties.contains(county) {
            counties.push(*county);
        }
    }
    Ok(counties)
}

/// Load tracts from `input` when given, otherwise from the cache or the API.
///
/// With `counties`, only those counties are kept (CSV) or requested (API).
pub(crate) async fn load_tracts(
    config: &AppConfig,
    input: Option<&Path>,
    counties: &[String],
    fetch: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<LoadedTracts, DataPipelineError> {
    let selected = resolve_counties(counties)?;

    let loaded = match input {
        Some(path) => {
            let tracts = TractSet::read_csv(path)?;
            info!(path = %path.display(), tracts = tracts.len(), "loaded tracts from CSV");
            let tracts = if selected.is_empty() {
                tracts
            } else {
                let names: Vec<&str> = selected.iter().map(|c| c.name).collect();
                tracts.filter_counties(&names)
            };
            LoadedTracts {
                tracts,
                failed: Vec::new(),
            }
        }
        None => fetch_tracts(config, &selected, fetch, progress).await?,
    };

    if loaded.tracts.is_empty() {
        return Err(DataPipelineError::NoTracts { failed: loaded.failed });
    }
    Ok(loaded)
}

/// Display name of a geography: the county name when known.
fn geography_name(geography: &Geography) -> String {
    geography
        .county()
        .and_then(|fips| California.by_fips(fips))
        .map_or_else(|| geography.to_string(), |c| c.name.to_string())
}

/// Fetch tracts from the cache or the census API.
///
/// An empty `counties` slice fetches the whole state in one request.
pub(crate) async fn fetch_tracts(
    config: &AppConfig,
    counties: &[County],
    fetch: &FetchConfig,
    progress: Option<&ProgressBar>,
) -> Result<LoadedTracts, DataPipelineError> {
    let settings = &config.census;
    if !counties.is_empty() && settings.state != California.state_fips() {
        return Err(DataPipelineError::UnsupportedState {
            expected: California.state_fips(),
            actual: settings.state.clone(),
        });
    }

    let geographies: Vec<Geography> = if counties.is_empty() {
        vec![Geography::tracts_in_state(settings.state.clone())]
    } else {
        counties.iter().map(|c| California.county_geography(c)).collect()
    };

    // A cache that fails to open only disables caching
    let cache = if fetch.use_cache {
        match cache_manager::open_cache() {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(error = %e, "cache unavailable");
                None
            }
        }
    } else {
        None
    };

    let mut tracts = TractSet::default();
    let mut failed = Vec::new();
    let mut to_fetch = Vec::new();
    for geography in geographies {
        match cached(cache.as_ref(), config, &geography, fetch) {
            Some(hit) => {
                debug!(geography = %geography, tracts = hit.len(), "cache hit");
                tracts.extend(hit);
            }
            None => to_fetch.push(geography),
        }
    }

    if let Some(pb) = progress {
        let cached = if counties.is_empty() {
            u64::from(to_fetch.is_empty())
        } else {
            (counties.len() - to_fetch.len()) as u64
        };
        pb.set_length(cached + to_fetch.len() as u64);
        pb.set_position(cached);
        if to_fetch.is_empty() {
            pb.set_message("Loading from cache...");
        } else {
            pb.set_message(format!(
                "Fetching {} geographies ({} concurrent)...",
                to_fetch.len(),
                settings.concurrency
            ));
        }
    }

    if !to_fetch.is_empty() {
        let mut client = CensusClient::with_rate_limit(settings.request_interval())?;
        if let Some(key) = config.api_key() {
            client = client.with_api_key(key);
        }
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url.clone());
        }

        let queries = to_fetch
            .into_iter()
            .map(|geography| {
                CensusQuery::builder()
                    .year(settings.year)
                    .survey(settings.survey)
                    .geography(geography)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let client = &client;
        let mut results = pin!(
            stream::iter(queries)
                .map(|query| async move {
                    let result = client.fetch_tracts(&query).await;
                    (query, result)
                })
                .buffer_unordered(settings.concurrency)
        );

        while let Some((query, result)) = results.next().await {
            match result {
                Ok(fetched) => {
                    if let Some(cache) = &cache
                        && let Err(e) =
                            cache.put_tracts(query.year, query.survey, &query.geography, &fetched)
                    {
                        warn!(geography = %query.geography, error = %e, "failed to cache tracts");
                    }
                    tracts.extend(fetched);
                }
                Err(e) => {
                    failed.push(geography_name(&query.geography));
                    if let Some(pb) = progress {
                        pb.suspend(|| {
                            eprintln!("Warning: Failed to fetch {}: {}", query.geography, e);
                        });
                    } else {
                        eprintln!("Warning: Failed to fetch {}: {}", query.geography, e);
                    }
                }
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }
        if !failed.is_empty() {
            failed.sort();
            warn!(failed = ?failed, "some geographies could not be fetched");
        }
    }

    if tracts.is_empty() {
        return Err(DataPipelineError::NoTracts { failed });
    }
    Ok(LoadedTracts { tracts, failed })
}

fn cached(
    cache: Option<&SqliteCache>,
    config: &AppConfig,
    geography: &Geography,
    fetch: &FetchConfig,
) -> Option<TractSet> {
    let cache = cache?;
    if fetch.force_refresh {
        return None;
    }
    let (year, survey) = (config.census.year, config.census.survey);
    match cache.has_geography(year, survey, geography) {
        Ok(true) => cache
            .get_tracts(year, survey, geography)
            .ok()
            .filter(|t| !t.is_empty()),
        Ok(false) => None,
        Err(e) => {
            warn!(geography = %geography, error = %e, "cache lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gini_data::Tract;
    use rstest::rstest;

    #[rstest]
    #[case("Alameda")]
    #[case("alameda county")]
    #[case("001")]
    fn test_resolve_county_forms(#[case] key: &str) {
        let counties = resolve_counties(&[key.to_string()]).unwrap();
        assert_eq!(counties.len(), 1);
        assert_eq!(counties[0].name, "Alameda County");
    }

    #[test]
    fn test_resolve_deduplicates_and_rejects_unknown() {
        let counties = resolve_counties(&["Marin".to_string(), "041".to_string()]).unwrap();
        assert_eq!(counties.len(), 1);

        let err = resolve_counties(&["Atlantis".to_string()]).unwrap_err();
        assert!(matches!(err, DataPipelineError::UnknownCounty(ref k) if k == "Atlantis"));
    }

    #[tokio::test]
    async fn test_load_from_csv_filters_counties() {
        let tracts: TractSet = vec![
            Tract::new("06001400100", "Alameda County", 0.42, 900_000.0).unwrap(),
            Tract::new("06019000100", "Fresno County", 0.47, 250_000.0).unwrap(),
        ]
        .into_iter()
        .collect();
        let path = std::env::temp_dir().join(format!("gini-pipeline-{}.csv", std::process::id()));
        tracts.write_csv(&path).unwrap();

        let config = AppConfig::default();
        let loaded = load_tracts(&config, Some(&path), &["Fresno".to_string()], &FetchConfig::default(), None)
            .await
            .unwrap();
        assert_eq!(loaded.tracts.len(), 1);
        assert_eq!(loaded.tracts.counties(), vec!["Fresno County".to_string()]);
        assert!(loaded.failed.is_empty());

        let none = load_tracts(&config, Some(&path), &["Marin".to_string()], &FetchConfig::default(), None).await;
        assert!(matches!(none, Err(DataPipelineError::NoTracts { ref failed }) if failed.is_empty()));

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_county_fetch_requires_california() {
        let mut config = AppConfig::default();
        config.census.state = "36".to_string();
        let alameda = resolve_counties(&["Alameda".to_string()]).unwrap();
        let fetch = FetchConfig {
            use_cache: false,
            force_refresh: false,
        };
        let result = fetch_tracts(&config, &alameda, &fetch, None).await;
        assert!(matches!(result, Err(DataPipelineError::UnsupportedState { .. })));
    }

    #[test]
    fn test_geography_names() {
        let alpine = California.county_geography(&resolve_counties(&["Alpine".to_string()]).unwrap()[0]);
        assert_eq!(geography_name(&alpine), "Alpine County");
        assert_eq!(geography_name(&Geography::tracts_in_state("06")), "tracts in state 06");
    }

    #[tokio::test]
    async fn test_failed_counties_are_reported() {
        let mut config = AppConfig::default();
        // Nothing listens on the discard port, so every request fails fast
        config.census.request_interval_ms = 0;
        config.census.base_url = Some("http://127.0.0.1:9".to_string());
        let counties = resolve_counties(&["Marin".to_string(), "Alpine".to_string()]).unwrap();
        let fetch = FetchConfig {
            use_cache: false,
            force_refresh: false,
        };
        let err = fetch_tracts(&config, &counties, &fetch, None).await.unwrap_err();
        let DataPipelineError::NoTracts { failed } = &err else {
            panic!("expected NoTracts, got {err}");
        };
        assert_eq!(failed, &vec!["Alpine County".to_string(), "Marin County".to_string()]);
        assert!(err.to_string().ends_with("(failed: Alpine County, Marin County)"));
    }
}
