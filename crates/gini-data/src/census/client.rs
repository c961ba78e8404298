//! Census statistics API client with rate limiting.

use super::parse::tracts_from_table;
use super::query::CensusQuery;
use crate::error::{DataError, Result};
use crate::tract::TractSet;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

/// Census API base URL
const CENSUS_BASE_URL: &str = "https://api.census.gov/data";

/// Default spacing between requests
const DEFAULT_RATE_LIMIT: Duration = Duration::from_millis(200);

/// User agent sent with every request
const USER_AGENT: &str = "gini-report/0.1";

/// A raw census table: header row plus data rows.
///
/// Cells are `None` where the API returned `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CensusTable {
    /// Column names from the first response row
    pub header: Vec<String>,
    /// Remaining rows
    pub rows: Vec<Vec<Option<String>>>,
}

impl CensusTable {
    /// Parse the API's JSON array-of-arrays body.
    ///
    /// Numbers are kept in their textual form so that parsing stays in one place.
    pub fn from_json(body: &str) -> Result<Self> {
        let raw: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;
        let mut rows = raw.into_iter().map(|row| {
            row.into_iter()
                .map(|cell| match cell {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>()
        });

        let header = rows
            .next()
            .ok_or_else(|| DataError::Parse("census response has no header row".to_string()))?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect::<Vec<_>>();

        let rows: Vec<Vec<Option<String>>> = rows.collect();
        if let Some(bad) = rows.iter().position(|r| r.len() != header.len()) {
            return Err(DataError::Parse(format!(
                "census row {} has {} cells, header has {}",
                bad + 1,
                rows[bad].len(),
                header.len()
            )));
        }

        Ok(Self { header, rows })
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Number of data rows.
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no data rows.
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Rate limiter to keep requests spaced out
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Instant::now() - min_interval,
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// Census statistics API client with rate limiting
pub struct CensusClient {
    client: reqwest::Client,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    base_url: String,
    api_key: Option<String>,
}

impl CensusClient {
    /// Create a new client with default settings (5 req/sec, no API key)
    pub fn new() -> Result<Self> {
        Self::with_rate_limit(DEFAULT_RATE_LIMIT)
    }

    /// Create a new client with a custom minimum interval between requests
    ///
    /// # Example
    /// ```no_run
    /// use gini_data::census::CensusClient;
    /// use std::time::Duration;
    ///
    /// # fn example() -> gini_data::Result<()> {
    /// let client = CensusClient::with_rate_limit(Duration::from_millis(500))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_rate_limit(min_interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(DataError::Network)?;

        Ok(Self {
            client,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(min_interval))),
            base_url: CENSUS_BASE_URL.to_string(),
            api_key: None,
        })
    }

    /// Attach an API key (sent as the `key` parameter).
    ///
    /// Keyless access works for small volumes; the key raises the daily quota.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Point the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one raw table.
    ///
    /// # Errors
    /// Returns `DataError::CensusApi` on non-success status codes, an empty
    /// (204) response, or a body that is not the expected JSON shape.
    pub async fn fetch_table(&self, query: &CensusQuery) -> Result<CensusTable> {
        query.geography.validate()?;

        self.rate_limiter.lock().await.wait().await;

        let url = format!("{}/{}", self.base_url, query.path());
        debug!(%url, geography = %query.geography, "requesting census table");

        let response = self
            .client
            .get(&url)
            .query(&query.query_params(self.api_key.as_deref()))
            .send()
            .await
            .map_err(DataError::Network)?;

        let status = response.status();
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(DataError::CensusApi(format!(
                "no data for {} in {}",
                query.geography,
                query.path()
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::CensusApi(format!(
                "HTTP {} for {}: {}",
                status,
                query.geography,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DataError::CensusApi(format!("Failed to read response body: {}", e)))?;

        CensusTable::from_json(&body).map_err(|e| {
            DataError::CensusApi(format!(
                "Unexpected response for {} ({}): {}",
                query.geography,
                e,
                body.chars().take(200).collect::<String>()
            ))
        })
    }

    /// Fetch a table and parse it into tracts.
    pub async fn fetch_tracts(&self, query: &CensusQuery) -> Result<TractSet> {
        let table = self.fetch_table(query).await?;
        let (tracts, report) = tracts_from_table(&table)?;
        info!(
            geography = %query.geography,
            rows = report.total_rows,
            kept = report.kept,
            dropped = report.dropped(),
            "parsed census tracts"
        );
        Ok(tracts)
    }
}

impl std::fmt::Debug for CensusClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CensusClient")
            .field("base_url", &self.base_url)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_from_json() {
        let body = r#"[["NAME","B19083_001E","state"],["Tract 1, Alameda County, California","0.4213","06"],["Tract 2, Alameda County, California",null,"06"]]"#;
        let table = CensusTable::from_json(body).unwrap();
        assert_eq!(table.header, vec!["NAME", "B19083_001E", "state"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1].as_deref(), Some("0.4213"));
        assert_eq!(table.rows[1][1], None);
        assert_eq!(table.column_index("state"), Some(2));
    }

    #[test]
    fn test_table_numeric_cells_kept_as_text() {
        let body = r#"[["B25077_001E"],[550000],[-666666666]]"#;
        let table = CensusTable::from_json(body).unwrap();
        assert_eq!(table.rows[0][0].as_deref(), Some("550000"));
        assert_eq!(table.rows[1][0].as_deref(), Some("-666666666"));
    }

    #[test]
    fn test_table_ragged_rows_rejected() {
        let body = r#"[["a","b"],["1"]]"#;
        assert!(matches!(
            CensusTable::from_json(body),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_table_empty_body_rejected() {
        assert!(CensusTable::from_json("[]").is_err());
        assert!(CensusTable::from_json("not json").is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_spacing() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[test]
    fn test_client_configuration() {
        let client = CensusClient::new()
            .unwrap()
            .with_api_key("abc")
            .with_base_url("http://localhost:9999/data/");
        assert_eq!(client.base_url(), "http://localhost:9999/data");
        assert!(format!("{:?}", client).contains("has_api_key: true"));
    }
}
