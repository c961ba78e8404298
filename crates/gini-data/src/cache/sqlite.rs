//! SQLite caching layer for census tracts.

use crate::census::{Geography, Survey};
use crate::error::{DataError, Result};
use crate::tract::{Tract, TractSet};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SQLite cache for census tracts.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Connection,
}

impl SqliteCache {
    /// Create a new SQLite cache.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS tracts (
                year INTEGER NOT NULL,
                survey TEXT NOT NULL,
                geoid TEXT NOT NULL,
                county TEXT NOT NULL,
                gini REAL NOT NULL,
                median_home_value REAL NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (year, survey, geoid)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_tracts_county ON tracts(year, survey, county)",
            [],
        )?;

        // One row per fetched geography; a state row covers all of its counties
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS fetches (
                year INTEGER NOT NULL,
                survey TEXT NOT NULL,
                geography TEXT NOT NULL,
                row_count INTEGER NOT NULL,
                fetched_at TEXT NOT NULL,
                PRIMARY KEY (year, survey, geography)
            )",
            [],
        )?;

        Ok(())
    }

    /// Check whether a geography has been fetched for a year and survey.
    ///
    /// A state-level fetch also covers every county in that state.
    pub fn has_geography(&self, year: u16, survey: Survey, geography: &Geography) -> Result<bool> {
        let state_key = geography.state().to_string();
        let exact_key = geography.geoid_prefix();

        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM fetches
             WHERE year = ?1 AND survey = ?2 AND geography IN (?3, ?4)",
            params![year, survey.code(), state_key, exact_key],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// When a geography was last fetched, if ever.
    pub fn fetched_at(
        &self,
        year: u16,
        survey: Survey,
        geography: &Geography,
    ) -> Result<Option<DateTime<Utc>>> {
        let fetched: Option<String> = self
            .conn
            .query_row(
                "SELECT fetched_at FROM fetches
                 WHERE year = ?1 AND survey = ?2 AND geography = ?3",
                params![year, survey.code(), geography.geoid_prefix()],
                |row| row.get(0),
            )
            .optional()?;

        fetched
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| DataError::Cache(format!("Invalid timestamp {}: {}", s, e)))
            })
            .transpose()
    }

    /// Get cached tracts for a geography, ordered by GEOID.
    pub fn get_tracts(&self, year: u16, survey: Survey, geography: &Geography) -> Result<TractSet> {
        let mut stmt = self.conn.prepare(
            "SELECT geoid, county, gini, median_home_value
             FROM tracts
             WHERE year = ?1 AND survey = ?2 AND geoid LIKE ?3
             ORDER BY geoid ASC",
        )?;

        let pattern = format!("{}%", geography.geoid_prefix());
        let rows = stmt.query_map(params![year, survey.code(), pattern], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut tracts = Vec::new();
        for row in rows {
            let (geoid, county, gini, value) = row?;
            tracts.push(Tract::new(geoid, county, gini, value)?);
        }

        Ok(TractSet::new(tracts))
    }

    /// Replace the tracts stored for a geography and record the fetch.
    pub fn put_tracts(
        &self,
        year: u16,
        survey: Survey,
        geography: &Geography,
        tracts: &TractSet,
    ) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let prefix = geography.geoid_prefix();

        if let Some(stray) = tracts.iter().find(|t| !t.geoid.starts_with(&prefix)) {
            return Err(DataError::Cache(format!(
                "tract {} is outside {}",
                stray.geoid, geography
            )));
        }

        let tx = self.conn.unchecked_transaction()?;

        // Tracts dropped by a newer fetch must not linger.
        tx.execute(
            "DELETE FROM tracts WHERE year = ?1 AND survey = ?2 AND geoid LIKE ?3",
            params![year, survey.code(), format!("{}%", prefix)],
        )?;

        for tract in tracts {
            tx.execute(
                "INSERT OR REPLACE INTO tracts
                 (year, survey, geoid, county, gini, median_home_value, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    year,
                    survey.code(),
                    tract.geoid,
                    tract.county,
                    tract.gini,
                    tract.median_home_value,
                    cached_at
                ],
            )?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO fetches (year, survey, geography, row_count, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![year, survey.code(), prefix, tracts.len() as i64, cached_at],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Get cache statistics.
    pub fn stats(&self) -> Result<CacheStats> {
        let total_tracts: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM tracts", [], |row| row.get(0))?;

        let unique_counties: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT county) FROM tracts",
            [],
            |row| row.get(0),
        )?;

        let fetches: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fetches", [], |row| row.get(0))?;

        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT year FROM tracts ORDER BY year ASC")?;
        let years = stmt
            .query_map([], |row| row.get::<_, u16>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            total_tracts: total_tracts as usize,
            unique_counties: unique_counties as usize,
            fetches: fetches as usize,
            years,
        })
    }

    /// Remove every cached tract and fetch record.
    pub fn clear(&self) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM tracts", [])?;
        tx.execute("DELETE FROM fetches", [])?;
        tx.commit()?;
        Ok(())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Total number of tract records
    pub total_tracts: usize,
    /// Number of distinct county names
    pub unique_counties: usize,
    /// Number of recorded fetches
    pub fetches: usize,
    /// Survey years present
    pub years: Vec<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alameda() -> TractSet {
        vec![
            Tract::new("06001400100", "Alameda County", 0.42, 900_000.0).unwrap(),
            Tract::new("06001400200", "Alameda County", 0.38, 700_000.0).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[test]
    fn test_put_and_get_county() {
        let cache = SqliteCache::in_memory().unwrap();
        let geography = Geography::tracts_in_county("06", "001");

        assert!(!cache.has_geography(2019, Survey::Acs5, &geography).unwrap());
        cache
            .put_tracts(2019, Survey::Acs5, &geography, &alameda())
            .unwrap();
        assert!(cache.has_geography(2019, Survey::Acs5, &geography).unwrap());
        assert!(!cache.has_geography(2020, Survey::Acs5, &geography).unwrap());
        assert!(!cache.has_geography(2019, Survey::Acs1, &geography).unwrap());

        let tracts = cache.get_tracts(2019, Survey::Acs5, &geography).unwrap();
        assert_eq!(tracts, alameda());
        assert!(
            cache
                .fetched_at(2019, Survey::Acs5, &geography)
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_state_fetch_covers_counties() {
        let cache = SqliteCache::in_memory().unwrap();
        let state = Geography::tracts_in_state("06");
        cache.put_tracts(2019, Survey::Acs5, &state, &alameda()).unwrap();

        let county = Geography::tracts_in_county("06", "001");
        assert!(cache.has_geography(2019, Survey::Acs5, &county).unwrap());
        assert_eq!(cache.get_tracts(2019, Survey::Acs5, &county).unwrap().len(), 2);

        let other = Geography::tracts_in_county("06", "003");
        assert!(cache.get_tracts(2019, Survey::Acs5, &other).unwrap().is_empty());
    }

    #[test]
    fn test_put_rejects_tracts_outside_geography() {
        let cache = SqliteCache::in_memory().unwrap();
        let geography = Geography::tracts_in_county("06", "003");
        let result = cache.put_tracts(2019, Survey::Acs5, &geography, &alameda());
        assert!(matches!(result, Err(DataError::Cache(_))));
    }

    #[test]
    fn test_put_replaces_previous_fetch() {
        let cache = SqliteCache::in_memory().unwrap();
        let geography = Geography::tracts_in_county("06", "001");
        cache
            .put_tracts(2019, Survey::Acs5, &geography, &alameda())
            .unwrap();

        let refetched: TractSet =
            vec![Tract::new("06001400100", "Alameda County", 0.44, 950_000.0).unwrap()]
                .into_iter()
                .collect();
        cache
            .put_tracts(2019, Survey::Acs5, &geography, &refetched)
            .unwrap();

        let tracts = cache.get_tracts(2019, Survey::Acs5, &geography).unwrap();
        assert_eq!(tracts, refetched);

        // Other years and neighbouring counties are untouched.
        cache
            .put_tracts(2020, Survey::Acs5, &geography, &alameda())
            .unwrap();
        let other = Geography::tracts_in_county("06", "003");
        cache
            .put_tracts(2019, Survey::Acs5, &other, &TractSet::default())
            .unwrap();
        assert_eq!(cache.get_tracts(2019, Survey::Acs5, &geography).unwrap().len(), 1);
        assert_eq!(cache.get_tracts(2020, Survey::Acs5, &geography).unwrap().len(), 2);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = SqliteCache::in_memory().unwrap();
        let geography = Geography::tracts_in_county("06", "001");
        cache
            .put_tracts(2019, Survey::Acs5, &geography, &alameda())
            .unwrap();

        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_tracts, 2);
        assert_eq!(stats.unique_counties, 1);
        assert_eq!(stats.fetches, 1);
        assert_eq!(stats.years, vec![2019]);

        cache.clear().unwrap();
        assert_eq!(cache.stats().unwrap().total_tracts, 0);
    }
}
