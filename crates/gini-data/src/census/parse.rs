//! Conversion of raw census tables into tract records.
//!
//! The API encodes suppressed or unavailable estimates as large negative
//! sentinels (for example `-666666666`), or as `null`. Any such cell marks
//! the row as missing and the row is dropped and counted.

use super::client::CensusTable;
use super::query::variables;
use crate::error::{DataError, Result};
use crate::tract::{Tract, TractSet};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Row accounting for a parsed table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    /// Data rows in the table
    pub total_rows: usize,
    /// Rows turned into tracts
    pub kept: usize,
    /// Rows without a usable Gini Index
    pub missing_gini: usize,
    /// Rows without a usable median home value
    pub missing_home_value: usize,
    /// Rows with values outside the valid ranges
    pub invalid: usize,
}

impl ParseReport {
    /// Rows dropped for any reason.
    pub const fn dropped(&self) -> usize {
        self.missing_gini + self.missing_home_value + self.invalid
    }
}

/// Parse a numeric cell, treating nulls, blanks and negative sentinels as missing.
pub fn parse_estimate(cell: Option<&str>) -> Option<f64> {
    let value: f64 = cell?.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value)
}

/// Extract the county name from a tract `NAME`.
///
/// Handles both `"Census Tract 4001, Alameda County, California"` and the
/// newer `"Census Tract 4001; Alameda County; California"` forms.
pub fn county_from_name(name: &str) -> Option<String> {
    let separator = if name.contains(';') { ';' } else { ',' };
    let segments: Vec<&str> = name.split(separator).map(str::trim).collect();

    segments
        .iter()
        .find(|s| s.ends_with(" County"))
        .or_else(|| (segments.len() == 3).then(|| &segments[1]))
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

struct Columns {
    name: Option<usize>,
    gini: usize,
    home_value: usize,
    state: usize,
    county: usize,
    tract: usize,
}

impl Columns {
    fn locate(table: &CensusTable) -> Result<Self> {
        let required = |name: &str| {
            table.column_index(name).ok_or_else(|| {
                DataError::Parse(format!("census table is missing column {}", name))
            })
        };
        Ok(Self {
            name: table.column_index(variables::NAME),
            gini: required(variables::GINI_INDEX)?,
            home_value: required(variables::MEDIAN_HOME_VALUE)?,
            state: required("state")?,
            county: required("county")?,
            tract: required("tract")?,
        })
    }
}

/// Convert a census table into tracts.
///
/// # Errors
/// Fails only when required columns are absent; bad rows are dropped and
/// counted in the returned [`ParseReport`].
pub fn tracts_from_table(table: &CensusTable) -> Result<(TractSet, ParseReport)> {
    let columns = Columns::locate(table)?;
    let mut report = ParseReport {
        total_rows: table.len(),
        ..Default::default()
    };
    let mut tracts = Vec::with_capacity(table.len());

    for row in &table.rows {
        let cell = |i: usize| row.get(i).and_then(|c| c.as_deref());

        let state = cell(columns.state).unwrap_or_default();
        let county_fips = cell(columns.county).unwrap_or_default();
        let geoid = format!("{}{}{}", state, county_fips, cell(columns.tract).unwrap_or_default());

        let Some(gini) = parse_estimate(cell(columns.gini)) else {
            report.missing_gini += 1;
            continue;
        };
        let Some(home_value) = parse_estimate(cell(columns.home_value)).filter(|v| *v > 0.0)
        else {
            report.missing_home_value += 1;
            continue;
        };

        let county = columns
            .name
            .and_then(cell)
            .and_then(county_from_name)
            .unwrap_or_else(|| format!("County {}", county_fips));

        match Tract::new(geoid, county, gini, home_value) {
            Ok(tract) => tracts.push(tract),
            Err(e) => {
                warn!(error = %e, "dropping census row");
                report.invalid += 1;
            }
        }
    }

    report.kept = tracts.len();
    Ok((TractSet::new(tracts), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Some("0.4213"), Some(0.4213))]
    #[case(Some(" 550000 "), Some(550_000.0))]
    #[case(Some("-666666666"), None)]
    #[case(Some("-999999999"), None)]
    #[case(Some(""), None)]
    #[case(Some("N/A"), None)]
    #[case(None, None)]
    fn test_parse_estimate(#[case] cell: Option<&str>, #[case] expected: Option<f64>) {
        assert_eq!(parse_estimate(cell), expected);
    }

    #[rstest]
    #[case("Census Tract 4001, Alameda County, California", Some("Alameda County"))]
    #[case("Census Tract 4001; Alameda County; California", Some("Alameda County"))]
    #[case("Census Tract 9501, San Luis Obispo County, California", Some("San Luis Obispo County"))]
    #[case("Census Tract 1, Orleans Parish, Louisiana", Some("Orleans Parish"))]
    #[case("garbage", None)]
    fn test_county_from_name(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(county_from_name(name).as_deref(), expected);
    }

    #[test]
    fn test_missing_required_column() {
        let table = CensusTable {
            header: vec!["NAME".to_string(), "state".to_string()],
            rows: vec![],
        };
        assert!(matches!(
            tracts_from_table(&table),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_county_fallback_without_name() {
        let table = CensusTable {
            header: ["B19083_001E", "B25077_001E", "state", "county", "tract"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: vec![
                ["0.41", "450000", "06", "001", "400100"]
                    .iter()
                    .map(|s| Some(s.to_string()))
                    .collect(),
            ],
        };
        let (tracts, report) = tracts_from_table(&table).unwrap();
        assert_eq!(report.kept, 1);
        let tract = tracts.iter().next().unwrap();
        assert_eq!(tract.county, "County 001");
        assert_eq!(tract.geoid, "06001400100");
    }
}
