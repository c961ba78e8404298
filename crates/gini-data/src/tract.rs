//! Census tract records.
//!
//! A [`Tract`] pairs the Gini Index of a tract with its median home value.
//! [`TractSet`] is the owned collection every model works on; it groups
//! tracts by county and offers CSV and polars views of the same data.

use crate::error::{DataError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Divisor applied to median home values before modelling (dollars per unit).
pub const HOME_VALUE_SCALE: f64 = 100_000.0;

/// A single census tract observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tract {
    /// 11-digit GEOID (state + county + tract FIPS).
    pub geoid: String,
    /// County name, e.g. "Alameda County".
    pub county: String,
    /// Gini Index of household income inequality, in [0, 1].
    pub gini: f64,
    /// Median value of owner-occupied housing units, in dollars.
    pub median_home_value: f64,
}

impl Tract {
    /// Create a validated tract.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidTract`] when the Gini Index is outside
    /// `[0, 1]`, the home value is not strictly positive, or the county is empty.
    pub fn new(
        geoid: impl Into<String>,
        county: impl Into<String>,
        gini: f64,
        median_home_value: f64,
    ) -> Result<Self> {
        let tract = Self {
            geoid: geoid.into(),
            county: county.into(),
            gini,
            median_home_value,
        };
        tract.validate()?;
        Ok(tract)
    }

    fn validate(&self) -> Result<()> {
        let reason = if !(0.0..=1.0).contains(&self.gini) {
            Some(format!("gini {} outside [0, 1]", self.gini))
        } else if !(self.median_home_value.is_finite() && self.median_home_value > 0.0) {
            Some(format!(
                "median home value {} must be positive",
                self.median_home_value
            ))
        } else if self.county.trim().is_empty() {
            Some("empty county name".to_string())
        } else {
            None
        };

        match reason {
            Some(reason) => Err(DataError::InvalidTract {
                geoid: self.geoid.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Median home value in units of [`HOME_VALUE_SCALE`] dollars.
    pub fn home_value_scaled(&self) -> f64 {
        self.median_home_value / HOME_VALUE_SCALE
    }

    /// State FIPS code (first two GEOID digits).
    pub fn state_fips(&self) -> &str {
        self.geoid.get(..2).unwrap_or_default()
    }

    /// County FIPS code (GEOID digits 3-5).
    pub fn county_fips(&self) -> &str {
        self.geoid.get(2..5).unwrap_or_default()
    }
}

/// An owned collection of tracts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TractSet {
    tracts: Vec<Tract>,
}

impl TractSet {
    /// Create a tract set from already validated tracts.
    pub const fn new(tracts: Vec<Tract>) -> Self {
        Self { tracts }
    }

    /// Number of tracts.
    pub const fn len(&self) -> usize {
        self.tracts.len()
    }

    /// Whether the set holds no tracts.
    pub const fn is_empty(&self) -> bool {
        self.tracts.is_empty()
    }

    /// Iterate over the tracts.
    pub fn iter(&self) -> std::slice::Iter<'_, Tract> {
        self.tracts.iter()
    }

    /// Borrow the tracts as a slice.
    pub fn as_slice(&self) -> &[Tract] {
        &self.tracts
    }

    /// Append the tracts of another set.
    pub fn extend(&mut self, other: Self) {
        self.tracts.extend(other.tracts);
    }

    /// Sorted, de-duplicated county names.
    pub fn counties(&self) -> Vec<String> {
        self.tracts
            .iter()
            .map(|t| t.county.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Tracts grouped by county, ordered by county name.
    pub fn by_county(&self) -> BTreeMap<&str, Vec<&Tract>> {
        let mut groups: BTreeMap<&str, Vec<&Tract>> = BTreeMap::new();
        for tract in &self.tracts {
            groups.entry(tract.county.as_str()).or_default().push(tract);
        }
        groups
    }

    /// County names and, for every tract, the index of its county in that list.
    pub fn county_index(&self) -> (Vec<String>, Vec<usize>) {
        let counties = self.counties();
        let lookup: BTreeMap<&str, usize> = counties
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let groups = self
            .tracts
            .iter()
            .map(|t| lookup[t.county.as_str()])
            .collect();
        (counties, groups)
    }

    /// Keep only tracts from the named counties.
    pub fn filter_counties<S: AsRef<str>>(&self, counties: &[S]) -> Self {
        let wanted: BTreeSet<&str> = counties.iter().map(AsRef::as_ref).collect();
        Self::new(
            self.tracts
                .iter()
                .filter(|t| wanted.contains(t.county.as_str()))
                .cloned()
                .collect(),
        )
    }

    /// Keep only counties with at least `min_tracts` tracts.
    pub fn retain_min_tracts(&self, min_tracts: usize) -> Self {
        let keep: BTreeSet<String> = self
            .by_county()
            .into_iter()
            .filter(|(_, tracts)| tracts.len() >= min_tracts)
            .map(|(county, _)| county.to_string())
            .collect();
        Self::new(
            self.tracts
                .iter()
                .filter(|t| keep.contains(&t.county))
                .cloned()
                .collect(),
        )
    }

    /// Gini Index of every tract, in set order.
    pub fn ginis(&self) -> Vec<f64> {
        self.tracts.iter().map(|t| t.gini).collect()
    }

    /// Scaled home value of every tract, in set order.
    pub fn home_values_scaled(&self) -> Vec<f64> {
        self.tracts.iter().map(Tract::home_value_scaled).collect()
    }

    /// Read tracts from a CSV file with a header row.
    ///
    /// Every row is validated; the first invalid row aborts the read.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        Self::from_csv_reader(&mut reader)
    }

    /// Read tracts from any CSV reader.
    pub fn from_csv_reader<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Self> {
        let mut tracts = Vec::new();
        for record in reader.deserialize::<Tract>() {
            let tract = record?;
            tract.validate()?;
            tracts.push(tract);
        }
        Ok(Self::new(tracts))
    }

    /// Write tracts to a CSV file with a header row.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for tract in &self.tracts {
            writer.serialize(tract)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Polars view with one row per tract.
    ///
    /// Columns: `geoid`, `county`, `gini`, `median_home_value`, `home_value_scaled`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let geoids: Vec<&str> = self.tracts.iter().map(|t| t.geoid.as_str()).collect();
        let counties: Vec<&str> = self.tracts.iter().map(|t| t.county.as_str()).collect();
        let values: Vec<f64> = self.tracts.iter().map(|t| t.median_home_value).collect();

        let df = df!(
            "geoid" => geoids,
            "county" => counties,
            "gini" => self.ginis(),
            "median_home_value" => values,
            "home_value_scaled" => self.home_values_scaled(),
        )?;
        Ok(df)
    }

    /// Per-county summary, sorted by county.
    ///
    /// Columns: `county`, `tracts`, `mean_gini`, `mean_home_value`.
    pub fn county_summary(&self) -> Result<DataFrame> {
        let summary = self
            .to_dataframe()?
            .lazy()
            .group_by([col("county")])
            .agg([
                col("gini").count().alias("tracts"),
                col("gini").mean().alias("mean_gini"),
                col("median_home_value").mean().alias("mean_home_value"),
            ])
            .sort(["county"], SortMultipleOptions::default())
            .collect()?;
        Ok(summary)
    }
}

impl FromIterator<Tract> for TractSet {
    fn from_iter<I: IntoIterator<Item = Tract>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for TractSet {
    type Item = Tract;
    type IntoIter = std::vec::IntoIter<Tract>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracts.into_iter()
    }
}

impl<'a> IntoIterator for &'a TractSet {
    type Item = &'a Tract;
    type IntoIter = std::slice::Iter<'a, Tract>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn sample() -> TractSet {
        vec![
            Tract::new("06001400100", "Alameda County", 0.42, 900_000.0).unwrap(),
            Tract::new("06001400200", "Alameda County", 0.38, 700_000.0).unwrap(),
            Tract::new("06003010000", "Alpine County", 0.47, 350_000.0).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[rstest]
    #[case(-0.1, 100_000.0)]
    #[case(1.2, 100_000.0)]
    #[case(0.4, 0.0)]
    #[case(0.4, -666_666_666.0)]
    #[case(f64::NAN, 100_000.0)]
    fn test_invalid_tract_rejected(#[case] gini: f64, #[case] value: f64) {
        let result = Tract::new("06001400100", "Alameda County", gini, value);
        assert!(matches!(result, Err(DataError::InvalidTract { .. })));
    }

    #[test]
    fn test_scaled_value_and_fips() {
        let tract = Tract::new("06037101110", "Los Angeles County", 0.4, 550_000.0).unwrap();
        assert_relative_eq!(tract.home_value_scaled(), 5.5);
        assert_eq!(tract.state_fips(), "06");
        assert_eq!(tract.county_fips(), "037");
    }

    #[test]
    fn test_county_index() {
        let set = sample();
        let (counties, groups) = set.county_index();
        assert_eq!(counties, vec!["Alameda County", "Alpine County"]);
        assert_eq!(groups, vec![0, 0, 1]);
    }

    #[test]
    fn test_retain_and_filter() {
        let set = sample();
        assert_eq!(set.retain_min_tracts(2).len(), 2);
        assert_eq!(set.filter_counties(&["Alpine County"]).len(), 1);
        assert!(set.filter_counties(&["Nowhere County"]).is_empty());
    }

    #[test]
    fn test_csv_round_trip() {
        let set = sample();
        let mut writer = csv::Writer::from_writer(Vec::new());
        for tract in &set {
            writer.serialize(tract).unwrap();
        }
        let bytes = writer.into_inner().unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let parsed = TractSet::from_csv_reader(&mut reader).unwrap();
        assert_eq!(parsed, set);
    }

    #[test]
    fn test_csv_rejects_invalid_row() {
        let data = "geoid,county,gini,median_home_value\n06001400100,Alameda County,1.5,100000\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        assert!(TractSet::from_csv_reader(&mut reader).is_err());
    }

    #[test]
    fn test_county_summary() {
        let summary = sample().county_summary().unwrap();
        assert_eq!(summary.height(), 2);
        let mean_gini = summary.column("mean_gini").unwrap().f64().unwrap();
        assert_relative_eq!(mean_gini.get(0).unwrap(), 0.40, epsilon = 1e-12);
        assert_relative_eq!(mean_gini.get(1).unwrap(), 0.47, epsilon = 1e-12);
    }
}
