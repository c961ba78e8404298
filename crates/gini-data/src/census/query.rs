//! Census API query construction.

use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ACS variable codes used by the report.
pub mod variables {
    /// Geographic area name, e.g. "Census Tract 4001, Alameda County, California".
    pub const NAME: &str = "NAME";
    /// Gini Index of income inequality (table B19083).
    pub const GINI_INDEX: &str = "B19083_001E";
    /// Median value of owner-occupied housing units, dollars (table B25077).
    pub const MEDIAN_HOME_VALUE: &str = "B25077_001E";

    /// Variables requested by default.
    pub const DEFAULT: [&str; 3] = [NAME, GINI_INDEX, MEDIAN_HOME_VALUE];
}

/// First ACS year with 5-year tract estimates.
const FIRST_ACS_YEAR: u16 = 2009;

/// American Community Survey product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Survey {
    /// 5-year estimates (all tracts).
    #[default]
    Acs5,
    /// 1-year estimates (large geographies only).
    Acs1,
}

impl Survey {
    /// API path segment, e.g. `acs/acs5`.
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Acs5 => "acs/acs5",
            Self::Acs1 => "acs/acs1",
        }
    }

    /// Short code used in cache keys.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Acs5 => "acs5",
            Self::Acs1 => "acs1",
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Survey {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "acs5" | "acs/acs5" | "5" => Ok(Self::Acs5),
            "acs1" | "acs/acs1" | "1" => Ok(Self::Acs1),
            _ => Err(DataError::Parse(format!("Unknown survey: {}", s))),
        }
    }
}

/// Tract geography to request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Geography {
    /// Every tract in a state.
    TractsInState {
        /// 2-digit state FIPS code
        state: String,
    },
    /// Every tract in one county.
    TractsInCounty {
        /// 2-digit state FIPS code
        state: String,
        /// 3-digit county FIPS code
        county: String,
    },
}

impl Geography {
    /// All tracts in `state`.
    pub fn tracts_in_state(state: impl Into<String>) -> Self {
        Self::TractsInState {
            state: state.into(),
        }
    }

    /// All tracts in `county` of `state`.
    pub fn tracts_in_county(state: impl Into<String>, county: impl Into<String>) -> Self {
        Self::TractsInCounty {
            state: state.into(),
            county: county.into(),
        }
    }

    /// State FIPS code.
    pub fn state(&self) -> &str {
        match self {
            Self::TractsInState { state } | Self::TractsInCounty { state, .. } => state,
        }
    }

    /// County FIPS code, if restricted to a county.
    pub fn county(&self) -> Option<&str> {
        match self {
            Self::TractsInState { .. } => None,
            Self::TractsInCounty { county, .. } => Some(county),
        }
    }

    /// GEOID prefix shared by every tract in this geography.
    pub fn geoid_prefix(&self) -> String {
        match self {
            Self::TractsInState { state } => state.clone(),
            Self::TractsInCounty { state, county } => format!("{}{}", state, county),
        }
    }

    /// Check FIPS code shapes.
    pub fn validate(&self) -> Result<()> {
        let digits = |s: &str, n: usize| s.len() == n && s.bytes().all(|b| b.is_ascii_digit());
        if !digits(self.state(), 2) {
            return Err(DataError::InvalidGeography(format!(
                "state FIPS must be 2 digits, got {:?}",
                self.state()
            )));
        }
        if let Some(county) = self.county()
            && !digits(county, 3)
        {
            return Err(DataError::InvalidGeography(format!(
                "county FIPS must be 3 digits, got {:?}",
                county
            )));
        }
        Ok(())
    }

    /// `for`/`in` query parameters.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        let within = match self {
            Self::TractsInState { state } => format!("state:{}", state),
            Self::TractsInCounty { state, county } => format!("state:{} county:{}", state, county),
        };
        [("for", "tract:*".to_string()), ("in", within)]
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TractsInState { state } => write!(f, "tracts in state {}", state),
            Self::TractsInCounty { state, county } => {
                write!(f, "tracts in county {}{}", state, county)
            }
        }
    }
}

/// A request for one census table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusQuery {
    /// Survey end year.
    pub year: u16,
    /// Survey product.
    pub survey: Survey,
    /// Variable codes to request.
    pub variables: Vec<String>,
    /// Geography to request.
    pub geography: Geography,
}

impl CensusQuery {
    /// Start building a query.
    pub fn builder() -> CensusQueryBuilder {
        CensusQueryBuilder::default()
    }

    /// Path below the API base URL, e.g. `2019/acs/acs5`.
    pub fn path(&self) -> String {
        format!("{}/{}", self.year, self.survey.path())
    }

    /// Full query string parameters, with the API key when given.
    pub fn query_params(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![("get", self.variables.join(","))];
        params.extend(self.geography.query_params());
        if let Some(key) = api_key {
            params.push(("key", key.to_string()));
        }
        params
    }
}

/// Builder for [`CensusQuery`].
#[derive(Debug, Default)]
pub struct CensusQueryBuilder {
    year: Option<u16>,
    survey: Survey,
    variables: Option<Vec<String>>,
    geography: Option<Geography>,
}

impl CensusQueryBuilder {
    /// Set the survey end year.
    pub const fn year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Set the survey product.
    pub const fn survey(mut self, survey: Survey) -> Self {
        self.survey = survey;
        self
    }

    /// Override the requested variables.
    pub fn variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = Some(variables.into_iter().map(Into::into).collect());
        self
    }

    /// Set the geography.
    pub fn geography(mut self, geography: Geography) -> Self {
        self.geography = Some(geography);
        self
    }

    /// Build the query.
    ///
    /// # Errors
    /// Fails when the year or geography is missing or malformed.
    pub fn build(self) -> Result<CensusQuery> {
        let year = self
            .year
            .ok_or_else(|| DataError::Parse("census query requires a year".to_string()))?;
        if year < FIRST_ACS_YEAR {
            return Err(DataError::Parse(format!(
                "ACS tables start in {}, got {}",
                FIRST_ACS_YEAR, year
            )));
        }
        let geography = self
            .geography
            .ok_or_else(|| DataError::InvalidGeography("census query requires a geography".to_string()))?;
        geography.validate()?;

        let variables = self
            .variables
            .unwrap_or_else(|| variables::DEFAULT.iter().map(|v| v.to_string()).collect());
        if variables.is_empty() {
            return Err(DataError::Parse("census query requires variables".to_string()));
        }

        Ok(CensusQuery {
            year,
            survey: self.survey,
            variables,
            geography,
        })
    }
}
