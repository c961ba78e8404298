//! Application configuration.
//!
//! Loaded from a TOML file when `--config` is given; every field has a
//! default so a partial file (or none at all) is fine.
//!
//! ```toml
//! [census]
//! year = 2019
//! survey = "acs5"
//!
//! [model]
//! chains = 4
//! include_home_value = true
//!
//! [output]
//! report = "out/gini.html"
//! ```

use gini_data::census::Survey;
use gini_models::{MultilevelConfig, SimpsonAnalysis};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the census API key.
pub(crate) const API_KEY_ENV: &str = "CENSUS_API_KEY";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    /// Config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Config file is not valid TOML for [`AppConfig`].
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Census download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CensusSettings {
    /// ACS end year.
    pub year: u16,
    /// ACS product.
    pub survey: Survey,
    /// Two-digit state FIPS code.
    pub state: String,
    /// API key; the environment variable takes precedence.
    pub api_key: Option<String>,
    /// Minimum milliseconds between requests.
    pub request_interval_ms: u64,
    /// Concurrent per-county requests.
    pub concurrency: usize,
    /// Alternative API root, e.g. a mirror.
    pub base_url: Option<String>,
}

impl Default for CensusSettings {
    fn default() -> Self {
        Self {
            year: 2019,
            survey: Survey::Acs5,
            state: gini::geography::CALIFORNIA_FIPS.to_string(),
            api_key: None,
            request_interval_ms: 200,
            concurrency: 8,
            base_url: None,
        }
    }
}

impl CensusSettings {
    /// Minimum interval between requests.
    pub(crate) const fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

/// Model settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ModelSettings {
    /// Minimum tracts for a county to get its own slope.
    pub min_tracts: usize,
    /// Sampling chains.
    pub chains: usize,
    /// Iterations per chain, warmup included.
    pub iterations: usize,
    /// Warmup iterations per chain.
    pub warmup: usize,
    /// Base random seed.
    pub seed: u64,
    /// Adjust county estimates for home value.
    pub include_home_value: bool,
}

impl Default for ModelSettings {
    fn default() -> Self {
        let multilevel = MultilevelConfig::default();
        Self {
            min_tracts: SimpsonAnalysis::default().min_tracts,
            chains: multilevel.chains,
            iterations: multilevel.iterations,
            warmup: multilevel.warmup,
            seed: multilevel.seed,
            include_home_value: multilevel.include_home_value,
        }
    }
}

impl ModelSettings {
    /// Sampler configuration.
    pub(crate) fn multilevel(&self) -> MultilevelConfig {
        MultilevelConfig {
            chains: self.chains,
            iterations: self.iterations,
            warmup: self.warmup,
            seed: self.seed,
            include_home_value: self.include_home_value,
            ..MultilevelConfig::default()
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct OutputSettings {
    /// HTML report path.
    pub report: PathBuf,
    /// Counties highlighted in the scatter plot.
    pub highlight: Vec<String>,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            report: PathBuf::from("gini-report.html"),
            highlight: vec!["San Francisco County".to_string(), "Fresno County".to_string()],
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub census: CensusSettings,
    pub model: ModelSettings,
    pub output: OutputSettings,
}

impl AppConfig {
    /// Load from `path`, or defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text.
    pub(crate) fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Check ranges that serde cannot express.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.census.state.len() != 2 || !self.census.state.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "census.state must be a two-digit FIPS code, got {:?}",
                self.census.state
            )));
        }
        if self.census.concurrency == 0 {
            return Err(ConfigError::Invalid("census.concurrency must be positive".to_string()));
        }
        self.model
            .multilevel()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// API key from the environment, falling back to the file.
    pub(crate) fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.census.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.census.state, "06");
        assert_eq!(config.census.survey, Survey::Acs5);
        assert_eq!(config.model.chains, 4);
        assert_eq!(config.model.min_tracts, 10);
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::from_toml(
            r#"
            [census]
            year = 2021
            survey = "acs1"

            [model]
            include_home_value = true
            "#,
        )
        .unwrap();
        assert_eq!(config.census.year, 2021);
        assert_eq!(config.census.survey, Survey::Acs1);
        assert_eq!(config.census.request_interval_ms, 200);
        assert!(config.model.include_home_value);
        assert_eq!(config.model.warmup, 1000);
        assert_eq!(config.output.report, PathBuf::from("gini-report.html"));
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.census.state = "California".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.model.warmup = config.model.iterations;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_survey_rejected() {
        let result = AppConfig::from_toml("[census]\nsurvey = \"decennial\"\n");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }
}
