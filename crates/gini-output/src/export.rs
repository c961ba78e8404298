//! Export functionality for county estimates and pooling results.
//!
//! CSV output is long format: one row per county and estimation method, with
//! the method written as its display label.

use gini_models::{CountyEstimate, CountySlope, EstimateComparison, SimpsonReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Comma-separated values format.
    #[default]
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Infer the format from a file extension (`.csv` or `.json`).
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(format!(
                "cannot infer export format from extension {:?}",
                other.unwrap_or("")
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Json => write!(f, "json"),
            Self::PrettyJson => write!(f, "pretty-json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Flat county estimate row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EstimateRecord {
    /// County name.
    pub county: String,
    /// Method label, e.g. "Multilevel Model".
    pub method: String,
    /// Point estimate of the Gini Index.
    pub estimate: f64,
    /// Lower interval bound.
    pub lower: f64,
    /// Upper interval bound.
    pub upper: f64,
    /// Tracts behind the estimate.
    pub n_tracts: usize,
}

impl From<&CountyEstimate> for EstimateRecord {
    fn from(e: &CountyEstimate) -> Self {
        Self {
            county: e.county.clone(),
            method: e.method.label().to_string(),
            estimate: e.estimate,
            lower: e.lower,
            upper: e.upper,
            n_tracts: e.n_tracts,
        }
    }
}

fn csv_string<T: Serialize>(records: impl IntoIterator<Item = T>) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for record in records {
        wtr.serialize(record)?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

impl Exporter for [CountyEstimate] {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let records: Vec<EstimateRecord> = self.iter().map(EstimateRecord::from).collect();
        match format {
            ExportFormat::Csv => csv_string(&records),
            ExportFormat::Json => Ok(serde_json::to_string(&records)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&records)?),
        }
    }
}

impl Exporter for EstimateComparison {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        self.estimates().export_to_string(format)
    }
}

/// Pooling analysis summary for JSON export.
#[derive(Debug, Serialize)]
struct SimpsonExport<'a> {
    pooled_slope: f64,
    within_slope: f64,
    between_slope: Option<f64>,
    reversal: bool,
    n_opposite: usize,
    county_slopes: &'a [CountySlope],
}

impl Exporter for SimpsonReport {
    /// CSV holds the per-county slopes; JSON also carries the summary slopes.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        let summary = SimpsonExport {
            pooled_slope: self.pooled_slope.estimate,
            within_slope: self.within_slope.estimate,
            between_slope: self.between_slope.as_ref().map(|c| c.estimate),
            reversal: self.reversal,
            n_opposite: self.n_opposite,
            county_slopes: &self.county_slopes,
        };
        match format {
            ExportFormat::Csv => csv_string(&self.county_slopes),
            ExportFormat::Json => Ok(serde_json::to_string(&summary)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&summary)?),
        }
    }
}
