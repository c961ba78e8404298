#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gini/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod report;
pub mod summary;
pub mod svg;
pub mod table;

pub use export::{EstimateRecord, ExportError, ExportFormat, Exporter};
pub use report::{Block, Report, ReportBuilder, ReportError, Section};
pub use summary::{RegressionSummary, county_slope_table, multilevel_table, simpson_table};
pub use svg::{DagPlot, IntervalPlot, ScatterPlot};
pub use table::Table;
