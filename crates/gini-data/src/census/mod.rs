//! Census statistics API access.
//!
//! This module provides access to American Community Survey tables:
//! - Query construction by year, survey and geography
//! - A rate-limited async client returning raw tables
//! - Parsing of tables into validated [`TractSet`](crate::TractSet)s
//!
//! # Example
//!
//! ```no_run
//! use gini_data::census::{CensusClient, CensusQuery, Geography};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CensusClient::new()?;
//!     let query = CensusQuery::builder()
//!         .year(2019)
//!         .geography(Geography::tracts_in_state("06"))
//!         .build()?;
//!     let tracts = client.fetch_tracts(&query).await?;
//!     println!("Fetched {} tracts", tracts.len());
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod parse;
pub mod query;

pub use client::{CensusClient, CensusTable};
pub use parse::{ParseReport, tracts_from_table};
pub use query::{CensusQuery, CensusQueryBuilder, Geography, Survey, variables};
