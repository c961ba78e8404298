//! Pipeline stages behind the CLI commands.

pub(crate) mod analysis;
pub(crate) mod cache_manager;
pub(crate) mod config;
pub(crate) mod data_pipeline;
pub(crate) mod report_builder;
