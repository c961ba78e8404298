//! Caching layer for census tracts.

pub mod sqlite;

pub use sqlite::{CacheStats, SqliteCache};
