//! Cache manager for census tracts.
//!
//! Opens the SQLite cache at a platform-specific default location.

use gini_data::DataError;
use gini_data::cache::SqliteCache;
use std::path::PathBuf;

/// Get the default cache directory path.
///
/// Uses platform-specific cache directories:
/// - Linux: `~/.cache/gini/`
/// - macOS: `~/Library/Caches/gini/`
/// - Windows: `%LOCALAPPDATA%\gini\`
pub(crate) fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gini")
}

/// Get the default cache database path.
pub(crate) fn default_cache_path() -> PathBuf {
    default_cache_dir().join("gini.db")
}

/// Open the cache, creating the directory if needed.
pub(crate) fn open_cache() -> Result<SqliteCache, DataError> {
    let cache_path = default_cache_path();

    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    SqliteCache::new(&cache_path)
}

/// Print cache location and contents.
pub(crate) fn print_cache_info() -> Result<(), DataError> {
    let cache = open_cache()?;
    let stats = cache.stats()?;
    println!("Cache location: {}", default_cache_path().display());
    println!("  Tracts:    {}", stats.total_tracts);
    println!("  Counties:  {}", stats.unique_counties);
    println!("  Fetches:   {}", stats.fetches);
    if !stats.years.is_empty() {
        let years: Vec<String> = stats.years.iter().map(u16::to_string).collect();
        println!("  Years:     {}", years.join(", "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_path_layout() {
        let path = default_cache_path();
        assert!(path.ends_with("gini/gini.db"));
        assert_eq!(path.parent(), Some(default_cache_dir().as_path()));
    }
}
