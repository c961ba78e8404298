//! Geography tables.
//!
//! Counties are identified by their three-digit FIPS code within a state.
//! The census client accepts any state; only California is tabulated here.

pub mod california;

pub use california::{CALIFORNIA_FIPS, California};

use gini_data::census::Geography;
use serde::Serialize;

/// A county within a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct County {
    /// Three-digit county FIPS code.
    pub fips: &'static str,
    /// Full county name as the census labels it, e.g. "Alameda County".
    pub name: &'static str,
}

impl County {
    /// Name without the trailing " County".
    pub fn short_name(&self) -> &'static str {
        self.name.strip_suffix(" County").unwrap_or(self.name)
    }
}

/// Trait for state-level county tables.
pub trait Region {
    /// Two-digit state FIPS code.
    fn state_fips(&self) -> &'static str;

    /// Every county, ordered by FIPS code.
    fn counties(&self) -> &[County];

    /// Look up a county by FIPS code.
    fn by_fips(&self, fips: &str) -> Option<&County> {
        self.counties().iter().find(|c| c.fips == fips)
    }

    /// Look up a county by name, with or without the " County" suffix,
    /// ignoring case.
    fn by_name(&self, name: &str) -> Option<&County> {
        let name = name.trim();
        self.counties().iter().find(|c| {
            c.name.eq_ignore_ascii_case(name) || c.short_name().eq_ignore_ascii_case(name)
        })
    }

    /// Resolve a county given as a FIPS code or a name.
    fn resolve(&self, key: &str) -> Option<&County> {
        self.by_fips(key).or_else(|| self.by_name(key))
    }

    /// Number of counties.
    fn size(&self) -> usize {
        self.counties().len()
    }

    /// Census geography for every tract in the state.
    fn state_geography(&self) -> Geography {
        Geography::tracts_in_state(self.state_fips())
    }

    /// Census geography for every tract in one county.
    fn county_geography(&self, county: &County) -> Geography {
        Geography::tracts_in_county(self.state_fips(), county.fips)
    }
}
