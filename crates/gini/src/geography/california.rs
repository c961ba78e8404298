//! California counties.

use super::{County, Region};

/// California state FIPS code.
pub const CALIFORNIA_FIPS: &str = "06";

const fn county(fips: &'static str, name: &'static str) -> County {
    County { fips, name }
}

const COUNTIES: [County; 58] = [
    county("001", "Alameda County"),
    county("003", "Alpine County"),
    county("005", "Amador County"),
    county("007", "Butte County"),
    county("009", "Calaveras County"),
    county("011", "Colusa County"),
    county("013", "Contra Costa County"),
    county("015", "Del Norte County"),
    county("017", "El Dorado County"),
    county("019", "Fresno County"),
    county("021", "Glenn County"),
    county("023", "Humboldt County"),
    county("025", "Imperial County"),
    county("027", "Inyo County"),
    county("029", "Kern County"),
    county("031", "Kings County"),
    county("033", "Lake County"),
    county("035", "Lassen County"),
    county("037", "Los Angeles County"),
    county("039", "Madera County"),
    county("041", "Marin County"),
    county("043", "Mariposa County"),
    county("045", "Mendocino County"),
    county("047", "Merced County"),
    county("049", "Modoc County"),
    county("051", "Mono County"),
    county("053", "Monterey County"),
    county("055", "Napa County"),
    county("057", "Nevada County"),
    county("059", "Orange County"),
    county("061", "Placer County"),
    county("063", "Plumas County"),
    county("065", "Riverside County"),
    county("067", "Sacramento County"),
    county("069", "San Benito County"),
    county("071", "San Bernardino County"),
    county("073", "San Diego County"),
    county("075", "San Francisco County"),
    county("077", "San Joaquin County"),
    county("079", "San Luis Obispo County"),
    county("081", "San Mateo County"),
    county("083", "Santa Barbara County"),
    county("085", "Santa Clara County"),
    county("087", "Santa Cruz County"),
    county("089", "Shasta County"),
    county("091", "Sierra County"),
    county("093", "Siskiyou County"),
    county("095", "Solano County"),
    county("097", "Sonoma County"),
    county("099", "Stanislaus County"),
    county("101", "Sutter County"),
    county("103", "Tehama County"),
    county("105", "Trinity County"),
    county("107", "Tulare County"),
    county("109", "Tuolumne County"),
    county("111", "Ventura County"),
    county("113", "Yolo County"),
    county("115", "Yuba County"),
];

/// The 58 counties of California.
#[derive(Debug, Clone, Copy, Default)]
pub struct California;

impl California {
    /// Create the county table.
    pub const fn new() -> Self {
        Self
    }
}

impl Region for California {
    fn state_fips(&self) -> &'static str {
        CALIFORNIA_FIPS
    }

    fn counties(&self) -> &[County] {
        &COUNTIES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_county_table() {
        let ca = California::new();
        assert_eq!(ca.size(), 58);
        // FIPS codes are the odd numbers 001..=115
        for (i, county) in ca.counties().iter().enumerate() {
            assert_eq!(county.fips, format!("{:03}", 2 * i + 1));
            assert!(county.name.ends_with(" County"));
        }
    }

    #[rstest]
    #[case("037", "Los Angeles County")]
    #[case("los angeles", "Los Angeles County")]
    #[case("San Francisco County", "San Francisco County")]
    #[case("  marin ", "Marin County")]
    fn test_resolve(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(California.resolve(key).map(|c| c.name), Some(expected));
    }

    #[test]
    fn test_unknown_county() {
        assert!(California.resolve("Cook").is_none());
        assert!(California.by_fips("002").is_none());
    }

    #[test]
    fn test_geographies() {
        let ca = California::new();
        let alpine = ca.by_name("Alpine").copied().unwrap();
        assert_eq!(alpine.short_name(), "Alpine");
        assert_eq!(ca.county_geography(&alpine).geoid_prefix(), "06003");
        assert_eq!(ca.state_geography().geoid_prefix(), "06");
    }
}
