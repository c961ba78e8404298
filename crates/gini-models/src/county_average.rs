//! Raw county averages (no pooling).
//!
//! Each county is summarised by the mean Gini Index of its tracts, with a
//! Student-t interval `mean ± t(n-1) · sd / √n` built from that county's
//! own spread. Counties with a single tract get a degenerate interval.

use crate::error::{ModelError, Result};
use crate::estimate::{CountyEstimate, EstimationMethod};
use crate::interval::{DEFAULT_LEVEL, mean, sample_sd, t_critical};
use gini_data::TractSet;

/// Per-county mean estimator.
#[derive(Debug, Clone, Copy)]
pub struct CountyAverageEstimator {
    level: f64,
}

impl Default for CountyAverageEstimator {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl CountyAverageEstimator {
    /// Create an estimator with intervals at `level` coverage.
    pub const fn new(level: f64) -> Self {
        Self { level }
    }

    /// Estimate every county, ordered by county name.
    pub fn estimate(&self, tracts: &TractSet) -> Result<Vec<CountyEstimate>> {
        if tracts.is_empty() {
            return Err(ModelError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        tracts
            .by_county()
            .into_iter()
            .map(|(county, members)| {
                let ginis: Vec<f64> = members.iter().map(|t| t.gini).collect();
                let n = ginis.len();
                let m = mean(&ginis).unwrap_or_default();
                let half_width = match sample_sd(&ginis) {
                    Some(sd) => t_critical(self.level, (n - 1) as f64)? * sd / (n as f64).sqrt(),
                    None => 0.0,
                };
                Ok::<_, ModelError>(CountyEstimate::new(
                    county,
                    EstimationMethod::CountyAverage,
                    m,
                    m - half_width,
                    m + half_width,
                    n,
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gini_data::Tract;

    #[test]
    fn test_county_means_and_intervals() {
        let tracts: TractSet = vec![
            Tract::new("06001000100", "Alameda County", 0.40, 800_000.0).unwrap(),
            Tract::new("06001000200", "Alameda County", 0.44, 600_000.0).unwrap(),
            Tract::new("06001000300", "Alameda County", 0.42, 700_000.0).unwrap(),
            Tract::new("06003000100", "Alpine County", 0.45, 300_000.0).unwrap(),
        ]
        .into_iter()
        .collect();

        let estimates = CountyAverageEstimator::default().estimate(&tracts).unwrap();
        assert_eq!(estimates.len(), 2);

        let alameda = &estimates[0];
        assert_eq!(alameda.county, "Alameda County");
        assert_eq!(alameda.method, EstimationMethod::CountyAverage);
        assert_eq!(alameda.n_tracts, 3);
        assert_relative_eq!(alameda.estimate, 0.42, epsilon = 1e-12);
        // sd = 0.02, t(0.975, 2) = 4.303
        let half = 4.302_653 * 0.02 / 3.0_f64.sqrt();
        assert_relative_eq!(alameda.upper - alameda.estimate, half, epsilon = 1e-5);

        let alpine = &estimates[1];
        assert_eq!(alpine.n_tracts, 1);
        assert_relative_eq!(alpine.width(), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert!(CountyAverageEstimator::default().estimate(&TractSet::default()).is_err());
    }
}
