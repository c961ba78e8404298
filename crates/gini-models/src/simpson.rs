//! Pooling analysis: how the Gini/home value slope changes with aggregation.
//!
//! The same tracts are summarised three ways:
//!
//! - **pooled**: one regression over every tract, ignoring counties;
//! - **within**: the fixed-effects slope, comparing tracts only against other
//!   tracts in the same county;
//! - **between**: county mean Gini regressed on county mean home value.
//!
//! When county-level differences drive the pooled slope, the pooled and within
//! slopes can have opposite signs, which is the reversal this module reports.

use crate::design;
use crate::error::{ModelError, Result};
use crate::fixed_effects::FixedEffectsModel;
use crate::ols::{Coefficient, LinearModel, OlsFit};
use gini_data::TractSet;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Slope of a regression fitted inside one county.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountySlope {
    /// County name.
    pub county: String,
    /// Tracts in the county.
    pub n_tracts: usize,
    /// Intercept (Gini Index at zero home value).
    pub intercept: f64,
    /// Change in Gini Index per scaled home value unit.
    pub slope: f64,
    /// Standard error of the slope.
    pub std_error: f64,
}

/// Result of the pooling analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpsonReport {
    /// Regression of Gini on home value over all tracts.
    pub pooled: OlsFit,
    /// Pooled home value coefficient.
    pub pooled_slope: Coefficient,
    /// Within-county (fixed-effects) home value coefficient.
    pub within_slope: Coefficient,
    /// County-means regression slope, absent with fewer than three counties.
    pub between_slope: Option<Coefficient>,
    /// Per-county slopes for counties with enough tracts.
    pub county_slopes: Vec<CountySlope>,
    /// County slopes whose sign opposes the pooled slope.
    pub n_opposite: usize,
    /// Pooled and within slopes have opposite signs.
    pub reversal: bool,
}

impl SimpsonReport {
    /// Share of county slopes that oppose the pooled slope.
    pub fn opposite_share(&self) -> Option<f64> {
        (!self.county_slopes.is_empty())
            .then(|| self.n_opposite as f64 / self.county_slopes.len() as f64)
    }

    /// One-line description of the result.
    pub fn headline(&self) -> String {
        let direction = |s: f64| if s < 0.0 { "negative" } else { "positive" };
        if self.reversal {
            format!(
                "Reversal: pooled slope is {} ({:.4}) but the within-county slope is {} ({:.4})",
                direction(self.pooled_slope.estimate),
                self.pooled_slope.estimate,
                direction(self.within_slope.estimate),
                self.within_slope.estimate
            )
        } else {
            format!(
                "No reversal: pooled ({:.4}) and within-county ({:.4}) slopes share a sign",
                self.pooled_slope.estimate, self.within_slope.estimate
            )
        }
    }
}

/// Pooling analysis configuration.
#[derive(Debug, Clone, Copy)]
pub struct SimpsonAnalysis {
    /// Minimum tracts for a county slope to be reported.
    pub min_tracts: usize,
}

impl Default for SimpsonAnalysis {
    fn default() -> Self {
        Self { min_tracts: 10 }
    }
}

impl SimpsonAnalysis {
    /// Create an analysis reporting county slopes for counties with at least
    /// `min_tracts` tracts (never fewer than three).
    pub fn new(min_tracts: usize) -> Self {
        Self {
            min_tracts: min_tracts.max(3),
        }
    }

    /// Run the analysis.
    pub fn analyze(&self, tracts: &TractSet) -> Result<SimpsonReport> {
        let model = LinearModel::default();

        let pooled_design = design::pooled(tracts)?;
        let pooled = model.fit(
            &pooled_design.x,
            &pooled_design.y,
            &pooled_design.names,
            true,
        )?;
        let pooled_slope = home_value_coefficient(&pooled)?;

        let within_slope = FixedEffectsModel::with_home_value()
            .fit(tracts)?
            .slope
            .ok_or_else(|| ModelError::UnknownName(design::HOME_VALUE.to_string()))?;

        let between_slope = between_county_slope(tracts, &model)?;
        let county_slopes = self.county_slopes(tracts);

        let pooled_sign = pooled_slope.estimate.signum();
        let n_opposite = county_slopes
            .iter()
            .filter(|s| s.slope != 0.0 && s.slope.signum() != pooled_sign)
            .count();
        let reversal = pooled_slope.estimate != 0.0
            && within_slope.estimate != 0.0
            && pooled_sign != within_slope.estimate.signum();

        debug!(
            pooled = pooled_slope.estimate,
            within = within_slope.estimate,
            county_slopes = county_slopes.len(),
            n_opposite,
            reversal,
            "pooling analysis complete"
        );

        Ok(SimpsonReport {
            pooled,
            pooled_slope,
            within_slope,
            between_slope,
            county_slopes,
            n_opposite,
            reversal,
        })
    }

    fn county_slopes(&self, tracts: &TractSet) -> Vec<CountySlope> {
        let model = LinearModel::default();
        tracts
            .retain_min_tracts(self.min_tracts)
            .by_county()
            .into_iter()
            .filter_map(|(county, members)| {
                let subset: TractSet = members.into_iter().cloned().collect();
                let d = design::pooled(&subset).ok()?;
                // A county where every tract has the same value has no slope
                match model.fit(&d.x, &d.y, &d.names, true) {
                    Ok(fit) => Some(CountySlope {
                        county: county.to_string(),
                        n_tracts: subset.len(),
                        intercept: fit.coefficients[0].estimate,
                        slope: fit.coefficients[1].estimate,
                        std_error: fit.coefficients[1].std_error,
                    }),
                    Err(e) => {
                        debug!(county, error = %e, "skipping county slope");
                        None
                    }
                }
            })
            .collect()
    }
}

fn home_value_coefficient(fit: &OlsFit) -> Result<Coefficient> {
    fit.coefficient(design::HOME_VALUE)
        .cloned()
        .ok_or_else(|| ModelError::UnknownName(design::HOME_VALUE.to_string()))
}

fn between_county_slope(tracts: &TractSet, model: &LinearModel) -> Result<Option<Coefficient>> {
    let groups = tracts.by_county();
    if groups.len() < 3 {
        return Ok(None);
    }

    let mut mean_value = Vec::with_capacity(groups.len());
    let mut mean_gini = Vec::with_capacity(groups.len());
    for members in groups.values() {
        let n = members.len() as f64;
        mean_value.push(members.iter().map(|t| t.home_value_scaled()).sum::<f64>() / n);
        mean_gini.push(members.iter().map(|t| t.gini).sum::<f64>() / n);
    }

    let x = Array2::from_shape_fn((mean_value.len(), 2), |(i, j)| {
        if j == 0 { 1.0 } else { mean_value[i] }
    });
    let y = Array1::from_vec(mean_gini);
    let names = vec![design::INTERCEPT.to_string(), design::HOME_VALUE.to_string()];

    match model.fit(&x, &y, &names, true) {
        Ok(fit) => home_value_coefficient(&fit).map(Some),
        Err(ModelError::Singular(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gini_data::Tract;

    /// Three counties: richer counties are more unequal, but inside every
    /// county the Gini falls as home values rise.
    fn reversal_tracts() -> TractSet {
        let mut tracts = Vec::new();
        for (c, (county, base_value, base_gini)) in [
            ("A County", 3.0, 0.35),
            ("B County", 6.0, 0.45),
            ("C County", 9.0, 0.55),
        ]
        .into_iter()
        .enumerate()
        {
            for i in 0..5 {
                let offset = i as f64 - 2.0;
                let value = (base_value + offset * 0.5) * 100_000.0;
                let gini = base_gini - 0.01 * offset + 0.001 * ((i * 7) % 3) as f64;
                let geoid = format!("06{:03}{:06}", 2 * c + 1, i + 1);
                tracts.push(Tract::new(geoid, county, gini, value).unwrap());
            }
        }
        tracts.into_iter().collect()
    }

    #[test]
    fn test_reversal_detected() {
        let report = SimpsonAnalysis::new(3).analyze(&reversal_tracts()).unwrap();
        assert!(report.pooled_slope.estimate > 0.0);
        assert!(report.within_slope.estimate < 0.0);
        assert!(report.between_slope.as_ref().unwrap().estimate > 0.0);
        assert!(report.reversal);
        assert_eq!(report.county_slopes.len(), 3);
        assert_eq!(report.n_opposite, 3);
        assert_eq!(report.opposite_share(), Some(1.0));
        assert!(report.headline().starts_with("Reversal"));
    }

    #[test]
    fn test_no_reversal_when_slopes_agree() {
        let tracts: TractSet = (0..8)
            .map(|i| {
                let county = if i % 2 == 0 { "A County" } else { "B County" };
                let value = 200_000.0 + 50_000.0 * i as f64;
                let gini = 0.30 + 0.01 * i as f64 + if i % 3 == 0 { 0.002 } else { 0.0 };
                Tract::new(format!("06001{:06}", i), county, gini, value).unwrap()
            })
            .collect();
        let report = SimpsonAnalysis::new(3).analyze(&tracts).unwrap();
        assert!(!report.reversal);
        assert!(report.between_slope.is_none());
        assert!(report.headline().starts_with("No reversal"));
    }

    #[test]
    fn test_min_tracts_filters_county_slopes() {
        let report = SimpsonAnalysis::new(6).analyze(&reversal_tracts()).unwrap();
        assert!(report.county_slopes.is_empty());
        assert_eq!(report.opposite_share(), None);
    }
}
