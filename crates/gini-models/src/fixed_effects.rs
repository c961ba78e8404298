//! Fixed-effects (county indicator) regression.
//!
//! Fits `gini ~ 0 + county [+ home_value]` by least squares. County
//! coefficients are estimated without sharing information across counties,
//! but their intervals use the residual variance pooled over all tracts,
//! which narrows intervals for small counties relative to raw averages.

use crate::design::{self, HOME_VALUE};
use crate::error::Result;
use crate::estimate::{CountyEstimate, EstimationMethod};
use crate::interval::DEFAULT_LEVEL;
use crate::ols::{Coefficient, LinearModel, OlsFit};
use gini_data::TractSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fixed-effects model configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedEffectsModel {
    /// Include the scaled home value as a common slope.
    pub include_home_value: bool,
    /// Interval coverage.
    pub level: f64,
}

impl Default for FixedEffectsModel {
    fn default() -> Self {
        Self {
            include_home_value: false,
            level: DEFAULT_LEVEL,
        }
    }
}

/// Result of a fixed-effects fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedEffectsFit {
    /// Underlying regression.
    pub ols: OlsFit,
    /// County estimates, ordered by county name.
    pub county_estimates: Vec<CountyEstimate>,
    /// Within-county home value slope, when included.
    pub slope: Option<Coefficient>,
}

impl FixedEffectsModel {
    /// County indicators only.
    pub const fn intercepts_only() -> Self {
        Self {
            include_home_value: false,
            level: DEFAULT_LEVEL,
        }
    }

    /// County indicators plus a common home value slope.
    pub const fn with_home_value() -> Self {
        Self {
            include_home_value: true,
            level: DEFAULT_LEVEL,
        }
    }

    /// Fit the model.
    ///
    /// With the home value term, the value is centered at its grand mean so
    /// county coefficients are expected Gini Index at the average home value.
    pub fn fit(&self, tracts: &TractSet) -> Result<FixedEffectsFit> {
        let design = if self.include_home_value {
            design::fixed_effects(tracts, true)?
        } else {
            design::county_indicators(tracts)?
        };

        let ols = LinearModel::with_level(self.level).fit(
            &design.x,
            &design.y,
            &design.names,
            design.has_intercept,
        )?;
        debug!(
            counties = design.names.len() - usize::from(self.include_home_value),
            sigma = ols.sigma,
            "fitted fixed effects model"
        );

        let (counties, groups) = tracts.county_index();
        let mut sizes = vec![0_usize; counties.len()];
        for g in groups {
            sizes[g] += 1;
        }

        let county_estimates = counties
            .iter()
            .zip(&sizes)
            .zip(&ols.coefficients)
            .map(|((county, &n), coef)| {
                CountyEstimate::new(
                    county.clone(),
                    EstimationMethod::FixedEffects,
                    coef.estimate,
                    coef.ci_lower,
                    coef.ci_upper,
                    n,
                )
            })
            .collect();

        let slope = ols.coefficient(HOME_VALUE).cloned();

        Ok(FixedEffectsFit {
            ols,
            county_estimates,
            slope,
        })
    }
}
