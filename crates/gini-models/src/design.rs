//! Design matrices built from tract sets.

use crate::error::{ModelError, Result};
use gini_data::TractSet;
use ndarray::{Array1, Array2};

/// Name of the intercept column.
pub const INTERCEPT: &str = "(Intercept)";

/// Name of the scaled home value column.
pub const HOME_VALUE: &str = "home_value";

/// Response, design matrix and column names for one model.
#[derive(Debug, Clone)]
pub struct Design {
    /// Design matrix (n x p).
    pub x: Array2<f64>,
    /// Response: tract Gini Index (n).
    pub y: Array1<f64>,
    /// Column names (p).
    pub names: Vec<String>,
    /// Whether column 0 is an intercept.
    pub has_intercept: bool,
}

fn require_tracts(tracts: &TractSet, required: usize) -> Result<()> {
    if tracts.len() < required {
        return Err(ModelError::InsufficientData {
            required,
            actual: tracts.len(),
        });
    }
    Ok(())
}

/// `gini ~ 1 + home_value`, ignoring counties.
pub fn pooled(tracts: &TractSet) -> Result<Design> {
    require_tracts(tracts, 3)?;
    let values = tracts.home_values_scaled();
    let x = Array2::from_shape_fn((tracts.len(), 2), |(i, j)| if j == 0 { 1.0 } else { values[i] });

    Ok(Design {
        x,
        y: Array1::from_vec(tracts.ginis()),
        names: vec![INTERCEPT.to_string(), HOME_VALUE.to_string()],
        has_intercept: true,
    })
}

/// `gini ~ 0 + county`: one indicator column per county.
pub fn county_indicators(tracts: &TractSet) -> Result<Design> {
    require_tracts(tracts, 1)?;
    let (counties, groups) = tracts.county_index();
    let mut x = Array2::<f64>::zeros((tracts.len(), counties.len()));
    for (i, &g) in groups.iter().enumerate() {
        x[[i, g]] = 1.0;
    }

    Ok(Design {
        x,
        y: Array1::from_vec(tracts.ginis()),
        names: counties,
        has_intercept: false,
    })
}

/// `gini ~ 0 + county + home_value`.
///
/// When `center` is set the home value is centered at its grand mean, so each
/// county coefficient is that county's expected Gini at the average home value.
pub fn fixed_effects(tracts: &TractSet, center: bool) -> Result<Design> {
    let indicators = county_indicators(tracts)?;
    let values = tracts.home_values_scaled();
    let offset = if center {
        values.iter().sum::<f64>() / values.len() as f64
    } else {
        0.0
    };

    let (n, k) = indicators.x.dim();
    let mut x = Array2::<f64>::zeros((n, k + 1));
    x.slice_mut(ndarray::s![.., ..k]).assign(&indicators.x);
    for (i, v) in values.iter().enumerate() {
        x[[i, k]] = v - offset;
    }

    let mut names = indicators.names;
    names.push(HOME_VALUE.to_string());

    Ok(Design {
        x,
        y: indicators.y,
        names,
        has_intercept: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gini_data::Tract;

    fn tracts() -> TractSet {
        vec![
            Tract::new("06001000100", "Alameda County", 0.40, 800_000.0).unwrap(),
            Tract::new("06003000100", "Alpine County", 0.45, 300_000.0).unwrap(),
            Tract::new("06001000200", "Alameda County", 0.42, 600_000.0).unwrap(),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_pooled_design() {
        let d = pooled(&tracts()).unwrap();
        assert_eq!(d.x.dim(), (3, 2));
        assert_relative_eq!(d.x[[0, 1]], 8.0);
        assert_relative_eq!(d.x[[2, 0]], 1.0);
        assert!(d.has_intercept);
    }

    #[test]
    fn test_indicator_design() {
        let d = county_indicators(&tracts()).unwrap();
        assert_eq!(d.names, vec!["Alameda County", "Alpine County"]);
        assert_eq!(d.x.row(1).to_vec(), vec![0.0, 1.0]);
        assert_eq!(d.x.row(2).to_vec(), vec![1.0, 0.0]);
    }

    #[test]
    fn test_fixed_effects_centered() {
        let d = fixed_effects(&tracts(), true).unwrap();
        assert_eq!(d.x.dim(), (3, 3));
        assert_eq!(d.names.last().map(String::as_str), Some(HOME_VALUE));
        let centered_sum: f64 = d.x.column(2).sum();
        assert_relative_eq!(centered_sum, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pooled_requires_data() {
        let empty = TractSet::default();
        assert!(pooled(&empty).is_err());
        assert!(county_indicators(&empty).is_err());
    }
}
