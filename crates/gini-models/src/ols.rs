//! Ordinary least squares.
//!
//! Fits `y = Xβ + ε` with homoskedastic errors and reports the same
//! quantities as a classical regression summary:
//!
//! - coefficient standard errors from `σ̂² (XᵀX)⁻¹`
//! - two-sided t tests and Student-t confidence intervals
//! - R² (centered with an intercept, uncentered without) and adjusted R²
//! - the overall F test against the intercept-only (or empty) model

use crate::error::{ModelError, Result};
use crate::interval::{DEFAULT_LEVEL, f_p_value, t_critical, t_p_value};
use crate::linalg::least_squares;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One estimated regression coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    /// Term name.
    pub name: String,
    /// Point estimate.
    pub estimate: f64,
    /// Standard error.
    pub std_error: f64,
    /// t statistic.
    pub t_value: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Lower confidence bound.
    pub ci_lower: f64,
    /// Upper confidence bound.
    pub ci_upper: f64,
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.5} (se {:.5}, t {:.2}, p {:.4})",
            self.name, self.estimate, self.std_error, self.t_value, self.p_value
        )
    }
}

/// A fitted linear model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsFit {
    /// Coefficients in design column order.
    pub coefficients: Vec<Coefficient>,
    /// Coefficient covariance matrix `σ̂² (XᵀX)⁻¹`.
    #[serde(skip)]
    pub covariance: Array2<f64>,
    /// Fitted values.
    #[serde(skip)]
    pub fitted: Array1<f64>,
    /// Residuals.
    #[serde(skip)]
    pub residuals: Array1<f64>,
    /// Number of observations.
    pub n_obs: usize,
    /// Residual degrees of freedom.
    pub df_residual: usize,
    /// Residual standard error `σ̂`.
    pub sigma: f64,
    /// Coefficient of determination.
    pub r_squared: f64,
    /// Adjusted coefficient of determination.
    pub adj_r_squared: f64,
    /// Overall F statistic, absent when the model has no non-intercept terms.
    pub f_statistic: Option<f64>,
    /// Numerator degrees of freedom of the F test.
    pub f_df: usize,
    /// p-value of the F test.
    pub f_p_value: Option<f64>,
    /// Whether the design contains an intercept column.
    pub has_intercept: bool,
    /// Coverage of the confidence intervals.
    pub level: f64,
}

impl OlsFit {
    /// Look up a coefficient by name.
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }

    /// Index of a coefficient by name.
    pub fn coefficient_index(&self, name: &str) -> Option<usize> {
        self.coefficients.iter().position(|c| c.name == name)
    }

    /// Estimated coefficients as a vector.
    pub fn beta(&self) -> Array1<f64> {
        self.coefficients.iter().map(|c| c.estimate).collect()
    }

    /// Residual sum of squares.
    pub fn rss(&self) -> f64 {
        self.residuals.iter().map(|r| r * r).sum()
    }

    /// Predict the response for one design row.
    pub fn predict(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(ModelError::DimensionMismatch(format!(
                "row has {} values, model has {} coefficients",
                row.len(),
                self.coefficients.len()
            )));
        }
        Ok(row
            .iter()
            .zip(&self.coefficients)
            .map(|(x, c)| x * c.estimate)
            .sum())
    }
}

/// Ordinary least squares estimator.
#[derive(Debug, Clone, Copy)]
pub struct LinearModel {
    level: f64,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl LinearModel {
    /// Create an estimator reporting intervals at `level` coverage.
    pub const fn with_level(level: f64) -> Self {
        Self { level }
    }

    /// Fit the model.
    ///
    /// # Arguments
    /// * `x` - Design matrix (n x p)
    /// * `y` - Response (n)
    /// * `names` - Column names (p)
    /// * `has_intercept` - Whether one column of `x` is a constant intercept
    ///
    /// # Errors
    /// Fails when dimensions disagree, `n <= p`, or `XᵀX` is singular.
    pub fn fit(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        names: &[String],
        has_intercept: bool,
    ) -> Result<OlsFit> {
        let (n, p) = x.dim();
        if names.len() != p {
            return Err(ModelError::DimensionMismatch(format!(
                "{} column names for {} design columns",
                names.len(),
                p
            )));
        }
        if n <= p {
            return Err(ModelError::InsufficientData {
                required: p + 1,
                actual: n,
            });
        }

        let (beta, xtx_inv) = least_squares(x, y)?;
        let fitted = x.dot(&beta);
        let residuals = y - &fitted;

        let df_residual = n - p;
        let rss: f64 = residuals.iter().map(|r| r * r).sum();
        let sigma2 = rss / df_residual as f64;
        let covariance = &xtx_inv * sigma2;

        let t_crit = t_critical(self.level, df_residual as f64)?;
        let mut coefficients = Vec::with_capacity(p);
        for (j, name) in names.iter().enumerate() {
            let estimate = beta[j];
            let std_error = covariance[[j, j]].max(0.0).sqrt();
            let t_value = if std_error > 0.0 {
                estimate / std_error
            } else if estimate == 0.0 {
                0.0
            } else {
                f64::INFINITY.copysign(estimate)
            };
            coefficients.push(Coefficient {
                name: name.clone(),
                estimate,
                std_error,
                t_value,
                p_value: t_p_value(t_value, df_residual as f64)?,
                ci_lower: estimate - t_crit * std_error,
                ci_upper: estimate + t_crit * std_error,
            });
        }

        let intercept_df = usize::from(has_intercept);
        let tss: f64 = if has_intercept {
            let mean = y.mean().unwrap_or(0.0);
            y.iter().map(|v| (v - mean).powi(2)).sum()
        } else {
            y.iter().map(|v| v * v).sum()
        };
        let r_squared = if tss > 0.0 { 1.0 - rss / tss } else { 0.0 };
        let adj_r_squared =
            1.0 - (1.0 - r_squared) * ((n - intercept_df) as f64 / df_residual as f64);

        let f_df = p - intercept_df;
        let (f_statistic, f_p) = if f_df == 0 {
            (None, None)
        } else {
            let f = ((tss - rss) / f_df as f64) / sigma2;
            let p_value = if f.is_finite() {
                f_p_value(f, f_df as f64, df_residual as f64)?
            } else {
                0.0
            };
            (Some(f), Some(p_value))
        };

        Ok(OlsFit {
            coefficients,
            covariance,
            fitted,
            residuals,
            n_obs: n,
            df_residual,
            sigma: sigma2.sqrt(),
            r_squared,
            adj_r_squared,
            f_statistic,
            f_df,
            f_p_value: f_p,
            has_intercept,
            level: self.level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_regression_matches_closed_form() {
        // y = 1 + 2x + noise; values checked against the closed-form formulas
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [3.1, 4.9, 7.2, 8.8, 11.1];
        let x = Array2::from_shape_fn((5, 2), |(i, j)| if j == 0 { 1.0 } else { xs[i] });
        let y = Array1::from_vec(ys.to_vec());

        let fit = LinearModel::default()
            .fit(&x, &y, &names(&["(Intercept)", "x"]), true)
            .unwrap();

        let x_mean = 3.0;
        let y_mean = ys.iter().sum::<f64>() / 5.0;
        let sxy: f64 = xs.iter().zip(&ys).map(|(a, b)| (a - x_mean) * (b - y_mean)).sum();
        let sxx: f64 = xs.iter().map(|a| (a - x_mean).powi(2)).sum();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;

        assert_relative_eq!(fit.coefficients[1].estimate, slope, epsilon = 1e-10);
        assert_relative_eq!(fit.coefficients[0].estimate, intercept, epsilon = 1e-10);
        assert_relative_eq!(
            fit.coefficients[1].std_error,
            fit.sigma / sxx.sqrt(),
            epsilon = 1e-10
        );
        assert_eq!(fit.df_residual, 3);
        assert!(fit.r_squared > 0.99);
        assert!(fit.coefficients[1].p_value < 0.001);
        assert!(fit.coefficients[1].ci_lower < slope && slope < fit.coefficients[1].ci_upper);

        // F equals t² for a single slope
        let t = fit.coefficients[1].t_value;
        assert_relative_eq!(fit.f_statistic.unwrap(), t * t, epsilon = 1e-8);
        assert_relative_eq!(
            fit.f_p_value.unwrap(),
            fit.coefficients[1].p_value,
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_perfect_fit() {
        let x = array![[1.0, 0.0], [1.0, 1.0], [1.0, 2.0], [1.0, 3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let fit = LinearModel::default()
            .fit(&x, &y, &names(&["(Intercept)", "x"]), true)
            .unwrap();
        assert_relative_eq!(fit.r_squared, 1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.coefficient("x").unwrap().estimate, 2.0, epsilon = 1e-10);
        assert_relative_eq!(fit.predict(&[1.0, 10.0]).unwrap(), 21.0, epsilon = 1e-9);
    }

    #[test]
    fn test_insufficient_observations() {
        let x = array![[1.0, 0.0], [1.0, 1.0]];
        let y = array![1.0, 2.0];
        let result = LinearModel::default().fit(&x, &y, &names(&["a", "b"]), true);
        assert!(matches!(
            result,
            Err(ModelError::InsufficientData {
                required: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_name_mismatch() {
        let x = array![[1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0];
        let result = LinearModel::default().fit(&x, &y, &names(&["a", "b"]), true);
        assert!(matches!(result, Err(ModelError::DimensionMismatch(_))));
    }

    #[test]
    fn test_intercept_only_has_no_f_test() {
        let x = array![[1.0], [1.0], [1.0], [1.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let fit = LinearModel::default()
            .fit(&x, &y, &names(&["(Intercept)"]), true)
            .unwrap();
        assert!(fit.f_statistic.is_none());
        assert_relative_eq!(fit.coefficients[0].estimate, 2.5, epsilon = 1e-12);
        assert_relative_eq!(fit.r_squared, 0.0, epsilon = 1e-12);
    }
}
