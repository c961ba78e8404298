//! Small dense linear algebra helpers.
//!
//! Design matrices in this crate have at most a few dozen columns (one per
//! county plus a slope), so Gauss-Jordan elimination on the normal equations
//! is sufficient.

use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2};

/// Relative pivot threshold below which a matrix is treated as singular.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Invert a square matrix with Gauss-Jordan elimination and partial pivoting.
///
/// # Errors
/// Returns [`ModelError::Singular`] when a pivot vanishes relative to the
/// largest entry of the input, and [`ModelError::DimensionMismatch`] for
/// non-square input.
pub fn invert(matrix: &Array2<f64>) -> Result<Array2<f64>> {
    let (n, m) = matrix.dim();
    if n != m {
        return Err(ModelError::DimensionMismatch(format!(
            "cannot invert a {}x{} matrix",
            n, m
        )));
    }
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let scale = matrix.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Err(ModelError::Singular("matrix has no finite non-zero entries".to_string()));
    }

    let mut a = matrix.clone();
    let mut inv = Array2::<f64>::eye(n);

    for col in 0..n {
        // Partial pivoting
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        let pivot = a[[pivot_row, col]];
        if pivot.abs() < SINGULAR_TOLERANCE * scale {
            return Err(ModelError::Singular(format!(
                "pivot {:.3e} in column {} (rank deficient design)",
                pivot, col
            )));
        }

        if pivot_row != col {
            for k in 0..n {
                a.swap([col, k], [pivot_row, k]);
                inv.swap([col, k], [pivot_row, k]);
            }
        }

        for k in 0..n {
            a[[col, k]] /= pivot;
            inv[[col, k]] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                let (da, dinv) = (factor * a[[col, k]], factor * inv[[col, k]]);
                a[[row, k]] -= da;
                inv[[row, k]] -= dinv;
            }
        }
    }

    Ok(inv)
}

/// Solve the least squares normal equations `(XᵀX) β = Xᵀy`.
///
/// Returns `β` and `(XᵀX)⁻¹`.
pub fn least_squares(x: &Array2<f64>, y: &Array1<f64>) -> Result<(Array1<f64>, Array2<f64>)> {
    if x.nrows() != y.len() {
        return Err(ModelError::DimensionMismatch(format!(
            "design has {} rows but response has {} values",
            x.nrows(),
            y.len()
        )));
    }
    let xtx = x.t().dot(x);
    let xtx_inv = invert(&xtx)?;
    let beta = xtx_inv.dot(&x.t().dot(y));
    Ok((beta, xtx_inv))
}
