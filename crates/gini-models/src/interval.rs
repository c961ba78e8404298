//! Interval and tail-probability helpers.

use crate::error::{ModelError, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

/// Default coverage of confidence and credible intervals.
pub const DEFAULT_LEVEL: f64 = 0.95;

fn students_t(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df).map_err(|e| ModelError::Distribution(format!("t({}): {}", df, e)))
}

/// Two-sided critical value of Student's t for the given coverage level.
///
/// `t_critical(0.95, 10)` is the 97.5% quantile of t with 10 degrees of freedom.
pub fn t_critical(level: f64, df: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&level) || level == 0.0 {
        return Err(ModelError::InvalidConfig(format!(
            "interval level must be in (0, 1), got {}",
            level
        )));
    }
    Ok(students_t(df)?.inverse_cdf(0.5 + level / 2.0))
}

/// Two-sided p-value of a t statistic.
pub fn t_p_value(t: f64, df: f64) -> Result<f64> {
    if !t.is_finite() {
        return Ok(0.0);
    }
    Ok(2.0 * (1.0 - students_t(df)?.cdf(t.abs())))
}

/// Upper-tail probability of an F statistic.
pub fn f_p_value(f: f64, df1: f64, df2: f64) -> Result<f64> {
    let dist = FisherSnedecor::new(df1, df2)
        .map_err(|e| ModelError::Distribution(format!("F({}, {}): {}", df1, df2, e)))?;
    Ok(1.0 - dist.cdf(f))
}

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator); `None` below two values.
pub fn sample_sd(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile of already sorted values with linear interpolation between order
/// statistics (the "type 7" definition).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Equal-tailed interval of unsorted draws.
pub fn equal_tailed(draws: &[f64], level: f64) -> Option<(f64, f64)> {
    let mut sorted = draws.to_vec();
    sorted.sort_by(f64::total_cmp);
    let tail = (1.0 - level) / 2.0;
    Some((
        quantile_sorted(&sorted, tail)?,
        quantile_sorted(&sorted, 1.0 - tail)?,
    ))
}
