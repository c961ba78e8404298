//! Posterior summaries and convergence diagnostics.

use crate::interval::{equal_tailed, mean, sample_sd};
use serde::{Deserialize, Serialize};

/// Posterior summary of one scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSummary {
    /// Parameter name.
    pub name: String,
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation.
    pub sd: f64,
    /// Lower bound of the equal-tailed credible interval.
    pub lower: f64,
    /// Upper bound of the equal-tailed credible interval.
    pub upper: f64,
    /// Split potential scale reduction factor.
    pub rhat: f64,
}

/// Summarise draws pooled across chains.
pub fn summarize(name: &str, chains: &[&[f64]], level: f64) -> ParameterSummary {
    let pooled: Vec<f64> = chains.iter().flat_map(|c| c.iter().copied()).collect();
    let (lower, upper) = equal_tailed(&pooled, level).unwrap_or((f64::NAN, f64::NAN));

    ParameterSummary {
        name: name.to_string(),
        mean: mean(&pooled).unwrap_or(f64::NAN),
        sd: sample_sd(&pooled).unwrap_or(0.0),
        lower,
        upper,
        rhat: split_rhat(chains),
    }
}

/// Split-R̂ (Gelman et al., BDA3 section 11.4).
///
/// Each chain is cut into two halves (dropping the middle draw when the length
/// is odd) and the between/within variance ratio is computed over the halves.
/// Values near 1 indicate the chains agree. Returns `NaN` when there are fewer
/// than two draws per half.
pub fn split_rhat(chains: &[&[f64]]) -> f64 {
    let Some(shortest) = chains.iter().map(|c| c.len()).min() else {
        return f64::NAN;
    };
    let n = shortest / 2;
    if n < 2 {
        return f64::NAN;
    }

    let halves: Vec<&[f64]> = chains
        .iter()
        .flat_map(|c| {
            let c = &c[..shortest];
            [&c[..n], &c[shortest - n..]]
        })
        .collect();
    let m = halves.len() as f64;
    let nf = n as f64;

    let means: Vec<f64> = halves.iter().map(|h| h.iter().sum::<f64>() / nf).collect();
    let grand = means.iter().sum::<f64>() / m;
    let between = nf / (m - 1.0) * means.iter().map(|x| (x - grand).powi(2)).sum::<f64>();
    let within = halves
        .iter()
        .zip(&means)
        .map(|(h, mu)| h.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (nf - 1.0))
        .sum::<f64>()
        / m;

    if within <= 0.0 {
        return if between <= 0.0 { 1.0 } else { f64::INFINITY };
    }

    let var_plus = (nf - 1.0) / nf * within + between / nf;
    (var_plus / within).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rhat_near_one_for_identical_mixing() {
        let a: Vec<f64> = (0..200).map(|i| ((i * 37) % 101) as f64).collect();
        let b: Vec<f64> = (0..200).map(|i| ((i * 53 + 11) % 101) as f64).collect();
        let rhat = split_rhat(&[&a, &b]);
        assert!(rhat < 1.05, "rhat = {rhat}");
    }

    #[test]
    fn test_rhat_flags_disagreeing_chains() {
        let a: Vec<f64> = (0..100).map(|i| (i % 7) as f64).collect();
        let b: Vec<f64> = (0..100).map(|i| 50.0 + (i % 7) as f64).collect();
        assert!(split_rhat(&[&a, &b]) > 2.0);
    }

    #[test]
    fn test_rhat_flags_trend_within_single_chain() {
        let trending: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert!(split_rhat(&[&trending]) > 1.5);
    }

    #[test]
    fn test_rhat_constant_chains() {
        let a = vec![1.0; 10];
        assert_relative_eq!(split_rhat(&[&a, &a]), 1.0);
        let short = [1.0, 2.0];
        assert!(split_rhat(&[&short[..]]).is_nan());
    }

    #[test]
    fn test_summarize_pools_chains() {
        let a: Vec<f64> = (0..50).map(f64::from).collect();
        let b: Vec<f64> = (50..100).map(f64::from).collect();
        let s = summarize("theta", &[&a, &b], 0.9);
        assert_eq!(s.name, "theta");
        assert_relative_eq!(s.mean, 49.5);
        assert!(s.lower < 10.0 && s.upper > 89.0);
        // Two chains covering disjoint ranges have not mixed
        assert!(s.rhat > 1.5);
    }
}
