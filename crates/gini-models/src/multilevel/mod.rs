//! Bayesian multilevel (partial pooling) model.
//!
//! Varying-intercept normal model for tract Gini Index:
//!
//! ```text
//! gini_ij ~ N(α_j + β (x_ij - x̄), σ²)      tract i in county j
//! α_j     ~ N(μ, τ²)                          county intercepts
//! μ ~ N(m₀, s₀²),  β ~ N(0, s_β²)
//! σ² ~ InvGamma(a_σ, b_σ),  τ² ~ InvGamma(a_τ, b_τ)
//! ```
//!
//! The β term is optional. Every full conditional is conjugate, so the
//! posterior is explored with a Gibbs sampler; chains run in parallel on the
//! rayon pool with seeds `seed, seed + 1, ...` and are summarised with
//! equal-tailed credible intervals and split-R̂.
//!
//! Small counties are pulled toward μ: the conditional mean of α_j weights
//! the county's own tracts by `n_j / σ²` and the population mean by `1 / τ²`.

pub mod diagnostics;
pub mod gibbs;

use crate::error::{ModelError, Result};
use crate::estimate::{CountyEstimate, EstimationMethod};
use crate::interval::DEFAULT_LEVEL;
use diagnostics::{ParameterSummary, summarize};
use gibbs::{ChainDraws, ModelData, run_chain};
use gini_data::TractSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// R̂ above which a parameter is reported as not converged.
pub const RHAT_THRESHOLD: f64 = 1.05;

/// Prior hyper-parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Priors {
    /// Prior mean of the population mean μ.
    pub mu_mean: f64,
    /// Prior standard deviation of μ.
    pub mu_sd: f64,
    /// Prior standard deviation of the home value slope β.
    pub beta_sd: f64,
    /// Inverse-gamma shape for the tract variance σ².
    pub sigma_shape: f64,
    /// Inverse-gamma rate for σ².
    pub sigma_rate: f64,
    /// Inverse-gamma shape for the county variance τ².
    pub tau_shape: f64,
    /// Inverse-gamma rate for τ².
    pub tau_rate: f64,
}

impl Default for Priors {
    fn default() -> Self {
        Self {
            mu_mean: 0.5,
            mu_sd: 1.0,
            beta_sd: 1.0,
            sigma_shape: 2.0,
            sigma_rate: 0.005,
            tau_shape: 2.0,
            tau_rate: 0.005,
        }
    }
}

/// Sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultilevelConfig {
    /// Number of independent chains.
    pub chains: usize,
    /// Iterations per chain, including warmup.
    pub iterations: usize,
    /// Warmup iterations discarded from each chain.
    pub warmup: usize,
    /// Base random seed; chain `c` uses `seed + c`.
    pub seed: u64,
    /// Include the centered scaled home value as a common slope.
    pub include_home_value: bool,
    /// Credible interval coverage.
    pub level: f64,
    /// Prior hyper-parameters.
    pub priors: Priors,
}

impl Default for MultilevelConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            iterations: 2000,
            warmup: 1000,
            seed: 2024,
            include_home_value: false,
            level: DEFAULT_LEVEL,
            priors: Priors::default(),
        }
    }
}

impl MultilevelConfig {
    /// Kept draws per chain.
    pub const fn draws_per_chain(&self) -> usize {
        self.iterations.saturating_sub(self.warmup)
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chains == 0 {
            return Err(ModelError::InvalidConfig("at least one chain is required".to_string()));
        }
        if self.draws_per_chain() < 4 {
            return Err(ModelError::InvalidConfig(format!(
                "need at least 4 draws per chain after warmup, got {} iterations with {} warmup",
                self.iterations, self.warmup
            )));
        }
        if !(self.level > 0.0 && self.level < 1.0) {
            return Err(ModelError::InvalidConfig(format!(
                "credible level must be in (0, 1), got {}",
                self.level
            )));
        }
        let p = &self.priors;
        let positive = [
            ("mu_sd", p.mu_sd),
            ("beta_sd", p.beta_sd),
            ("sigma_shape", p.sigma_shape),
            ("sigma_rate", p.sigma_rate),
            ("tau_shape", p.tau_shape),
            ("tau_rate", p.tau_rate),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, v)| !(*v > 0.0 && v.is_finite())) {
            return Err(ModelError::InvalidConfig(format!(
                "prior {} must be positive, got {}",
                name, value
            )));
        }
        Ok(())
    }
}

/// Posterior summary of a multilevel fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultilevelFit {
    /// County estimates (posterior means and credible intervals), by county name.
    pub county_estimates: Vec<CountyEstimate>,
    /// Per-county parameter summaries including R̂.
    pub county_parameters: Vec<ParameterSummary>,
    /// Population mean μ.
    pub mu: ParameterSummary,
    /// Between-county standard deviation τ.
    pub tau: ParameterSummary,
    /// Within-county standard deviation σ.
    pub sigma: ParameterSummary,
    /// Home value slope β, when included.
    pub beta: Option<ParameterSummary>,
    /// Number of chains.
    pub chains: usize,
    /// Kept draws per chain.
    pub draws_per_chain: usize,
}

impl MultilevelFit {
    /// Largest R̂ over every parameter.
    pub fn max_rhat(&self) -> f64 {
        self.all_parameters()
            .map(|p| p.rhat)
            .fold(f64::NAN, f64::max)
    }

    /// Whether every parameter has R̂ below [`RHAT_THRESHOLD`].
    pub fn converged(&self) -> bool {
        self.all_parameters().all(|p| p.rhat < RHAT_THRESHOLD)
    }

    /// Iterate over every summarised parameter.
    pub fn all_parameters(&self) -> impl Iterator<Item = &ParameterSummary> {
        [&self.mu, &self.tau, &self.sigma]
            .into_iter()
            .chain(self.beta.as_ref())
            .chain(self.county_parameters.iter())
    }

    /// Ratio of between-county to total variance, `τ² / (τ² + σ²)`, at the
    /// posterior means.
    pub fn intraclass_correlation(&self) -> f64 {
        let tau2 = self.tau.mean.powi(2);
        let sigma2 = self.sigma.mean.powi(2);
        tau2 / (tau2 + sigma2)
    }
}

/// Multilevel model estimator.
#[derive(Debug, Clone, Default)]
pub struct MultilevelModel {
    config: MultilevelConfig,
}

impl MultilevelModel {
    /// Create a model with the given configuration.
    pub const fn new(config: MultilevelConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub const fn config(&self) -> &MultilevelConfig {
        &self.config
    }

    /// Run the sampler and summarise the posterior.
    ///
    /// # Errors
    /// Fails on invalid configuration, fewer than two counties, or a sampler
    /// distribution that cannot be constructed.
    pub fn fit(&self, tracts: &TractSet) -> Result<MultilevelFit> {
        self.config.validate()?;
        let data = ModelData::from_tracts(tracts, self.config.include_home_value)?;
        let config = &self.config;

        info!(
            tracts = tracts.len(),
            counties = data.n_groups(),
            chains = config.chains,
            iterations = config.iterations,
            "sampling multilevel model"
        );

        let chains: Vec<ChainDraws> = (0..config.chains)
            .into_par_iter()
            .map(|c| run_chain(&data, config, config.seed.wrapping_add(c as u64)))
            .collect::<Result<_>>()?;

        let level = config.level;
        let per_chain =
            |draws: fn(&ChainDraws) -> &[f64]| chains.iter().map(draws).collect::<Vec<_>>();

        let mu = summarize("mu", &per_chain(ChainDraws::mu), level);
        let tau = summarize("tau", &per_chain(ChainDraws::tau), level);
        let sigma = summarize("sigma", &per_chain(ChainDraws::sigma), level);
        let beta = config
            .include_home_value
            .then(|| summarize("beta", &per_chain(ChainDraws::beta), level));

        let county_parameters: Vec<ParameterSummary> = data
            .counties()
            .iter()
            .enumerate()
            .map(|(j, county)| {
                let per_chain: Vec<&[f64]> = chains.iter().map(|c| c.alpha(j)).collect();
                summarize(county, &per_chain, level)
            })
            .collect();

        let county_estimates = county_parameters
            .iter()
            .zip(data.group_sizes())
            .map(|(p, &n)| {
                CountyEstimate::new(
                    p.name.clone(),
                    EstimationMethod::Multilevel,
                    p.mean,
                    p.lower,
                    p.upper,
                    n,
                )
            })
            .collect();

        let fit = MultilevelFit {
            county_estimates,
            county_parameters,
            mu,
            tau,
            sigma,
            beta,
            chains: config.chains,
            draws_per_chain: config.draws_per_chain(),
        };

        if fit.converged() {
            debug!(max_rhat = fit.max_rhat(), "multilevel chains converged");
        } else {
            warn!(
                max_rhat = fit.max_rhat(),
                threshold = RHAT_THRESHOLD,
                "multilevel chains have not converged; increase iterations"
            );
        }

        Ok(fit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = MultilevelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.draws_per_chain(), 1000);
    }

    #[test]
    fn test_invalid_configs() {
        let no_chains = MultilevelConfig {
            chains: 0,
            ..Default::default()
        };
        assert!(no_chains.validate().is_err());

        let all_warmup = MultilevelConfig {
            iterations: 100,
            warmup: 100,
            ..Default::default()
        };
        assert!(all_warmup.validate().is_err());

        let bad_prior = MultilevelConfig {
            priors: Priors {
                tau_rate: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_prior.validate(),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_intraclass_correlation() {
        let summary = |name: &str, mean: f64| ParameterSummary {
            name: name.to_string(),
            mean,
            sd: 0.0,
            lower: mean,
            upper: mean,
            rhat: 1.0,
        };
        let fit = MultilevelFit {
            county_estimates: vec![],
            county_parameters: vec![],
            mu: summary("mu", 0.4),
            tau: summary("tau", 0.03),
            sigma: summary("sigma", 0.04),
            beta: None,
            chains: 1,
            draws_per_chain: 10,
        };
        assert_relative_eq!(fit.intraclass_correlation(), 0.36, epsilon = 1e-12);
        assert!(fit.converged());
        assert_relative_eq!(fit.max_rhat(), 1.0);
    }
}
