//! Gibbs sampler for the varying-intercept model.

use super::MultilevelConfig;
use crate::error::{ModelError, Result};
use gini_data::TractSet;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma, StandardNormal};

/// Sampler inputs with tracts grouped by county.
#[derive(Debug, Clone)]
pub struct ModelData {
    counties: Vec<String>,
    groups: Vec<usize>,
    group_sizes: Vec<usize>,
    y: Vec<f64>,
    /// Centered scaled home values, when the slope is modelled.
    x: Option<Vec<f64>>,
}

impl ModelData {
    /// Build sampler inputs.
    ///
    /// # Errors
    /// Requires at least two counties, otherwise τ is not identified.
    pub fn from_tracts(tracts: &TractSet, include_home_value: bool) -> Result<Self> {
        let (counties, groups) = tracts.county_index();
        if counties.len() < 2 {
            return Err(ModelError::InsufficientData {
                required: 2,
                actual: counties.len(),
            });
        }

        let mut group_sizes = vec![0_usize; counties.len()];
        for &g in &groups {
            group_sizes[g] += 1;
        }

        let x = include_home_value.then(|| {
            let values = tracts.home_values_scaled();
            let center = values.iter().sum::<f64>() / values.len() as f64;
            values.into_iter().map(|v| v - center).collect()
        });

        Ok(Self {
            counties,
            groups,
            group_sizes,
            y: tracts.ginis(),
            x,
        })
    }

    /// County names, indexed by group.
    pub fn counties(&self) -> &[String] {
        &self.counties
    }

    /// Tracts per county.
    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    /// Number of counties.
    pub fn n_groups(&self) -> usize {
        self.counties.len()
    }

    /// Number of tracts.
    pub fn n_obs(&self) -> usize {
        self.y.len()
    }
}

/// Kept draws from one chain.
#[derive(Debug, Clone)]
pub struct ChainDraws {
    /// County intercepts, `alpha[j][draw]`.
    alpha: Vec<Vec<f64>>,
    mu: Vec<f64>,
    tau: Vec<f64>,
    sigma: Vec<f64>,
    beta: Vec<f64>,
}

impl ChainDraws {
    fn with_capacity(n_groups: usize, draws: usize) -> Self {
        Self {
            alpha: vec![Vec::with_capacity(draws); n_groups],
            mu: Vec::with_capacity(draws),
            tau: Vec::with_capacity(draws),
            sigma: Vec::with_capacity(draws),
            beta: Vec::with_capacity(draws),
        }
    }

    /// Draws of county intercept `j`.
    pub fn alpha(&self, j: usize) -> &[f64] {
        &self.alpha[j]
    }

    /// Draws of μ.
    pub fn mu(&self) -> &[f64] {
        &self.mu
    }

    /// Draws of τ (standard deviation scale).
    pub fn tau(&self) -> &[f64] {
        &self.tau
    }

    /// Draws of σ (standard deviation scale).
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    /// Draws of β; empty when the slope is not modelled.
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    /// Kept draws.
    pub fn len(&self) -> usize {
        self.mu.len()
    }

    /// Whether no draws were kept.
    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }
}

/// Current sampler state.
struct State {
    alpha: Vec<f64>,
    mu: f64,
    tau2: f64,
    sigma2: f64,
    beta: f64,
}

fn normal(rng: &mut StdRng, mean: f64, precision: f64) -> f64 {
    let z: f64 = rng.sample(StandardNormal);
    mean + z / precision.sqrt()
}

/// Draw from InvGamma(shape, rate) as `rate / Gamma(shape, 1)`.
fn inv_gamma(rng: &mut StdRng, unit: &Gamma<f64>, rate: f64) -> f64 {
    rate / unit.sample(rng)
}

fn unit_gamma(shape: f64) -> Result<Gamma<f64>> {
    Gamma::new(shape, 1.0).map_err(|e| ModelError::Distribution(e.to_string()))
}

/// Starting values: jittered county means, their mean and spread.
fn initial_state(data: &ModelData, rng: &mut StdRng) -> State {
    let mut sums = vec![0.0; data.n_groups()];
    for (&g, &y) in data.groups.iter().zip(&data.y) {
        sums[g] += y;
    }
    let alpha: Vec<f64> = sums
        .iter()
        .zip(&data.group_sizes)
        .map(|(s, &n)| {
            let jitter: f64 = rng.sample(StandardNormal);
            s / n as f64 + 0.01 * jitter
        })
        .collect();

    let j = alpha.len() as f64;
    let mu = alpha.iter().sum::<f64>() / j;
    let tau2 = (alpha.iter().map(|a| (a - mu).powi(2)).sum::<f64>() / j).max(1e-4);

    let y_mean = data.y.iter().sum::<f64>() / data.n_obs() as f64;
    let sigma2 = (data.y.iter().map(|y| (y - y_mean).powi(2)).sum::<f64>()
        / data.n_obs() as f64)
        .max(1e-4);

    State {
        alpha,
        mu,
        tau2,
        sigma2,
        beta: 0.0,
    }
}

/// Run one chain.
///
/// Each sweep updates the county intercepts, the slope, μ, τ² and σ² from
/// their full conditionals, in that order.
pub fn run_chain(data: &ModelData, config: &MultilevelConfig, seed: u64) -> Result<ChainDraws> {
    let priors = &config.priors;
    let mut rng = StdRng::seed_from_u64(seed);

    let n_groups = data.n_groups();
    let j = n_groups as f64;
    let n = data.n_obs() as f64;
    let tau_gamma = unit_gamma(priors.tau_shape + j / 2.0)?;
    let sigma_gamma = unit_gamma(priors.sigma_shape + n / 2.0)?;
    let sxx: f64 = data.x.as_ref().map_or(0.0, |x| x.iter().map(|v| v * v).sum());

    let mut state = initial_state(data, &mut rng);
    let mut draws = ChainDraws::with_capacity(n_groups, config.draws_per_chain());
    let mut group_sums = vec![0.0; n_groups];

    for iteration in 0..config.iterations {
        // County intercepts
        group_sums.iter_mut().for_each(|s| *s = 0.0);
        for (i, (&g, &y)) in data.groups.iter().zip(&data.y).enumerate() {
            let slope_term = data.x.as_ref().map_or(0.0, |x| state.beta * x[i]);
            group_sums[g] += y - slope_term;
        }
        for (g, alpha) in state.alpha.iter_mut().enumerate() {
            let precision = data.group_sizes[g] as f64 / state.sigma2 + 1.0 / state.tau2;
            let mean = (group_sums[g] / state.sigma2 + state.mu / state.tau2) / precision;
            *alpha = normal(&mut rng, mean, precision);
        }

        // Home value slope
        if let Some(x) = &data.x {
            let sxy: f64 = data
                .groups
                .iter()
                .zip(&data.y)
                .zip(x)
                .map(|((&g, &y), &xi)| xi * (y - state.alpha[g]))
                .sum();
            let precision = sxx / state.sigma2 + 1.0 / priors.beta_sd.powi(2);
            state.beta = normal(&mut rng, (sxy / state.sigma2) / precision, precision);
        }

        // Population mean
        let alpha_sum: f64 = state.alpha.iter().sum();
        let precision = j / state.tau2 + 1.0 / priors.mu_sd.powi(2);
        let mean = (alpha_sum / state.tau2 + priors.mu_mean / priors.mu_sd.powi(2)) / precision;
        state.mu = normal(&mut rng, mean, precision);

        // Between-county variance
        let ss_alpha: f64 = state.alpha.iter().map(|a| (a - state.mu).powi(2)).sum();
        state.tau2 = inv_gamma(&mut rng, &tau_gamma, priors.tau_rate + ss_alpha / 2.0);

        // Within-county variance
        let rss: f64 = data
            .groups
            .iter()
            .zip(&data.y)
            .enumerate()
            .map(|(i, (&g, &y))| {
                let slope_term = data.x.as_ref().map_or(0.0, |x| state.beta * x[i]);
                (y - state.alpha[g] - slope_term).powi(2)
            })
            .sum();
        state.sigma2 = inv_gamma(&mut rng, &sigma_gamma, priors.sigma_rate + rss / 2.0);

        if iteration >= config.warmup {
            for (g, alpha) in state.alpha.iter().enumerate() {
                draws.alpha[g].push(*alpha);
            }
            draws.mu.push(state.mu);
            draws.tau.push(state.tau2.sqrt());
            draws.sigma.push(state.sigma2.sqrt());
            if data.x.is_some() {
                draws.beta.push(state.beta);
            }
        }
    }

    Ok(draws)
}
