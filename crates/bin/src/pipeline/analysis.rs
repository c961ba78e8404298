//! Model runs shared by the `simpson`, `compare` and `report` commands.

use super::config::ModelSettings;
use gini_data::TractSet;
use gini_models::{
    CausalGraph, CountyAverageEstimator, EstimateComparison, FixedEffectsFit, FixedEffectsModel,
    ModelError, MultilevelFit, MultilevelModel, SimpsonAnalysis, SimpsonReport,
};
use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

/// Results of every estimator on one tract set.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct Analysis {
    /// Tracts analysed.
    pub n_tracts: usize,
    /// Counties analysed.
    pub n_counties: usize,
    /// Pooled versus within-county slopes.
    pub simpson: SimpsonReport,
    /// County indicator regression.
    pub fixed_effects: FixedEffectsFit,
    /// Partial pooling fit.
    pub multilevel: MultilevelFit,
    /// Estimates of all three methods, long format.
    pub comparison: EstimateComparison,
    /// Causal structure behind the county adjustment.
    pub graph: CausalGraph,
}

/// Run the pooling analysis only.
pub(crate) fn run_simpson(tracts: &TractSet, settings: &ModelSettings) -> Result<SimpsonReport, ModelError> {
    SimpsonAnalysis::new(settings.min_tracts).analyze(tracts)
}

/// Run the pooling analysis and all three county estimators.
pub(crate) fn run_analysis(tracts: &TractSet, settings: &ModelSettings) -> Result<Analysis, ModelError> {
    let start = Instant::now();
    let simpson = run_simpson(tracts, settings)?;

    let raw = CountyAverageEstimator::default().estimate(tracts)?;

    let fe_model = if settings.include_home_value {
        FixedEffectsModel::with_home_value()
    } else {
        FixedEffectsModel::intercepts_only()
    };
    let fixed_effects = fe_model.fit(tracts)?;

    let multilevel = MultilevelModel::new(settings.multilevel()).fit(tracts)?;
    if !multilevel.converged() {
        warn!(max_rhat = multilevel.max_rhat(), "sampler has not converged, consider more iterations");
    }

    let comparison = EstimateComparison::new([
        raw,
        fixed_effects.county_estimates.clone(),
        multilevel.county_estimates.clone(),
    ])?;

    info!(
        tracts = tracts.len(),
        counties = tracts.counties().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "analysis complete"
    );

    Ok(Analysis {
        n_tracts: tracts.len(),
        n_counties: tracts.counties().len(),
        simpson,
        fixed_effects,
        multilevel,
        comparison,
        graph: CausalGraph::default(),
    })
}
