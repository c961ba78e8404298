//! Integration tests comparing the three county estimation methods.

use approx::assert_relative_eq;
use gini_data::{Tract, TractSet};
use gini_models::{
    CountyAverageEstimator, EstimateComparison, EstimationMethod, FixedEffectsModel,
    MultilevelConfig, MultilevelModel, SimpsonAnalysis,
};
use rstest::{fixture, rstest};

const SMALL: &str = "Small County";

/// Five large counties around 0.42 and one two-tract county far above them.
#[fixture]
fn tracts() -> TractSet {
    let mut tracts = Vec::new();
    for c in 0..5 {
        let county = format!("Large {} County", c);
        for i in 0..20 {
            let gini = 0.40 + 0.01 * c as f64 + 0.06 * (1.3 * i as f64).sin();
            let value = 300_000.0 + 20_000.0 * i as f64 + 50_000.0 * c as f64;
            tracts.push(Tract::new(format!("06{:03}{:06}", 2 * c + 1, i + 1), county.clone(), gini, value).unwrap());
        }
    }
    tracts.push(Tract::new("06099000001", SMALL, 0.55, 900_000.0).unwrap());
    tracts.push(Tract::new("06099000002", SMALL, 0.57, 950_000.0).unwrap());
    tracts.into_iter().collect()
}

fn config() -> MultilevelConfig {
    MultilevelConfig {
        chains: 2,
        iterations: 1500,
        warmup: 500,
        seed: 99,
        ..Default::default()
    }
}

#[rstest]
fn test_small_county_is_shrunk_toward_grand_mean(tracts: TractSet) {
    let raw = CountyAverageEstimator::default().estimate(&tracts).unwrap();
    let multilevel = MultilevelModel::new(config()).fit(&tracts).unwrap();
    let comparison = EstimateComparison::new([raw, multilevel.county_estimates.clone()]).unwrap();

    let raw_small = comparison.get(SMALL, EstimationMethod::CountyAverage).unwrap();
    let ml_small = comparison.get(SMALL, EstimationMethod::Multilevel).unwrap();
    let grand = comparison.grand_mean().unwrap();

    assert_relative_eq!(raw_small.estimate, 0.56, epsilon = 1e-12);
    assert!(ml_small.estimate < raw_small.estimate);
    assert!(ml_small.estimate > grand);

    let shrinkage = comparison.shrinkage(SMALL).unwrap();
    assert!(shrinkage > 0.0 && shrinkage < 1.0, "shrinkage = {shrinkage}");

    // Large counties carry enough tracts to stay close to their own mean
    let raw_large = comparison.get("Large 0 County", EstimationMethod::CountyAverage).unwrap();
    let ml_large = comparison.get("Large 0 County", EstimationMethod::Multilevel).unwrap();
    assert!((raw_large.estimate - ml_large.estimate).abs() < 0.01);
}

#[rstest]
fn test_multilevel_is_deterministic_and_converges(tracts: TractSet) {
    let model = MultilevelModel::new(config());
    let first = model.fit(&tracts).unwrap();
    let second = model.fit(&tracts).unwrap();

    assert_eq!(first.county_estimates, second.county_estimates);
    assert_eq!(first.mu, second.mu);
    assert_eq!(first.chains, 2);
    assert_eq!(first.draws_per_chain, 1000);
    assert!(first.max_rhat() < 1.1, "max rhat = {}", first.max_rhat());
    assert!(first.tau.mean > 0.0 && first.sigma.mean > 0.0);
    for estimate in &first.county_estimates {
        assert!(estimate.lower <= estimate.estimate && estimate.estimate <= estimate.upper);
    }
}

#[rstest]
fn test_three_method_comparison(tracts: TractSet) {
    let raw = CountyAverageEstimator::default().estimate(&tracts).unwrap();
    let fixed = FixedEffectsModel::intercepts_only().fit(&tracts).unwrap();
    let multilevel = MultilevelModel::new(config()).fit(&tracts).unwrap();

    let comparison =
        EstimateComparison::new([raw, fixed.county_estimates, multilevel.county_estimates]).unwrap();

    assert_eq!(comparison.len(), 18);
    assert_eq!(comparison.methods(), EstimationMethod::all().to_vec());
    assert_eq!(comparison.counties_by_size()[0], SMALL);
    assert_eq!(comparison.for_county(SMALL).len(), 3);

    // The pooled residual variance narrows the small county's interval
    let raw_small = comparison.get(SMALL, EstimationMethod::CountyAverage).unwrap();
    let fe_small = comparison.get(SMALL, EstimationMethod::FixedEffects).unwrap();
    assert_relative_eq!(raw_small.estimate, fe_small.estimate, epsilon = 1e-10);
    assert!(fe_small.width() < raw_small.width());
}

#[rstest]
fn test_multilevel_with_home_value(tracts: TractSet) {
    let model = MultilevelModel::new(MultilevelConfig {
        include_home_value: true,
        ..config()
    });
    let fit = model.fit(&tracts).unwrap();
    let beta = fit.beta.as_ref().unwrap();
    assert_eq!(beta.name, "beta");
    assert!(beta.lower <= beta.mean && beta.mean <= beta.upper);
    assert!(fit.all_parameters().count() == 4 + 6);
}

#[rstest]
fn test_simpson_analysis_on_fixture(tracts: TractSet) {
    let report = SimpsonAnalysis::new(10).analyze(&tracts).unwrap();
    // Only the five large counties meet the tract threshold
    assert_eq!(report.county_slopes.len(), 5);
    assert!(report.between_slope.is_some());
    assert_eq!(report.pooled.n_obs, 102);
}
