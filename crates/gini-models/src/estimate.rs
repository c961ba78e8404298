//! County-level estimates and their comparison across methods.

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a county estimate was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EstimationMethod {
    /// Raw mean of the county's tracts (no pooling).
    CountyAverage,
    /// County indicator regression with pooled residual variance.
    FixedEffects,
    /// Bayesian varying-intercept model (partial pooling).
    Multilevel,
}

impl EstimationMethod {
    /// All methods in presentation order.
    pub const fn all() -> [Self; 3] {
        [Self::CountyAverage, Self::FixedEffects, Self::Multilevel]
    }

    /// Display label.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CountyAverage => "County Average",
            Self::FixedEffects => "Fixed Effects Model",
            Self::Multilevel => "Multilevel Model",
        }
    }
}

impl fmt::Display for EstimationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point estimate and interval of a county's Gini Index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountyEstimate {
    /// County name.
    pub county: String,
    /// Method that produced the estimate.
    pub method: EstimationMethod,
    /// Point estimate.
    pub estimate: f64,
    /// Lower interval bound.
    pub lower: f64,
    /// Upper interval bound.
    pub upper: f64,
    /// Number of tracts behind the estimate.
    pub n_tracts: usize,
}

impl CountyEstimate {
    /// Create an estimate from an interval around the point estimate.
    ///
    /// Bounds that do not bracket the estimate are widened to include it.
    /// Reversed bounds are a caller bug: debug builds panic, release builds
    /// reorder them.
    pub fn new(
        county: impl Into<String>,
        method: EstimationMethod,
        estimate: f64,
        lower: f64,
        upper: f64,
        n_tracts: usize,
    ) -> Self {
        debug_assert!(
            lower.is_nan() || upper.is_nan() || lower <= upper,
            "reversed interval [{}, {}]",
            lower,
            upper
        );
        Self {
            county: county.into(),
            method,
            estimate,
            lower: lower.min(upper).min(estimate),
            upper: upper.max(lower).max(estimate),
            n_tracts,
        }
    }

    /// Interval width.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Whether `value` lies inside the interval.
    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

impl fmt::Display for CountyEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {:.4} ({:.4}, {:.4}), n = {}",
            self.county, self.method, self.estimate, self.lower, self.upper, self.n_tracts
        )
    }
}

/// Long-format collection of estimates from several methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateComparison {
    estimates: Vec<CountyEstimate>,
}

impl EstimateComparison {
    /// Combine estimate sets.
    ///
    /// # Errors
    /// Fails if a (county, method) pair appears twice.
    pub fn new<I>(sets: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<CountyEstimate>>,
    {
        let mut seen = BTreeMap::new();
        let mut estimates = Vec::new();
        for estimate in sets.into_iter().flatten() {
            let key = (estimate.county.clone(), estimate.method);
            if seen.insert(key, ()).is_some() {
                return Err(ModelError::DimensionMismatch(format!(
                    "duplicate estimate for {} ({})",
                    estimate.county, estimate.method
                )));
            }
            estimates.push(estimate);
        }
        Ok(Self { estimates })
    }

    /// All estimates.
    pub fn estimates(&self) -> &[CountyEstimate] {
        &self.estimates
    }

    /// Number of estimates.
    pub const fn len(&self) -> usize {
        self.estimates.len()
    }

    /// Whether the comparison is empty.
    pub const fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Methods present, in presentation order.
    pub fn methods(&self) -> Vec<EstimationMethod> {
        EstimationMethod::all()
            .into_iter()
            .filter(|m| self.estimates.iter().any(|e| e.method == *m))
            .collect()
    }

    /// Estimate for a county and method.
    pub fn get(&self, county: &str, method: EstimationMethod) -> Option<&CountyEstimate> {
        self.estimates
            .iter()
            .find(|e| e.county == county && e.method == method)
    }

    /// All estimates for one county.
    pub fn for_county(&self, county: &str) -> Vec<&CountyEstimate> {
        self.estimates.iter().filter(|e| e.county == county).collect()
    }

    /// All estimates from one method.
    pub fn for_method(&self, method: EstimationMethod) -> Vec<&CountyEstimate> {
        self.estimates.iter().filter(|e| e.method == method).collect()
    }

    /// Counties ordered by tract count (ascending), ties by name.
    pub fn counties_by_size(&self) -> Vec<String> {
        let mut sizes: BTreeMap<&str, usize> = BTreeMap::new();
        for e in &self.estimates {
            let n = sizes.entry(e.county.as_str()).or_default();
            *n = (*n).max(e.n_tracts);
        }
        let mut counties: Vec<(&str, usize)> = sizes.into_iter().collect();
        counties.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        counties.into_iter().map(|(c, _)| c.to_string()).collect()
    }

    /// Mean interval width of a method, if it has estimates.
    pub fn mean_interval_width(&self, method: EstimationMethod) -> Option<f64> {
        let widths: Vec<f64> = self.for_method(method).iter().map(|e| e.width()).collect();
        crate::interval::mean(&widths)
    }

    /// Tract-weighted grand mean of the raw county averages.
    pub fn grand_mean(&self) -> Option<f64> {
        let raw = self.for_method(EstimationMethod::CountyAverage);
        let total: usize = raw.iter().map(|e| e.n_tracts).sum();
        (total > 0).then(|| {
            raw.iter()
                .map(|e| e.estimate * e.n_tracts as f64)
                .sum::<f64>()
                / total as f64
        })
    }

    /// Fraction of the distance from the raw average to the grand mean that
    /// the multilevel estimate travelled.
    ///
    /// 0 means no pooling, 1 means complete pooling. `None` when either
    /// estimate is missing or the raw average equals the grand mean.
    pub fn shrinkage(&self, county: &str) -> Option<f64> {
        let raw = self.get(county, EstimationMethod::CountyAverage)?.estimate;
        let pooled = self.get(county, EstimationMethod::Multilevel)?.estimate;
        let grand = self.grand_mean()?;
        let gap = raw - grand;
        (gap.abs() > 1e-12).then(|| (raw - pooled) / gap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn comparison() -> EstimateComparison {
        EstimateComparison::new([
            vec![
                CountyEstimate::new("A", EstimationMethod::CountyAverage, 0.50, 0.40, 0.60, 2),
                CountyEstimate::new("B", EstimationMethod::CountyAverage, 0.40, 0.38, 0.42, 8),
            ],
            vec![
                CountyEstimate::new("A", EstimationMethod::Multilevel, 0.45, 0.41, 0.49, 2),
                CountyEstimate::new("B", EstimationMethod::Multilevel, 0.41, 0.39, 0.43, 8),
            ],
        ])
        .unwrap()
    }

    #[test]
    fn test_labels() {
        assert_eq!(EstimationMethod::CountyAverage.label(), "County Average");
        assert_eq!(EstimationMethod::FixedEffects.label(), "Fixed Effects Model");
        assert_eq!(EstimationMethod::Multilevel.label(), "Multilevel Model");
    }

    #[test]
    fn test_bounds_bracket_estimate() {
        let e = CountyEstimate::new("A", EstimationMethod::FixedEffects, 0.5, 0.4, 0.6, 3);
        assert!(e.lower <= e.estimate && e.estimate <= e.upper);
        assert_relative_eq!(e.width(), 0.2);
        assert!(e.contains(0.45));

        let widened = CountyEstimate::new("A", EstimationMethod::FixedEffects, 0.7, 0.4, 0.6, 3);
        assert_relative_eq!(widened.lower, 0.4);
        assert_relative_eq!(widened.upper, 0.7);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "reversed interval")]
    fn test_reversed_bounds_panic_in_debug() {
        CountyEstimate::new("A", EstimationMethod::FixedEffects, 0.5, 0.6, 0.4, 3);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn test_reversed_bounds_reordered_in_release() {
        let e = CountyEstimate::new("A", EstimationMethod::FixedEffects, 0.5, 0.6, 0.4, 3);
        assert_relative_eq!(e.lower, 0.4);
        assert_relative_eq!(e.upper, 0.6);
    }

    #[test]
    fn test_duplicate_rejected() {
        let dup = EstimateComparison::new([
            vec![CountyEstimate::new("A", EstimationMethod::CountyAverage, 0.5, 0.4, 0.6, 2)],
            vec![CountyEstimate::new("A", EstimationMethod::CountyAverage, 0.5, 0.4, 0.6, 2)],
        ]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_lookups() {
        let c = comparison();
        assert_eq!(c.len(), 4);
        assert_eq!(
            c.methods(),
            vec![EstimationMethod::CountyAverage, EstimationMethod::Multilevel]
        );
        assert_eq!(c.for_county("A").len(), 2);
        assert_eq!(c.counties_by_size(), vec!["A", "B"]);
        assert_relative_eq!(
            c.mean_interval_width(EstimationMethod::CountyAverage).unwrap(),
            0.12,
            epsilon = 1e-12
        );
        assert!(c.mean_interval_width(EstimationMethod::FixedEffects).is_none());
    }

    #[test]
    fn test_shrinkage() {
        let c = comparison();
        // grand mean = (0.5 * 2 + 0.4 * 8) / 10 = 0.42
        assert_relative_eq!(c.grand_mean().unwrap(), 0.42, epsilon = 1e-12);
        // A: (0.50 - 0.45) / (0.50 - 0.42) = 0.625
        assert_relative_eq!(c.shrinkage("A").unwrap(), 0.625, epsilon = 1e-12);
        assert!(c.shrinkage("missing").is_none());
    }
}
