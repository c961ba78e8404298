#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/gini/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod county_average;
pub mod dag;
pub mod design;
pub mod error;
pub mod estimate;
pub mod fixed_effects;
pub mod interval;
pub mod linalg;
pub mod multilevel;
pub mod ols;
pub mod simpson;

// Re-export main types
pub use county_average::CountyAverageEstimator;
pub use dag::CausalGraph;
pub use error::{ModelError, Result};
pub use estimate::{CountyEstimate, EstimateComparison, EstimationMethod};
pub use fixed_effects::{FixedEffectsFit, FixedEffectsModel};
pub use multilevel::diagnostics::ParameterSummary;
pub use multilevel::{MultilevelConfig, MultilevelFit, MultilevelModel, Priors};
pub use ols::{Coefficient, LinearModel, OlsFit};
pub use simpson::{CountySlope, SimpsonAnalysis, SimpsonReport};
