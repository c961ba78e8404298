//! Model summaries.

use crate::table::Table;
use gini_models::{MultilevelFit, OlsFit, SimpsonReport};

/// Significance stars for a p-value.
pub fn stars(p_value: f64) -> &'static str {
    if p_value < 0.001 {
        "***"
    } else if p_value < 0.01 {
        "**"
    } else if p_value < 0.05 {
        "*"
    } else if p_value < 0.1 {
        "."
    } else {
        ""
    }
}

fn format_p(p_value: f64) -> String {
    if p_value < 2e-16 {
        "<2e-16".to_string()
    } else if p_value < 1e-4 {
        format!("{:.2e}", p_value)
    } else {
        format!("{:.4}", p_value)
    }
}

/// Regression summary in the usual coefficient-table layout.
#[derive(Debug, Clone, Copy)]
pub struct RegressionSummary<'a> {
    formula: &'a str,
    fit: &'a OlsFit,
}

impl<'a> RegressionSummary<'a> {
    /// Summarise `fit`, labelled with its model formula.
    pub const fn new(formula: &'a str, fit: &'a OlsFit) -> Self {
        Self { formula, fit }
    }

    /// Text summary.
    ///
    /// With many county indicators only the first `max_terms` coefficients are
    /// listed.
    pub fn to_text(&self, max_terms: usize) -> String {
        let fit = self.fit;
        let mut output = String::new();

        output.push_str(&format!("Call:\nlm(formula = {})\n\n", self.formula));

        let (min, q1, median, q3, max) = residual_quantiles(fit);
        output.push_str("Residuals:\n");
        output.push_str(&format!(
            "{:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "Min", "1Q", "Median", "3Q", "Max"
        ));
        output.push_str(&format!(
            "{:>10.5} {:>10.5} {:>10.5} {:>10.5} {:>10.5}\n\n",
            min, q1, median, q3, max
        ));

        output.push_str("Coefficients:\n");
        let width = fit
            .coefficients
            .iter()
            .take(max_terms)
            .map(|c| c.name.len())
            .max()
            .unwrap_or(0)
            .max(11);
        output.push_str(&format!(
            "{:<width$} {:>10} {:>10} {:>8} {:>10}\n",
            "",
            "Estimate",
            "Std. Error",
            "t value",
            "Pr(>|t|)",
            width = width
        ));
        for c in fit.coefficients.iter().take(max_terms) {
            output.push_str(&format!(
                "{:<width$} {:>10.5} {:>10.5} {:>8.3} {:>10} {}\n",
                c.name,
                c.estimate,
                c.std_error,
                c.t_value,
                format_p(c.p_value),
                stars(c.p_value),
                width = width
            ));
        }
        if fit.coefficients.len() > max_terms {
            output.push_str(&format!(
                "... {} more coefficients not shown\n",
                fit.coefficients.len() - max_terms
            ));
        }
        output.push_str("---\nSignif. codes:  0 '***' 0.001 '**' 0.01 '*' 0.05 '.' 0.1 ' ' 1\n\n");

        output.push_str(&format!(
            "Residual standard error: {:.5} on {} degrees of freedom\n",
            fit.sigma, fit.df_residual
        ));
        output.push_str(&format!(
            "Multiple R-squared:  {:.4},\tAdjusted R-squared:  {:.4}\n",
            fit.r_squared, fit.adj_r_squared
        ));
        if let (Some(f), Some(p)) = (fit.f_statistic, fit.f_p_value) {
            output.push_str(&format!(
                "F-statistic: {:.2} on {} and {} DF,  p-value: {}\n",
                f,
                fit.f_df,
                fit.df_residual,
                format_p(p)
            ));
        }
        output
    }

    /// Coefficient table with confidence intervals.
    pub fn coefficient_table(&self) -> Table {
        let level = format!("{:.0}% CI", self.fit.level * 100.0);
        let mut table = Table::new(["Term", "Estimate", "Std. Error", "t value", "p-value", level.as_str()]);
        for c in &self.fit.coefficients {
            table.push_row([
                c.name.clone(),
                format!("{:.5}", c.estimate),
                format!("{:.5}", c.std_error),
                format!("{:.3}", c.t_value),
                format!("{}{}", format_p(c.p_value), stars(c.p_value)),
                format!("[{:.5}, {:.5}]", c.ci_lower, c.ci_upper),
            ]);
        }
        table
    }
}

fn residual_quantiles(fit: &OlsFit) -> (f64, f64, f64, f64, f64) {
    let mut sorted: Vec<f64> = fit.residuals.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q = |p: f64| gini_models::interval::quantile_sorted(&sorted, p).unwrap_or(f64::NAN);
    (q(0.0), q(0.25), q(0.5), q(0.75), q(1.0))
}

/// Hyper-parameter table of a multilevel fit.
pub fn multilevel_table(fit: &MultilevelFit) -> Table {
    let mut table = Table::new(["Parameter", "Mean", "SD", "Lower", "Upper", "R-hat"]);
    let hyper = [Some(&fit.mu), Some(&fit.tau), Some(&fit.sigma), fit.beta.as_ref()];
    for p in hyper.into_iter().flatten() {
        table.push_row([
            p.name.clone(),
            format!("{:.4}", p.mean),
            format!("{:.4}", p.sd),
            format!("{:.4}", p.lower),
            format!("{:.4}", p.upper),
            format!("{:.3}", p.rhat),
        ]);
    }
    table
}

/// Slopes of the pooling analysis.
pub fn simpson_table(report: &SimpsonReport) -> Table {
    let mut table = Table::new(["Slope", "Estimate", "Std. Error", "p-value"]);
    let rows = [
        Some(("Pooled (all tracts)", &report.pooled_slope)),
        Some(("Within county (fixed effects)", &report.within_slope)),
        report.between_slope.as_ref().map(|c| ("Between county (county means)", c)),
    ];
    for (label, c) in rows.into_iter().flatten() {
        table.push_row([
            label.to_string(),
            format!("{:.5}", c.estimate),
            format!("{:.5}", c.std_error),
            format!("{}{}", format_p(c.p_value), stars(c.p_value)),
        ]);
    }
    table
}

/// Per-county slopes of the pooling analysis, steepest negative first.
pub fn county_slope_table(report: &SimpsonReport) -> Table {
    let mut slopes: Vec<_> = report.county_slopes.iter().collect();
    slopes.sort_by(|a, b| a.slope.total_cmp(&b.slope));
    let mut table = Table::new(["County", "Tracts", "Slope", "Std. Error"]);
    for s in slopes {
        table.push_row([
            s.county.clone(),
            s.n_tracts.to_string(),
            format!("{:.5}", s.slope),
            format!("{:.5}", s.std_error),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use gini_data::{Tract, TractSet};
    use gini_models::LinearModel;
    use gini_models::design::pooled;

    fn fit() -> OlsFit {
        let tracts: TractSet = (0..12)
            .map(|i| {
                let value = 200_000.0 + 50_000.0 * i as f64;
                let gini = 0.45 - 0.004 * i as f64 + if i % 2 == 0 { 0.01 } else { -0.01 };
                Tract::new(format!("06001{:06}", i), "Alameda County", gini, value).unwrap()
            })
            .collect();
        let d = pooled(&tracts).unwrap();
        LinearModel::default().fit(&d.x, &d.y, &d.names, true).unwrap()
    }

    #[test]
    fn test_stars() {
        assert_eq!(stars(0.0001), "***");
        assert_eq!(stars(0.03), "*");
        assert_eq!(stars(0.5), "");
    }

    #[test]
    fn test_text_summary_sections() {
        let fit = fit();
        let text = RegressionSummary::new("gini ~ home_value", &fit).to_text(10);
        assert!(text.starts_with("Call:\nlm(formula = gini ~ home_value)"));
        assert!(text.contains("Residuals:"));
        assert!(text.contains("(Intercept)"));
        assert!(text.contains("home_value"));
        assert!(text.contains("on 10 degrees of freedom"));
        assert!(text.contains("F-statistic"));
    }

    #[test]
    fn test_truncated_terms() {
        let fit = fit();
        let text = RegressionSummary::new("gini ~ home_value", &fit).to_text(1);
        assert!(text.contains("... 1 more coefficients not shown"));
    }

    #[test]
    fn test_coefficient_table() {
        let fit = fit();
        let table = RegressionSummary::new("gini ~ home_value", &fit).coefficient_table();
        assert_eq!(table.len(), 2);
        assert_eq!(table.headers[5], "95% CI");
        assert_eq!(table.rows[1][0], "home_value");
    }
}
