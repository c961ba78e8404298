//! Assembles the HTML report from an [`Analysis`].

use super::analysis::Analysis;
use super::config::AppConfig;
use gini_data::TractSet;
use gini_models::EstimationMethod;
use gini_output::svg::{FittedLine, color};
use gini_output::{
    DagPlot, IntervalPlot, RegressionSummary, Report, ReportBuilder, ReportError, ScatterPlot,
    Section, Table, county_slope_table, multilevel_table, simpson_table,
};

/// Counties shown in the interval plot: the smallest and the largest.
const SMALLEST: usize = 12;
const LARGEST: usize = 6;

/// Build the full report.
pub(crate) fn build_report(
    tracts: &TractSet,
    analysis: &Analysis,
    config: &AppConfig,
    failed: &[String],
) -> Result<Report, ReportError> {
    let census = &config.census;
    ReportBuilder::new()
        .title("Income inequality and home values in California")
        .subtitle(format!(
            "Census tracts, ACS {} {} (Gini Index B19083, median home value B25077)",
            census.survey, census.year
        ))
        .section(data_section(tracts, analysis, failed))
        .section(pooling_section(tracts, analysis, &config.output.highlight))
        .section(causal_section(analysis))
        .section(estimates_section(analysis))
        .section(multilevel_section(analysis))
        .build()
}

fn data_section(tracts: &TractSet, analysis: &Analysis, failed: &[String]) -> Section {
    let mut table = Table::new(["County", "Tracts", "Mean Gini", "Median home value"]);
    let mut groups: Vec<_> = tracts.by_county().into_iter().collect();
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));
    for (county, members) in &groups {
        let n = members.len() as f64;
        let mean_gini = members.iter().map(|t| t.gini).sum::<f64>() / n;
        let mut values: Vec<f64> = members.iter().map(|t| t.median_home_value).collect();
        values.sort_by(f64::total_cmp);
        let median = gini_models::interval::quantile_sorted(&values, 0.5).unwrap_or(f64::NAN);
        table.push_row([
            county.to_string(),
            members.len().to_string(),
            format!("{:.3}", mean_gini),
            format!("${:.0}", median),
        ]);
    }

    let mut section = Section::new("Data").paragraph(format!(
        "{} tracts across {} counties with both a Gini Index and a median home value. \
         Tracts with missing or suppressed estimates were dropped.",
        analysis.n_tracts, analysis.n_counties
    ));
    if !failed.is_empty() {
        section = section.paragraph(format!(
            "Download failed for {}; these counties are missing from every result below.",
            failed.join(", ")
        ));
    }
    section.table(Some("Tracts per county"), table)
}

fn pooling_section(tracts: &TractSet, analysis: &Analysis, highlight: &[String]) -> Section {
    let simpson = &analysis.simpson;
    let pooled = &simpson.pooled;
    let groups = tracts.by_county();

    let mut scatter = ScatterPlot::tracts(tracts, highlight).line(
        "All tracts",
        pooled.coefficient("(Intercept)").map_or(0.0, |c| c.estimate),
        simpson.pooled_slope.estimate,
        "#000000",
        false,
    );
    for (i, county) in highlight.iter().enumerate() {
        let slope = simpson.county_slopes.iter().find(|s| &s.county == county);
        if let (Some(slope), Some(members)) = (slope, groups.get(county.as_str())) {
            let xs = members.iter().map(|t| t.home_value_scaled());
            let lo = xs.clone().fold(f64::INFINITY, f64::min);
            let hi = xs.fold(f64::NEG_INFINITY, f64::max);
            scatter = scatter.line_over(FittedLine {
                label: format!("{} fit", county),
                intercept: slope.intercept,
                slope: slope.slope,
                x_range: (lo, hi),
                color: color(i).to_string(),
                dashed: true,
            });
        }
    }

    let mut section = Section::new("Pooling and reversal")
        .paragraph(simpson.headline())
        .figure(
            "Tract Gini Index against median home value; the solid line pools every tract, \
             dashed lines are fitted within highlighted counties",
            scatter.render(),
        )
        .table(Some("Slopes per $100k of median home value"), simpson_table(simpson))
        .preformatted(RegressionSummary::new("gini ~ home_value", pooled).to_text(4));

    if let Some(share) = simpson.opposite_share() {
        section = section.paragraph(format!(
            "{} of {} counties ({:.0}%) have a within-county slope of opposite sign to the pooled slope.",
            simpson.n_opposite,
            simpson.county_slopes.len(),
            share * 100.0
        ));
    }
    section.table(Some("Within-county slopes"), county_slope_table(simpson))
}

fn causal_section(analysis: &Analysis) -> Section {
    let graph = &analysis.graph;
    let confounders: Vec<&str> = graph.confounders().into_iter().collect();
    let text = if confounders.is_empty() {
        format!(
            "The assumed graph has no confounders of {} and {}.",
            graph.exposure(),
            graph.outcome()
        )
    } else {
        format!(
            "{} affects both {} and {}, so the pooled association mixes the effect of \
             {} with differences between counties. Adjusting for {} closes that path.",
            confounders.join(", "),
            graph.exposure(),
            graph.outcome(),
            graph.exposure(),
            confounders.join(", ")
        )
    };
    Section::new("Causal structure")
        .paragraph(text)
        .figure("Assumed causal graph", DagPlot::new(graph, "Assumed causal graph").render())
}

fn estimates_section(analysis: &Analysis) -> Section {
    let comparison = &analysis.comparison;
    let by_size = comparison.counties_by_size();
    let mut shown: Vec<String> = by_size.iter().take(SMALLEST).cloned().collect();
    for county in by_size.iter().rev().take(LARGEST).rev() {
        if !shown.contains(county) {
            shown.push(county.clone());
        }
    }

    let mut plot = IntervalPlot::new("County Gini Index by estimation method", comparison).counties(shown);
    if let Some(grand) = comparison.grand_mean() {
        plot = plot.reference("Grand mean", grand);
    }

    let mut section = Section::new("County estimates").figure(
        "Smallest and largest counties by tract count, with intervals from each method",
        plot.render(),
    );

    if let Some(smallest) = by_size.first()
        && let (Some(raw), Some(pooled)) = (
            comparison.get(smallest, EstimationMethod::CountyAverage),
            comparison.get(smallest, EstimationMethod::Multilevel),
        )
    {
        section = section.paragraph(format!(
            "{} has {} tract(s). Its raw average is {:.3}; the multilevel estimate is {:.3}, \
             pulled toward the statewide mean.",
            smallest, raw.n_tracts, raw.estimate, pooled.estimate
        ));
    }

    section
        .table(Some("Mean interval width"), Table::interval_widths(comparison))
        .table(Some("Estimates with 95% intervals"), Table::estimates(comparison))
}

fn multilevel_section(analysis: &Analysis) -> Section {
    let fit = &analysis.multilevel;
    let convergence = if fit.converged() {
        format!("All R-hat values are below 1.05 (max {:.3}).", fit.max_rhat())
    } else {
        format!(
            "Some R-hat values exceed 1.05 (max {:.3}); run more iterations before relying on these results.",
            fit.max_rhat()
        )
    };
    Section::new("Multilevel model")
        .paragraph(format!(
            "{} chains with {} draws each after warmup. County effects explain {:.0}% of tract-level \
             variance in the Gini Index. {}",
            fit.chains,
            fit.draws_per_chain,
            fit.intraclass_correlation() * 100.0,
            convergence
        ))
        .table(Some("Hyper-parameters"), multilevel_table(fit))
        .preformatted(
            RegressionSummary::new("gini ~ 0 + county", &analysis.fixed_effects.ols).to_text(8),
        )
}
