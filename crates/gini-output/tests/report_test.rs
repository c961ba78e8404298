//! Integration tests assembling a full report from fitted models.

use gini_data::{Tract, TractSet};
use gini_models::{
    CausalGraph, CountyAverageEstimator, EstimateComparison, FixedEffectsModel, SimpsonAnalysis,
};
use gini_output::{
    DagPlot, ExportFormat, Exporter, IntervalPlot, RegressionSummary, ReportBuilder, ScatterPlot,
    Section, Table, simpson_table,
};

fn tracts() -> TractSet {
    let mut tracts = Vec::new();
    for (c, (county, base_value, base_gini)) in [
        ("Alameda County", 8.0, 0.44),
        ("Fresno County", 3.0, 0.38),
        ("Marin County", 12.0, 0.50),
    ]
    .into_iter()
    .enumerate()
    {
        for i in 0..6 {
            let offset = i as f64 - 2.5;
            tracts.push(
                Tract::new(
                    format!("06{:03}{:06}", 2 * c + 1, i + 1),
                    county,
                    base_gini - 0.008 * offset + 0.002 * (i % 2) as f64,
                    (base_value + 0.6 * offset) * 100_000.0,
                )
                .unwrap(),
            );
        }
    }
    tracts.into_iter().collect()
}

#[test]
fn test_full_report_workflow() {
    let tracts = tracts();
    let simpson = SimpsonAnalysis::new(3).analyze(&tracts).unwrap();
    assert!(simpson.reversal);

    let raw = CountyAverageEstimator::default().estimate(&tracts).unwrap();
    let fixed = FixedEffectsModel::intercepts_only().fit(&tracts).unwrap();
    let comparison = EstimateComparison::new([raw, fixed.county_estimates]).unwrap();

    let pooled = &simpson.pooled;
    let scatter = ScatterPlot::tracts(&tracts, &["Marin County".to_string()])
        .line(
            "Pooled fit",
            pooled.coefficients[0].estimate,
            pooled.coefficients[1].estimate,
            "#000000",
            false,
        )
        .render();
    let intervals = IntervalPlot::new("County estimates", &comparison).render();
    let graph = CausalGraph::default();
    let dag = DagPlot::new(&graph, "Assumed causal structure").render();

    let report = ReportBuilder::new()
        .title("Income inequality and home values in California")
        .section(
            Section::new("Pooling")
                .paragraph(simpson.headline())
                .figure("Tracts", scatter)
                .table(Some("Slopes"), simpson_table(&simpson))
                .preformatted(RegressionSummary::new("gini ~ home_value", pooled).to_text(5)),
        )
        .section(
            Section::new("County estimates")
                .figure("Intervals", intervals)
                .figure("Causal graph", dag)
                .table(None, Table::estimates(&comparison)),
        )
        .build()
        .unwrap();

    assert_eq!(report.figure_count(), 3);
    let html = report.to_html();
    assert!(html.contains("Reversal"));
    assert!(html.contains("Fixed Effects Model"));
    assert!(html.contains("Marin County"));
    assert_eq!(html.matches("<svg").count(), 3);

    let dir = std::env::temp_dir().join(format!("gini-report-test-{}", std::process::id()));
    let path = dir.join("nested").join("report.html");
    report.write_html(&path).unwrap();
    assert!(path.exists());

    let csv_path = dir.join("estimates.csv");
    comparison.export_to_file(&csv_path, ExportFormat::Csv).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    assert_eq!(csv.lines().count(), 1 + 6);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_simpson_export() {
    let report = SimpsonAnalysis::new(3).analyze(&tracts()).unwrap();
    let csv = report.export_to_string(ExportFormat::Csv).unwrap();
    assert!(csv.starts_with("county,n_tracts,intercept,slope,std_error"));
    assert_eq!(csv.lines().count(), 4);

    let json = report.export_to_string(ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["reversal"], true);
    assert_eq!(value["county_slopes"].as_array().unwrap().len(), 3);
}
