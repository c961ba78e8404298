//! Dot-and-whisker comparison of county estimates.

use super::{Anchor, Canvas, LinearScale, PlotArea, color, format_tick};
use gini_models::{EstimateComparison, EstimationMethod};

const WIDTH: f64 = 760.0;
const ROW_HEIGHT: f64 = 26.0;
const TOP: f64 = 56.0;
const BOTTOM: f64 = 48.0;
const LEFT: f64 = 170.0;
const RIGHT: f64 = 30.0;

/// One row per county, one colored interval per estimation method.
#[derive(Debug, Clone)]
pub struct IntervalPlot<'a> {
    title: String,
    comparison: &'a EstimateComparison,
    counties: Vec<String>,
    reference: Option<(String, f64)>,
}

impl<'a> IntervalPlot<'a> {
    /// Plot every county, smallest first.
    pub fn new(title: impl Into<String>, comparison: &'a EstimateComparison) -> Self {
        Self {
            title: title.into(),
            counties: comparison.counties_by_size(),
            comparison,
            reference: None,
        }
    }

    /// Restrict to the given counties, in the given order.
    pub fn counties(mut self, counties: Vec<String>) -> Self {
        self.counties = counties;
        self
    }

    /// Draw a dashed vertical reference line, e.g. the grand mean.
    pub fn reference(mut self, label: impl Into<String>, value: f64) -> Self {
        self.reference = Some((label.into(), value));
        self
    }

    /// Render to an SVG string.
    pub fn render(&self) -> String {
        let methods = self.comparison.methods();
        let height = TOP + BOTTOM + ROW_HEIGHT * self.counties.len().max(1) as f64;
        let mut canvas = Canvas::new(WIDTH, height);
        let area = PlotArea {
            left: LEFT,
            top: TOP,
            right: WIDTH - RIGHT,
            bottom: height - BOTTOM,
        };

        let bounds = self
            .counties
            .iter()
            .flat_map(|c| self.comparison.for_county(c))
            .flat_map(|e| [e.lower, e.upper])
            .chain(self.reference.as_ref().map(|r| r.1));
        let x = LinearScale::fit(bounds, area.x_range(), 0.03);

        canvas.text((WIDTH / 2.0, 22.0), &self.title, Anchor::Middle, 15.0);
        self.draw_legend(&mut canvas, &methods);

        let step = x.tick_step(6);
        for tick in x.ticks(6) {
            let px = x.map(tick);
            canvas.line((px, area.top), (px, area.bottom), "#e5e5e5", 1.0, false);
            canvas.text((px, area.bottom + 16.0), &format_tick(tick, step), Anchor::Middle, 11.0);
        }
        canvas.line((area.left, area.bottom), (area.right, area.bottom), "#333333", 1.0, false);
        canvas.text(
            ((area.left + area.right) / 2.0, area.bottom + 36.0),
            "Gini Index",
            Anchor::Middle,
            12.0,
        );

        let spacing = ROW_HEIGHT / (methods.len() + 1) as f64;
        for (row, county) in self.counties.iter().enumerate() {
            let row_top = area.top + row as f64 * ROW_HEIGHT;
            canvas.text((area.left - 8.0, row_top + ROW_HEIGHT / 2.0 + 4.0), county, Anchor::End, 11.0);

            for (k, method) in methods.iter().enumerate() {
                let Some(estimate) = self.comparison.get(county, *method) else {
                    continue;
                };
                let py = row_top + spacing * (k + 1) as f64;
                let fill = method_color(*method);
                canvas.line((x.map(estimate.lower), py), (x.map(estimate.upper), py), fill, 1.5, false);
                canvas.circle((x.map(estimate.estimate), py), 3.0, fill, 1.0);
            }
        }

        if let Some((label, value)) = &self.reference {
            let px = x.map(*value);
            canvas.line((px, area.top), (px, area.bottom), "#555555", 1.0, true);
            canvas.text((px + 4.0, area.top - 4.0), label, Anchor::Start, 10.0);
        }

        canvas.finish()
    }

    fn draw_legend(&self, canvas: &mut Canvas, methods: &[EstimationMethod]) {
        let mut left = LEFT;
        for method in methods {
            canvas.circle((left + 5.0, 36.0), 4.0, method_color(*method), 1.0);
            canvas.text((left + 13.0, 40.0), method.label(), Anchor::Start, 11.0);
            left += 170.0;
        }
    }
}

/// Fixed color per method so figures agree with each other.
pub fn method_color(method: EstimationMethod) -> &'static str {
    match method {
        EstimationMethod::CountyAverage => color(0),
        EstimationMethod::FixedEffects => color(1),
        EstimationMethod::Multilevel => color(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gini_models::CountyEstimate;

    fn comparison() -> EstimateComparison {
        EstimateComparison::new([
            vec![
                CountyEstimate::new("Alpine County", EstimationMethod::CountyAverage, 0.48, 0.30, 0.66, 2),
                CountyEstimate::new("Alameda County", EstimationMethod::CountyAverage, 0.42, 0.41, 0.43, 300),
            ],
            vec![
                CountyEstimate::new("Alpine County", EstimationMethod::Multilevel, 0.45, 0.41, 0.49, 2),
                CountyEstimate::new("Alameda County", EstimationMethod::Multilevel, 0.42, 0.41, 0.43, 300),
            ],
        ])
        .unwrap()
    }

    #[test]
    fn test_render_rows_and_legend() {
        let comparison = comparison();
        let svg = IntervalPlot::new("County estimates", &comparison)
            .reference("Grand mean", 0.43)
            .render();
        // Two legend dots plus four estimates
        assert_eq!(svg.matches("<circle").count(), 6);
        assert!(svg.contains("Alpine County"));
        assert!(svg.contains("Multilevel Model"));
        assert!(!svg.contains("Fixed Effects Model"));
        assert!(svg.contains("Grand mean"));
    }

    #[test]
    fn test_county_subset() {
        let comparison = comparison();
        let svg = IntervalPlot::new("Subset", &comparison)
            .counties(vec!["Alameda County".to_string()])
            .render();
        assert!(!svg.contains("Alpine County"));
        assert_eq!(svg.matches("<circle").count(), 4);
    }
}
