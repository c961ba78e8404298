//! Scatter plots with fitted regression lines.

use super::{Anchor, Canvas, LinearScale, MUTED, PlotArea, color, draw_axes};
use gini_data::TractSet;

const WIDTH: f64 = 760.0;
const HEIGHT: f64 = 480.0;
const MARGINS: (f64, f64, f64, f64) = (40.0, 180.0, 56.0, 64.0);

/// A named group of points.
#[derive(Debug, Clone)]
pub struct Series {
    /// Legend label.
    pub name: String,
    /// `(x, y)` data points.
    pub points: Vec<(f64, f64)>,
    /// Fill color.
    pub color: String,
    /// Point radius in pixels.
    pub radius: f64,
}

/// A straight line `y = intercept + slope · x` drawn across a range of x.
#[derive(Debug, Clone)]
pub struct FittedLine {
    /// Legend label.
    pub label: String,
    /// Intercept.
    pub intercept: f64,
    /// Slope.
    pub slope: f64,
    /// Data range the line spans.
    pub x_range: (f64, f64),
    /// Stroke color.
    pub color: String,
    /// Draw dashed.
    pub dashed: bool,
}

impl FittedLine {
    fn y(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Scatter plot builder.
#[derive(Debug, Clone)]
pub struct ScatterPlot {
    title: String,
    x_label: String,
    y_label: String,
    series: Vec<Series>,
    lines: Vec<FittedLine>,
}

impl ScatterPlot {
    /// Empty plot with a title and axis labels.
    pub fn new(title: impl Into<String>, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            series: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Gini Index against scaled median home value.
    ///
    /// Tracts in `highlight` counties get their own colored series; every
    /// other tract is drawn muted as "Other counties".
    pub fn tracts(tracts: &TractSet, highlight: &[String]) -> Self {
        let mut plot = Self::new(
            "Gini Index vs median home value",
            "Median home value ($100k)",
            "Gini Index",
        );

        let groups = tracts.by_county();
        let mut other = Vec::new();
        for (county, members) in &groups {
            if !highlight.iter().any(|h| h == county) {
                other.extend(members.iter().map(|t| (t.home_value_scaled(), t.gini)));
            }
        }
        if !other.is_empty() {
            let label = if highlight.is_empty() { "Tracts" } else { "Other counties" };
            plot = plot.series(label, other, MUTED, 2.0);
        }

        for (i, county) in highlight.iter().enumerate() {
            if let Some(members) = groups.get(county.as_str()) {
                let points = members.iter().map(|t| (t.home_value_scaled(), t.gini)).collect();
                plot = plot.series(county.clone(), points, color(i), 3.0);
            }
        }
        plot
    }

    /// Add a series of points.
    pub fn series(
        mut self,
        name: impl Into<String>,
        points: Vec<(f64, f64)>,
        color: &str,
        radius: f64,
    ) -> Self {
        self.series.push(Series {
            name: name.into(),
            points,
            color: color.to_string(),
            radius,
        });
        self
    }

    /// Add a fitted line spanning the x range of every series.
    pub fn line(mut self, label: impl Into<String>, intercept: f64, slope: f64, color: &str, dashed: bool) -> Self {
        let x_range = self.x_extent();
        self.lines.push(FittedLine {
            label: label.into(),
            intercept,
            slope,
            x_range,
            color: color.to_string(),
            dashed,
        });
        self
    }

    /// Add a fitted line over an explicit x range.
    pub fn line_over(mut self, line: FittedLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Series in drawing order.
    pub fn series_list(&self) -> &[Series] {
        &self.series
    }

    /// Number of points across all series.
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }

    fn x_extent(&self) -> (f64, f64) {
        let xs = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
        LinearScale::fit(xs, (0.0, 1.0), 0.0).domain()
    }

    /// Render to an SVG string.
    pub fn render(&self) -> String {
        let mut canvas = Canvas::new(WIDTH, HEIGHT);
        let area = PlotArea::inset(WIDTH, HEIGHT, MARGINS);

        let xs = self.series.iter().flat_map(|s| s.points.iter().map(|p| p.0));
        let x = LinearScale::fit(xs, area.x_range(), 0.04);
        let line_ys = self
            .lines
            .iter()
            .flat_map(|l| [l.y(l.x_range.0), l.y(l.x_range.1)]);
        let ys = self
            .series
            .iter()
            .flat_map(|s| s.points.iter().map(|p| p.1))
            .chain(line_ys);
        let y = LinearScale::fit(ys, area.y_range(), 0.04);

        canvas.text((WIDTH / 2.0 - MARGINS.1 / 2.0, 24.0), &self.title, Anchor::Middle, 15.0);
        draw_axes(&mut canvas, area, &x, &y, &self.x_label, &self.y_label);

        for series in &self.series {
            for &(px, py) in &series.points {
                canvas.circle((x.map(px), y.map(py)), series.radius, &series.color, 0.7);
            }
        }
        for line in &self.lines {
            let (x0, x1) = line.x_range;
            canvas.line(
                (x.map(x0), y.map(line.y(x0))),
                (x.map(x1), y.map(line.y(x1))),
                &line.color,
                2.0,
                line.dashed,
            );
        }

        self.draw_legend(&mut canvas, area);
        canvas.finish()
    }

    fn draw_legend(&self, canvas: &mut Canvas, area: PlotArea) {
        let left = area.right + 16.0;
        let mut top = area.top + 8.0;
        for series in &self.series {
            canvas.circle((left + 6.0, top - 4.0), 5.0, &series.color, 0.9);
            canvas.text((left + 16.0, top), &series.name, Anchor::Start, 11.0);
            top += 18.0;
        }
        for line in &self.lines {
            canvas.line((left, top - 4.0), (left + 12.0, top - 4.0), &line.color, 2.0, line.dashed);
            canvas.text((left + 16.0, top), &line.label, Anchor::Start, 11.0);
            top += 18.0;
        }
    }
}
