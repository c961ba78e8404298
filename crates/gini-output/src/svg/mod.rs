//! Minimal SVG rendering.
//!
//! Figures are written as standalone `<svg>` strings so they can be embedded
//! directly in the HTML report or saved as `.svg` files.

pub mod dag;
pub mod intervals;
pub mod scatter;

pub use dag::DagPlot;
pub use intervals::IntervalPlot;
pub use scatter::{FittedLine, ScatterPlot, Series};

/// Categorical colors, cycled by series index.
pub const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

/// Color for muted background points.
pub const MUTED: &str = "#b0b0b0";

/// Palette color for series `i`.
pub fn color(i: usize) -> &'static str {
    PALETTE[i % PALETTE.len()]
}

/// Escape text for XML and HTML content or attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Map from data space to pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearScale {
    domain: (f64, f64),
    range: (f64, f64),
}

impl LinearScale {
    /// Create a scale. A zero-width domain is widened so `map` stays finite.
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        let (lo, hi) = domain;
        let domain = if (hi - lo).abs() < f64::EPSILON {
            let pad = if lo == 0.0 { 0.5 } else { lo.abs() * 0.05 };
            (lo - pad, hi + pad)
        } else {
            (lo.min(hi), lo.max(hi))
        };
        Self { domain, range }
    }

    /// Fit the domain to `values` padded by `pad` of the span on each side.
    pub fn fit(values: impl IntoIterator<Item = f64>, range: (f64, f64), pad: f64) -> Self {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo > hi {
            return Self::new((0.0, 1.0), range);
        }
        let margin = (hi - lo) * pad;
        Self::new((lo - margin, hi + margin), range)
    }

    /// Data domain.
    pub const fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Pixel range.
    pub const fn range(&self) -> (f64, f64) {
        self.range
    }

    /// Project a data value to pixels.
    pub fn map(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    /// Tick step rounded to 1, 2 or 5 times a power of ten.
    pub fn tick_step(&self, count: usize) -> f64 {
        let (d0, d1) = self.domain;
        let raw = (d1 - d0) / count.max(1) as f64;
        let magnitude = 10f64.powf(raw.log10().floor());
        let normalized = raw / magnitude;
        let nice = if normalized <= 1.0 {
            1.0
        } else if normalized <= 2.0 {
            2.0
        } else if normalized <= 5.0 {
            5.0
        } else {
            10.0
        };
        nice * magnitude
    }

    /// Roughly `count` round tick values inside the domain.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        let (d0, d1) = self.domain;
        let step = self.tick_step(count);
        let snap = 10f64.powi(decimals(step) as i32);
        let first = (d0 / step).ceil() as i64;
        let last = (d1 / step + 1e-9).floor() as i64;
        // Snap values like 0.35000000000000003
        (first..=last)
            .map(|k| (k as f64 * step * snap).round() / snap)
            .collect()
    }
}

fn decimals(step: f64) -> usize {
    if step >= 1.0 {
        0
    } else {
        (-step.log10().floor()) as usize
    }
}

/// Format a tick label with enough decimals for `step`.
pub fn format_tick(value: f64, step: f64) -> String {
    format!("{:.*}", decimals(step), value)
}

/// Text anchor for labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Left aligned.
    Start,
    /// Centered.
    Middle,
    /// Right aligned.
    End,
}

impl Anchor {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

/// Accumulates SVG elements.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: f64,
    height: f64,
    body: String,
    defs: String,
}

impl Canvas {
    /// Empty canvas of the given pixel size.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            body: String::new(),
            defs: String::new(),
        }
    }

    /// Canvas width.
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Canvas height.
    pub const fn height(&self) -> f64 {
        self.height
    }

    /// Add a `<defs>` entry (markers, gradients).
    pub fn def(&mut self, element: &str) {
        self.defs.push_str(element);
    }

    /// Rectangle.
    pub fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: &str, stroke: Option<&str>) {
        let stroke = stroke.map_or(String::new(), |s| format!(" stroke=\"{}\"", s));
        self.body.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"{}/>",
            x, y, w, h, fill, stroke
        ));
    }

    /// Straight line.
    pub fn line(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, width: f64, dashed: bool) {
        let dash = if dashed { " stroke-dasharray=\"6 4\"" } else { "" };
        self.body.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"{}\"{}/>",
            from.0, from.1, to.0, to.1, stroke, width, dash
        ));
    }

    /// Line ending in a marker defined with [`Canvas::def`].
    pub fn arrow(&mut self, from: (f64, f64), to: (f64, f64), stroke: &str, marker: &str) {
        self.body.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1.5\" marker-end=\"url(#{})\"/>",
            from.0, from.1, to.0, to.1, stroke, marker
        ));
    }

    /// Filled circle.
    pub fn circle(&mut self, center: (f64, f64), radius: f64, fill: &str, opacity: f64) {
        self.body.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{}\" fill=\"{}\" fill-opacity=\"{}\"/>",
            center.0, center.1, radius, fill, opacity
        ));
    }

    /// Ellipse with an outline.
    pub fn ellipse(&mut self, center: (f64, f64), radii: (f64, f64), fill: &str, stroke: &str) {
        self.body.push_str(&format!(
            "<ellipse cx=\"{:.2}\" cy=\"{:.2}\" rx=\"{:.2}\" ry=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.5\"/>",
            center.0, center.1, radii.0, radii.1, fill, stroke
        ));
    }

    /// Text label; the content is escaped.
    pub fn text(&mut self, at: (f64, f64), content: &str, anchor: Anchor, size: f64) {
        self.body.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"{}\" font-size=\"{}\">{}</text>",
            at.0,
            at.1,
            anchor.as_str(),
            size,
            escape(content)
        ));
    }

    /// Text rotated 90 degrees counter-clockwise around its anchor point.
    pub fn vertical_text(&mut self, at: (f64, f64), content: &str, size: f64) {
        self.body.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-size=\"{}\" transform=\"rotate(-90 {:.2} {:.2})\">{}</text>",
            at.0,
            at.1,
            size,
            at.0,
            at.1,
            escape(content)
        ));
    }

    /// Close the document.
    pub fn finish(self) -> String {
        let defs = if self.defs.is_empty() {
            String::new()
        } else {
            format!("<defs>{}</defs>", self.defs)
        };
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {w} {h}\" width=\"{w}\" height=\"{h}\" font-family=\"sans-serif\">{}{}</svg>",
            defs,
            self.body,
            w = self.width,
            h = self.height
        )
    }
}

/// Inner plotting rectangle of a figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    /// Left edge in pixels.
    pub left: f64,
    /// Top edge in pixels.
    pub top: f64,
    /// Right edge in pixels.
    pub right: f64,
    /// Bottom edge in pixels.
    pub bottom: f64,
}

impl PlotArea {
    /// Area inside a canvas with the given margins (top, right, bottom, left).
    pub fn inset(width: f64, height: f64, margins: (f64, f64, f64, f64)) -> Self {
        let (top, right, bottom, left) = margins;
        Self {
            left,
            top,
            right: width - right,
            bottom: height - bottom,
        }
    }

    /// Horizontal pixel range.
    pub const fn x_range(&self) -> (f64, f64) {
        (self.left, self.right)
    }

    /// Vertical pixel range, flipped so larger values sit higher.
    pub const fn y_range(&self) -> (f64, f64) {
        (self.bottom, self.top)
    }
}

/// Draw the frame, gridlines, tick labels and axis titles.
pub fn draw_axes(
    canvas: &mut Canvas,
    area: PlotArea,
    x: &LinearScale,
    y: &LinearScale,
    x_label: &str,
    y_label: &str,
) {
    let grid = "#e5e5e5";
    let axis = "#333333";

    let x_step = x.tick_step(6);
    for tick in x.ticks(6) {
        let px = x.map(tick);
        canvas.line((px, area.top), (px, area.bottom), grid, 1.0, false);
        canvas.text((px, area.bottom + 16.0), &format_tick(tick, x_step), Anchor::Middle, 11.0);
    }
    let y_step = y.tick_step(6);
    for tick in y.ticks(6) {
        let py = y.map(tick);
        canvas.line((area.left, py), (area.right, py), grid, 1.0, false);
        canvas.text((area.left - 6.0, py + 4.0), &format_tick(tick, y_step), Anchor::End, 11.0);
    }

    canvas.line((area.left, area.bottom), (area.right, area.bottom), axis, 1.0, false);
    canvas.line((area.left, area.top), (area.left, area.bottom), axis, 1.0, false);

    canvas.text(
        ((area.left + area.right) / 2.0, area.bottom + 36.0),
        x_label,
        Anchor::Middle,
        12.0,
    );
    canvas.vertical_text((area.left - 44.0, (area.top + area.bottom) / 2.0), y_label, 12.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale_maps_endpoints() {
        let scale = LinearScale::new((0.0, 10.0), (50.0, 450.0));
        assert_relative_eq!(scale.map(0.0), 50.0);
        assert_relative_eq!(scale.map(10.0), 450.0);
        assert_relative_eq!(scale.map(2.5), 150.0);

        // Inverted pixel range for y axes
        let y = LinearScale::new((0.0, 1.0), (400.0, 20.0));
        assert!(y.map(0.9) < y.map(0.1));
    }

    #[test]
    fn test_degenerate_domain_is_widened() {
        let scale = LinearScale::new((2.0, 2.0), (0.0, 100.0));
        assert!(scale.map(2.0).is_finite());
        assert_relative_eq!(scale.map(2.0), 50.0);
    }

    #[test]
    fn test_ticks_are_round() {
        let scale = LinearScale::new((0.31, 0.58), (0.0, 1.0));
        let ticks = scale.ticks(6);
        assert_eq!(ticks, vec![0.35, 0.40, 0.45, 0.50, 0.55]);
        assert_eq!(format_tick(0.35, scale.tick_step(6)), "0.35");
        assert_eq!(format_tick(0.4, scale.tick_step(6)), "0.40");
    }

    #[test]
    fn test_fit_pads_domain() {
        let scale = LinearScale::fit([1.0, 3.0, 2.0], (0.0, 1.0), 0.1);
        let (lo, hi) = scale.domain();
        assert_relative_eq!(lo, 0.8, epsilon = 1e-12);
        assert_relative_eq!(hi, 3.2, epsilon = 1e-12);
    }

    #[test]
    fn test_escape_and_canvas() {
        assert_eq!(escape("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        let mut canvas = Canvas::new(100.0, 50.0);
        canvas.text((10.0, 10.0), "<County>", Anchor::Start, 10.0);
        let svg = canvas.finish();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("&lt;County&gt;"));
        assert!(svg.ends_with("</svg>"));
    }
}
