//! Plain tables rendered as HTML or Markdown.

use crate::svg::escape;
use gini_models::{EstimateComparison, EstimationMethod};
use serde::{Deserialize, Serialize};

/// Column alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Align {
    /// Left aligned (text).
    #[default]
    Left,
    /// Right aligned (numbers).
    Right,
}

/// A table of preformatted cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column headers.
    pub headers: Vec<String>,
    /// Per-column alignment.
    pub align: Vec<Align>,
    /// Rows of cells, each as long as `headers`.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Empty table; the first column is left aligned and the rest right aligned.
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let align = (0..headers.len())
            .map(|i| if i == 0 { Align::Left } else { Align::Right })
            .collect();
        Self {
            headers,
            align,
            rows: Vec::new(),
        }
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    /// Number of body rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Wide table of a comparison: one row per county, one estimate and
    /// interval column per method.
    pub fn estimates(comparison: &EstimateComparison) -> Self {
        let methods = comparison.methods();
        let mut headers = vec!["County".to_string(), "Tracts".to_string()];
        headers.extend(methods.iter().map(|m| m.label().to_string()));
        let mut table = Self::new(headers);

        let mut counties = comparison.counties_by_size();
        counties.sort();
        for county in counties {
            let estimates = comparison.for_county(&county);
            let n = estimates.iter().map(|e| e.n_tracts).max().unwrap_or(0);
            let mut row = vec![county.clone(), n.to_string()];
            row.extend(methods.iter().map(|m| {
                comparison
                    .get(&county, *m)
                    .map(|e| format!("{:.3} [{:.3}, {:.3}]", e.estimate, e.lower, e.upper))
                    .unwrap_or_default()
            }));
            table.push_row(row);
        }
        table
    }

    /// Mean interval width per method.
    pub fn interval_widths(comparison: &EstimateComparison) -> Self {
        let mut table = Self::new(["Method", "Counties", "Mean interval width"]);
        for method in EstimationMethod::all() {
            if let Some(width) = comparison.mean_interval_width(method) {
                table.push_row([
                    method.label().to_string(),
                    comparison.for_method(method).len().to_string(),
                    format!("{:.4}", width),
                ]);
            }
        }
        table
    }

    /// Render as an HTML `<table>` with escaped cells.
    pub fn to_html(&self) -> String {
        let mut output = String::from("<table>\n<thead><tr>");
        for (header, align) in self.headers.iter().zip(&self.align) {
            output.push_str(&format!("<th{}>{}</th>", align_attr(*align), escape(header)));
        }
        output.push_str("</tr></thead>\n<tbody>\n");
        for row in &self.rows {
            output.push_str("<tr>");
            for (cell, align) in row.iter().zip(&self.align) {
                output.push_str(&format!("<td{}>{}</td>", align_attr(*align), escape(cell)));
            }
            output.push_str("</tr>\n");
        }
        output.push_str("</tbody>\n</table>\n");
        output
    }

    /// Render as a Markdown pipe table.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&markdown_row(&self.headers));
        let separators: Vec<&str> = self
            .align
            .iter()
            .map(|a| match a {
                Align::Left => "---",
                Align::Right => "---:",
            })
            .collect();
        output.push_str(&format!("|{}|\n", separators.join("|")));
        for row in &self.rows {
            output.push_str(&markdown_row(row));
        }
        output
    }
}

fn markdown_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
    format!("| {} |\n", escaped.join(" | "))
}

fn align_attr(align: Align) -> &'static str {
    match align {
        Align::Left => "",
        Align::Right => " class=\"num\"",
    }
}
