//! Report generation.
//!
//! A [`Report`] is an ordered list of [`Section`]s, each holding text,
//! figures, tables and preformatted blocks. It renders to one self-contained
//! HTML page (figures are inline SVG) or serialises to JSON.

use crate::svg::escape;
use crate::table::Table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Report has nothing to render.
    #[error("Report '{0}' has no sections")]
    Empty(String),
}

/// One piece of section content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    /// Paragraph of plain text.
    Paragraph {
        /// Text, escaped on render.
        text: String,
    },
    /// Inline SVG figure with a caption.
    Figure {
        /// Caption text.
        caption: String,
        /// Complete `<svg>` element.
        svg: String,
    },
    /// Table with an optional caption.
    Table {
        /// Caption text.
        caption: Option<String>,
        /// Table contents.
        table: Table,
    },
    /// Monospaced text such as a regression summary.
    Preformatted {
        /// Text, escaped on render.
        text: String,
    },
}

impl Block {
    fn to_html(&self) -> String {
        match self {
            Self::Paragraph { text } => format!("<p>{}</p>\n", escape(text)),
            Self::Figure { caption, svg } => format!(
                "<figure>\n{}\n<figcaption>{}</figcaption>\n</figure>\n",
                svg,
                escape(caption)
            ),
            Self::Table { caption, table } => {
                let caption = caption
                    .as_deref()
                    .map(|c| format!("<p class=\"caption\">{}</p>\n", escape(c)))
                    .unwrap_or_default();
                format!("{}{}", caption, table.to_html())
            }
            Self::Preformatted { text } => format!("<pre>{}</pre>\n", escape(text)),
        }
    }

    fn to_markdown(&self) -> String {
        match self {
            Self::Paragraph { text } => format!("{}\n\n", text),
            Self::Figure { caption, .. } => format!("*Figure: {}*\n\n", caption),
            Self::Table { caption, table } => {
                let caption = caption.as_deref().map(|c| format!("**{}**\n\n", c)).unwrap_or_default();
                format!("{}{}\n", caption, table.to_markdown())
            }
            Self::Preformatted { text } => format!("```text\n{}\n```\n\n", text.trim_end()),
        }
    }
}

/// A titled group of blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section heading.
    pub heading: String,
    /// Contents in order.
    pub blocks: Vec<Block>,
}

impl Section {
    /// Empty section.
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            blocks: Vec::new(),
        }
    }

    /// Append a paragraph.
    pub fn paragraph(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Paragraph { text: text.into() });
        self
    }

    /// Append an SVG figure.
    pub fn figure(mut self, caption: impl Into<String>, svg: String) -> Self {
        self.blocks.push(Block::Figure {
            caption: caption.into(),
            svg,
        });
        self
    }

    /// Append a table.
    pub fn table(mut self, caption: Option<&str>, table: Table) -> Self {
        self.blocks.push(Block::Table {
            caption: caption.map(str::to_string),
            table,
        });
        self
    }

    /// Append preformatted text.
    pub fn preformatted(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Preformatted { text: text.into() });
        self
    }

    fn anchor(&self) -> String {
        self.heading
            .chars()
            .filter_map(|c| {
                if c.is_ascii_alphanumeric() {
                    Some(c.to_ascii_lowercase())
                } else if c.is_whitespace() || c == '-' {
                    Some('-')
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A complete report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report title.
    pub title: String,

    /// Line under the title, e.g. the data source.
    pub subtitle: Option<String>,

    /// Report generation timestamp.
    pub timestamp: DateTime<Utc>,

    /// Report contents.
    pub sections: Vec<Section>,
}

const STYLE: &str = "body{font-family:sans-serif;max-width:980px;margin:2em auto;padding:0 1em;color:#222;line-height:1.45}\
h1{margin-bottom:0.2em}.subtitle{color:#666;margin-top:0}nav ul{columns:2}\
table{border-collapse:collapse;margin:0.5em 0 1.5em;font-size:0.9em}\
th,td{border-bottom:1px solid #ddd;padding:4px 10px;text-align:left}\
.num{text-align:right;font-variant-numeric:tabular-nums}\
pre{background:#f6f6f6;padding:1em;overflow-x:auto;font-size:0.85em}\
figure{margin:1em 0}figcaption,.caption{color:#555;font-size:0.9em}\
footer{color:#888;font-size:0.8em;margin-top:3em}";

impl Report {
    /// Create a new report.
    pub fn new(title: String, subtitle: Option<String>, sections: Vec<Section>) -> Self {
        Self {
            title,
            subtitle,
            timestamp: Utc::now(),
            sections,
        }
    }

    /// Number of figures across all sections.
    pub fn figure_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|s| &s.blocks)
            .filter(|b| matches!(b, Block::Figure { .. }))
            .count()
    }

    /// Render as a standalone HTML page.
    pub fn to_html(&self) -> String {
        let mut output = String::new();
        output.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
        output.push_str(&format!("<title>{}</title>\n", escape(&self.title)));
        output.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
        output.push_str(&format!("<h1>{}</h1>\n", escape(&self.title)));
        if let Some(subtitle) = &self.subtitle {
            output.push_str(&format!("<p class=\"subtitle\">{}</p>\n", escape(subtitle)));
        }

        output.push_str("<nav><ul>\n");
        for section in &self.sections {
            output.push_str(&format!(
                "<li><a href=\"#{}\">{}</a></li>\n",
                section.anchor(),
                escape(&section.heading)
            ));
        }
        output.push_str("</ul></nav>\n");

        for section in &self.sections {
            output.push_str(&format!(
                "<section id=\"{}\">\n<h2>{}</h2>\n",
                section.anchor(),
                escape(&section.heading)
            ));
            for block in &section.blocks {
                output.push_str(&block.to_html());
            }
            output.push_str("</section>\n");
        }

        output.push_str(&format!(
            "<footer>Generated {}</footer>\n</body>\n</html>\n",
            self.timestamp.format("%Y-%m-%d %H:%M UTC")
        ));
        output
    }

    /// Render as Markdown; figures are listed by caption only.
    pub fn to_markdown(&self) -> String {
        let mut output = format!("# {}\n\n", self.title);
        if let Some(subtitle) = &self.subtitle {
            output.push_str(&format!("_{}_\n\n", subtitle));
        }
        for section in &self.sections {
            output.push_str(&format!("## {}\n\n", section.heading));
            for block in &section.blocks {
                output.push_str(&block.to_markdown());
            }
        }
        output
    }

    /// Convert report to JSON string.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the HTML page, creating parent directories as needed.
    pub fn write_html(&self, path: &Path) -> Result<(), ReportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let html = self.to_html();
        fs::write(path, &html)?;
        debug!(path = %path.display(), bytes = html.len(), "wrote HTML report");
        Ok(())
    }
}

/// Builder for creating reports.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    title: Option<String>,
    subtitle: Option<String>,
    sections: Vec<Section>,
}

impl ReportBuilder {
    /// Create a new report builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the subtitle.
    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Append a section.
    pub fn section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Build the report.
    pub fn build(self) -> Result<Report, ReportError> {
        let title = self.title.unwrap_or_else(|| "Report".to_string());
        if self.sections.is_empty() {
            return Err(ReportError::Empty(title));
        }
        Ok(Report::new(title, self.subtitle, self.sections))
    }
}
