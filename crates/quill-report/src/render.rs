//! Multi-format report renderer.
//!
//! Dispatches on the requested [`ReportFormat`] and packages the prose into
//! a transportable artifact. Rendering is a pure transformation with no
//! network or storage side effects. No format ever fails the call: the
//! catch-all arm is the Markdown behavior, and encoder failures degrade to
//! an error envelope rather than a panic.

use tracing::error;

use quill_core::{ReportFormat, ReportResult, VisualizationSpec};

use crate::docx::render_docx;
use crate::pdf::render_pdf;

/// Message surfaced when a binary document encoder fails.
pub const ENCODING_FAILED_MESSAGE: &str = "The report could not be encoded. Please try again.";

/// Render `cleaned_text` into the requested format.
///
/// Markdown passes the text through verbatim; HTML wraps it in a fixed
/// document template; PDF and DOCX produce encoded document bytes.
/// Visualizations pass through unchanged for downstream display.
pub fn render(
    cleaned_text: &str,
    format: ReportFormat,
    visualizations: Vec<VisualizationSpec>,
) -> ReportResult {
    match format {
        ReportFormat::Pdf => match render_pdf(cleaned_text) {
            Ok(bytes) => ReportResult::binary(ReportFormat::Pdf, bytes, visualizations),
            Err(err) => {
                error!("PDF encoding failed: {err}");
                ReportResult::error(ENCODING_FAILED_MESSAGE)
            }
        },
        ReportFormat::Docx => match render_docx(cleaned_text) {
            Ok(bytes) => ReportResult::binary(ReportFormat::Docx, bytes, visualizations),
            Err(err) => {
                error!("DOCX encoding failed: {err}");
                ReportResult::error(ENCODING_FAILED_MESSAGE)
            }
        },
        ReportFormat::Html => {
            ReportResult::text(ReportFormat::Html, render_html(cleaned_text), visualizations)
        }
        _ => ReportResult::text(ReportFormat::Markdown, cleaned_text, visualizations),
    }
}

// =============================================================================
// Line classification (shared by the HTML and PDF renderers)
// =============================================================================

/// One classified line of report prose.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LineKind<'a> {
    /// `### ` section heading.
    Heading(&'a str),
    /// Full-line `**bold**` subsection title.
    Subsection(&'a str),
    /// `* ` bulleted item.
    Bullet(&'a str),
    /// Pipe-delimited table row, cells trimmed.
    TableRow(Vec<&'a str>),
    /// Plain prose.
    Text(&'a str),
    Blank,
}

pub(crate) fn classify_line(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if let Some(rest) = trimmed.strip_prefix("### ") {
        return LineKind::Heading(rest.trim());
    }
    if let Some(inner) = trimmed
        .strip_prefix("**")
        .and_then(|s| s.strip_suffix("**"))
    {
        if !inner.is_empty() && !inner.contains("**") {
            return LineKind::Subsection(inner.trim());
        }
    }
    if let Some(rest) = trimmed.strip_prefix("* ") {
        return LineKind::Bullet(rest.trim());
    }
    if trimmed.contains('|') {
        let cells = split_table_cells(trimmed);
        if cells.len() >= 2 {
            if is_separator_row(&cells) {
                return LineKind::Blank;
            }
            return LineKind::TableRow(cells);
        }
    }
    LineKind::Text(trimmed)
}

/// Split a pipe-delimited line into trimmed cells, dropping the empty edge
/// cells produced by leading/trailing pipes.
fn split_table_cells(line: &str) -> Vec<&str> {
    let mut cells: Vec<&str> = line.split('|').map(str::trim).collect();
    if cells.first() == Some(&"") {
        cells.remove(0);
    }
    if cells.last() == Some(&"") {
        cells.pop();
    }
    cells
}

/// Markdown header separator rows (`|---|---|`) carry no content.
fn is_separator_row(cells: &[&str]) -> bool {
    cells
        .iter()
        .all(|c| !c.is_empty() && c.chars().all(|ch| ch == '-' || ch == ':'))
}

// =============================================================================
// HTML rendering
// =============================================================================

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap the prose in the fixed document template, converting the same line
/// structures the PDF renderer recognizes into markup.
pub(crate) fn render_html(text: &str) -> String {
    let mut body = String::new();
    let mut in_list = false;
    let mut in_table = false;
    let mut table_header_done = false;

    fn close_blocks(body: &mut String, in_list: &mut bool, in_table: &mut bool) {
        if *in_list {
            body.push_str("</ul>\n");
            *in_list = false;
        }
        if *in_table {
            body.push_str("</table>\n");
            *in_table = false;
        }
    }

    for line in text.lines() {
        match classify_line(line) {
            LineKind::Heading(heading) => {
                close_blocks(&mut body, &mut in_list, &mut in_table);
                table_header_done = false;
                body.push_str(&format!("<h3>{}</h3>\n", escape_html(heading)));
            }
            LineKind::Subsection(title) => {
                close_blocks(&mut body, &mut in_list, &mut in_table);
                table_header_done = false;
                body.push_str(&format!("<h4>{}</h4>\n", escape_html(title)));
            }
            LineKind::Bullet(item) => {
                if in_table {
                    body.push_str("</table>\n");
                    in_table = false;
                }
                if !in_list {
                    body.push_str("<ul>\n");
                    in_list = true;
                }
                body.push_str(&format!("<li>{}</li>\n", escape_html(item)));
            }
            LineKind::TableRow(cells) => {
                if in_list {
                    body.push_str("</ul>\n");
                    in_list = false;
                }
                if !in_table {
                    body.push_str("<table>\n");
                    in_table = true;
                    table_header_done = false;
                }
                let tag = if table_header_done { "td" } else { "th" };
                body.push_str("<tr>");
                for cell in cells {
                    body.push_str(&format!("<{tag}>{}</{tag}>", escape_html(cell)));
                }
                body.push_str("</tr>\n");
                table_header_done = true;
            }
            LineKind::Text(text_line) => {
                close_blocks(&mut body, &mut in_list, &mut in_table);
                table_header_done = false;
                body.push_str(&format!("<p>{}</p>\n", escape_html(text_line)));
            }
            LineKind::Blank => {
                close_blocks(&mut body, &mut in_list, &mut in_table);
                table_header_done = false;
            }
        }
    }
    if in_list {
        body.push_str("</ul>\n");
    }
    if in_table {
        body.push_str("</table>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Report</title>\n<style>\n\
         body {{ font-family: sans-serif; margin: 2rem; }}\n\
         table {{ border-collapse: collapse; margin: 1rem 0; }}\n\
         th, td {{ border: 1px solid #444; padding: 0.4rem 0.8rem; text-align: left; }}\n\
         th {{ font-weight: bold; background: #f0f0f0; }}\n\
         </style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

// =============================================================================
// Tests
// =============================================================================
