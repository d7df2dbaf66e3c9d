//! DOCX rendering.
//!
//! The document flows the cleaned text as one body, one paragraph per line,
//! embedding the text losslessly. Full-line bold markers get emphasized
//! styling; the raw line text is always preserved.

use std::io::Cursor;

use docx_rs::{Docx, Paragraph, Run};

use crate::error::ReportError;

/// Font size for emphasized title lines, in half-points.
const TITLE_SIZE_HALF_POINTS: usize = 28;

/// Render `text` into encoded DOCX bytes.
pub fn render_docx(text: &str) -> Result<Vec<u8>, ReportError> {
    let mut docx = Docx::new();

    if text.is_empty() {
        docx = docx.add_paragraph(Paragraph::new());
    } else {
        for line in text.lines() {
            docx = docx.add_paragraph(paragraph_for(line));
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buffer)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    Ok(buffer.into_inner())
}

fn paragraph_for(line: &str) -> Paragraph {
    let run = Run::new().add_text(line);
    if is_title_line(line) {
        Paragraph::new().add_run(run.bold().size(TITLE_SIZE_HALF_POINTS))
    } else {
        Paragraph::new().add_run(run)
    }
}

/// A full-line `**bold**` marker or `### ` heading.
fn is_title_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with("### ") {
        return true;
    }
    trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with("**")
}
