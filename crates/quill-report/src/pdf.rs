//! Paginated PDF rendering.
//!
//! Layout is computed by a pure pagination pass over the prose, so page
//! breaks are deterministic given the text and the page constants below.
//! The computed layout is then drawn with builtin Helvetica fonts.

use printpdf::{BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rgb};

use crate::error::ReportError;
use crate::render::{classify_line, LineKind};

// =============================================================================
// Page constants (A4 portrait, millimetres)
// =============================================================================

pub(crate) const PAGE_WIDTH_MM: f32 = 210.0;
pub(crate) const PAGE_HEIGHT_MM: f32 = 297.0;
pub(crate) const MARGIN_LEFT_MM: f32 = 15.0;
pub(crate) const MARGIN_RIGHT_MM: f32 = 15.0;
pub(crate) const MARGIN_TOP_MM: f32 = 18.0;
pub(crate) const MARGIN_BOTTOM_MM: f32 = 18.0;

const BODY_PT: f32 = 11.0;
const HEADING_PT: f32 = 16.0;
const SUBSECTION_PT: f32 = 13.0;
const TABLE_PT: f32 = 10.0;

const LINE_MM: f32 = 6.0;
const HEADING_MM: f32 = 10.0;
const SUBSECTION_MM: f32 = 8.0;
const TABLE_ROW_MM: f32 = 8.0;
const BLANK_MM: f32 = 3.0;
const BULLET_INDENT_MM: f32 = 6.0;
const CELL_PADDING_MM: f32 = 1.5;

/// Points to millimetres.
const PT_TO_MM: f32 = 0.3528;
/// Average Helvetica glyph advance as a fraction of the font size.
const CHAR_WIDTH_FACTOR: f32 = 0.5;

fn usable_width_mm() -> f32 {
    PAGE_WIDTH_MM - MARGIN_LEFT_MM - MARGIN_RIGHT_MM
}

fn max_chars(font_pt: f32, width_mm: f32) -> usize {
    (width_mm / (font_pt * CHAR_WIDTH_FACTOR * PT_TO_MM)).floor() as usize
}

// =============================================================================
// Decorative symbol substitution
// =============================================================================

/// Known decorative symbols and their bracketed text tokens. Symbols not in
/// this map pass through unchanged.
const SYMBOL_SUBSTITUTIONS: &[(char, &str)] = &[
    ('\u{1F4CA}', "[Graph]"),
    ('\u{1F4C8}', "[Chart]"),
    ('\u{1F4C9}', "[Chart]"),
    ('\u{2705}', "[Check]"),
    ('\u{2713}', "[Check]"),
    ('\u{26A0}', "[Warning]"),
    ('\u{1F50D}', "[Search]"),
    ('\u{1F4A1}', "[Idea]"),
    ('\u{FE0F}', ""),
];

pub(crate) fn substitute_symbols(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match SYMBOL_SUBSTITUTIONS.iter().find(|(sym, _)| *sym == ch) {
            Some((_, token)) => out.push_str(token),
            None => out.push(ch),
        }
    }
    out
}

// =============================================================================
// Layout model
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PdfElement {
    Heading(String),
    Subsection(String),
    Bullet {
        text: String,
        /// Wrapped continuation lines carry no bullet glyph.
        first: bool,
    },
    TableRow {
        cells: Vec<String>,
        header: bool,
        columns: usize,
    },
    TextLine(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Placed {
    pub element: PdfElement,
    pub y_mm: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PdfPage {
    pub elements: Vec<Placed>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PdfLayout {
    pub pages: Vec<PdfPage>,
}

impl PdfLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

struct LayoutCursor {
    pages: Vec<PdfPage>,
    y_mm: f32,
}

impl LayoutCursor {
    fn new() -> Self {
        Self {
            pages: vec![PdfPage::default()],
            y_mm: PAGE_HEIGHT_MM - MARGIN_TOP_MM,
        }
    }

    /// Place an element, breaking to a new page when the advance would push
    /// the cursor past the bottom threshold.
    fn place(&mut self, element: PdfElement, advance_mm: f32) {
        if self.y_mm - advance_mm < MARGIN_BOTTOM_MM {
            self.pages.push(PdfPage::default());
            self.y_mm = PAGE_HEIGHT_MM - MARGIN_TOP_MM;
        }
        self.y_mm -= advance_mm;
        let y_mm = self.y_mm;
        self.pages
            .last_mut()
            .expect("layout always has a page")
            .elements
            .push(Placed { element, y_mm });
    }

    fn gap(&mut self, advance_mm: f32) {
        self.y_mm -= advance_mm;
    }

    fn finish(self) -> PdfLayout {
        PdfLayout { pages: self.pages }
    }
}

/// Compute the full page layout for `text`. Pure: same text, same layout.
pub(crate) fn layout(text: &str) -> PdfLayout {
    let sanitized = substitute_symbols(text);
    let mut cursor = LayoutCursor::new();
    // Column count of the table block in progress, if any.
    let mut table_columns: Option<usize> = None;

    for line in sanitized.lines() {
        let kind = classify_line(line);
        if !matches!(kind, LineKind::TableRow(_)) {
            table_columns = None;
        }
        match kind {
            LineKind::Heading(heading) => {
                for segment in wrap_words(heading, max_chars(HEADING_PT, usable_width_mm())) {
                    cursor.place(PdfElement::Heading(segment), HEADING_MM);
                }
            }
            LineKind::Subsection(title) => {
                for segment in wrap_words(title, max_chars(SUBSECTION_PT, usable_width_mm())) {
                    cursor.place(PdfElement::Subsection(segment), SUBSECTION_MM);
                }
            }
            LineKind::Bullet(item) => {
                let width = usable_width_mm() - BULLET_INDENT_MM;
                for (i, segment) in wrap_words(item, max_chars(BODY_PT, width))
                    .into_iter()
                    .enumerate()
                {
                    cursor.place(
                        PdfElement::Bullet {
                            text: segment,
                            first: i == 0,
                        },
                        LINE_MM,
                    );
                }
            }
            LineKind::TableRow(cells) => {
                let header = table_columns.is_none();
                let columns = *table_columns.get_or_insert(cells.len());
                cursor.place(
                    PdfElement::TableRow {
                        cells: cells.iter().map(|c| c.to_string()).collect(),
                        header,
                        columns,
                    },
                    TABLE_ROW_MM,
                );
            }
            LineKind::Text(text_line) => {
                for segment in wrap_words(text_line, max_chars(BODY_PT, usable_width_mm())) {
                    cursor.place(PdfElement::TextLine(segment), LINE_MM);
                }
            }
            LineKind::Blank => {
                cursor.gap(BLANK_MM);
            }
        }
    }

    cursor.finish()
}

/// Greedy word wrap to a maximum character count. Words longer than the
/// limit are hard-split.
fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len == 0 {
            current = word.to_string();
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
            current_len = word_len;
        }
        while current_len > max_chars {
            let head: String = current.chars().take(max_chars).collect();
            let tail: String = current.chars().skip(max_chars).collect();
            lines.push(head);
            current_len = tail.chars().count();
            current = tail;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

// =============================================================================
// Drawing
// =============================================================================

/// Render `text` into encoded PDF bytes.
pub fn render_pdf(text: &str) -> Result<Vec<u8>, ReportError> {
    let computed = layout(text);

    let (doc, first_page, first_layer) = PdfDocument::new(
        "Report",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| ReportError::Render(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| ReportError::Render(e.to_string()))?;

    for (i, page) in computed.pages.iter().enumerate() {
        let layer = if i == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_idx, layer_idx) =
                doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            doc.get_page(page_idx).get_layer(layer_idx)
        };
        draw_page(&layer, page, &regular, &bold);
    }

    doc.save_to_bytes()
        .map_err(|e| ReportError::Render(e.to_string()))
}

fn draw_page(
    layer: &PdfLayerReference,
    page: &PdfPage,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    layer.set_outline_color(Color::Rgb(Rgb::new(0.25, 0.25, 0.25, None)));
    layer.set_outline_thickness(0.4);

    for placed in &page.elements {
        let y = placed.y_mm;
        match &placed.element {
            PdfElement::Heading(text) => {
                layer.use_text(text.clone(), HEADING_PT, Mm(MARGIN_LEFT_MM), Mm(y), bold);
            }
            PdfElement::Subsection(text) => {
                layer.use_text(text.clone(), SUBSECTION_PT, Mm(MARGIN_LEFT_MM), Mm(y), bold);
            }
            PdfElement::Bullet { text, first } => {
                let rendered = if *first {
                    format!("\u{2022} {text}")
                } else {
                    text.clone()
                };
                layer.use_text(
                    rendered,
                    BODY_PT,
                    Mm(MARGIN_LEFT_MM + BULLET_INDENT_MM),
                    Mm(y),
                    regular,
                );
            }
            PdfElement::TableRow {
                cells,
                header,
                columns,
            } => {
                draw_table_row(layer, cells, *header, *columns, y, regular, bold);
            }
            PdfElement::TextLine(text) => {
                layer.use_text(text.clone(), BODY_PT, Mm(MARGIN_LEFT_MM), Mm(y), regular);
            }
        }
    }
}

/// Fixed-width bordered cells; the header row is drawn bold.
fn draw_table_row(
    layer: &PdfLayerReference,
    cells: &[String],
    header: bool,
    columns: usize,
    y_mm: f32,
    regular: &IndirectFontRef,
    bold: &IndirectFontRef,
) {
    let columns = columns.max(1);
    let col_width = usable_width_mm() / columns as f32;
    let font = if header { bold } else { regular };
    let cell_bottom = y_mm - 2.5;

    for i in 0..columns {
        let x = MARGIN_LEFT_MM + i as f32 * col_width;
        layer.add_line(cell_outline(x, cell_bottom, col_width, TABLE_ROW_MM));
        if let Some(cell) = cells.get(i) {
            let limit = max_chars(TABLE_PT, col_width - 2.0 * CELL_PADDING_MM);
            let clipped: String = cell.chars().take(limit).collect();
            layer.use_text(clipped, TABLE_PT, Mm(x + CELL_PADDING_MM), Mm(y_mm), font);
        }
    }
}

fn cell_outline(x: f32, y: f32, width: f32, height: f32) -> Line {
    Line {
        points: vec![
            (Point::new(Mm(x), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y)), false),
            (Point::new(Mm(x + width), Mm(y + height)), false),
            (Point::new(Mm(x), Mm(y + height)), false),
        ],
        is_closed: true,
    }
}

// =============================================================================
// Tests
// =============================================================================
