//! Visualization extractor.
//!
//! Scans AI-generated text for embedded chart data and separates it from the
//! prose. Extraction is a pure, best-effort operation: malformed data
//! degrades to "no visualizations" and the text is returned unchanged; it
//! never errors.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use quill_core::{ChartKind, Series, VisualizationSpec};

/// The marker key that identifies an embedded visualization block.
const MARKER_KEY: &str = "\"visualizations\"";

static FENCED_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("Invalid fenced block regex")
});

/// Result of one extraction pass: the prose with all matched blocks removed
/// and the specs found, in order of appearance.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub cleaned: String,
    pub specs: Vec<VisualizationSpec>,
}

struct BlockMatch {
    start: usize,
    end: usize,
    specs: Vec<VisualizationSpec>,
}

/// Extract visualization specs embedded in `raw_text`.
///
/// Recognizes fenced code blocks and inline JSON objects carrying a
/// `visualizations` array. Every well-formed match is removed from the
/// returned text; blocks that fail to parse are left in place and
/// contribute nothing. A second pass over already-cleaned text finds no
/// further blocks.
pub fn extract(raw_text: &str) -> Extraction {
    let mut matches: Vec<BlockMatch> = Vec::new();
    let mut fenced_spans: Vec<(usize, usize)> = Vec::new();

    for caps in FENCED_BLOCK_RE.captures_iter(raw_text) {
        let whole = caps.get(0).expect("regex match has group 0");
        let inner = caps.get(1).expect("regex match has group 1");
        fenced_spans.push((whole.start(), whole.end()));
        if let Some(specs) = parse_visualization_block(inner.as_str()) {
            matches.push(BlockMatch {
                start: whole.start(),
                end: whole.end(),
                specs,
            });
        }
    }

    for (start, end) in find_top_level_objects(raw_text) {
        if overlaps_any(start, end, &fenced_spans) {
            continue;
        }
        let candidate = &raw_text[start..end];
        if !candidate.contains(MARKER_KEY) {
            continue;
        }
        if let Some(specs) = parse_visualization_block(candidate) {
            matches.push(BlockMatch { start, end, specs });
        }
    }

    if matches.is_empty() {
        return Extraction {
            cleaned: raw_text.to_string(),
            specs: Vec::new(),
        };
    }

    matches.sort_by_key(|m| m.start);

    let mut cleaned = String::with_capacity(raw_text.len());
    let mut specs = Vec::new();
    let mut cursor = 0;
    for m in matches {
        cleaned.push_str(&raw_text[cursor..m.start]);
        cursor = m.end;
        // Absorb one newline left dangling by the removed block.
        if cleaned.ends_with('\n') && raw_text[cursor..].starts_with('\n') {
            cursor += 1;
        }
        specs.extend(m.specs);
    }
    cleaned.push_str(&raw_text[cursor..]);

    Extraction { cleaned, specs }
}

// =============================================================================
// Block parsing and normalization
// =============================================================================

/// Row-oriented shape the AI embeds: chart rows keyed by category name, with
/// an optional explicit metric list.
#[derive(Debug, Deserialize)]
struct RawVisualization {
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    chart: ChartKind,
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    metrics: Option<Vec<String>>,
}

/// Parse one candidate block. Returns `None` unless the block is
/// well-formed JSON carrying a `visualizations` array.
fn parse_visualization_block(candidate: &str) -> Option<Vec<VisualizationSpec>> {
    let value: Value = serde_json::from_str(candidate).ok()?;
    let entries = value.get("visualizations")?.as_array()?;
    // Entries that fail to normalize are skipped; well-formed siblings
    // still extract.
    Some(
        entries
            .iter()
            .filter_map(normalize_visualization)
            .collect(),
    )
}

/// Pivot one row-oriented visualization object into categories and named
/// series.
fn normalize_visualization(entry: &Value) -> Option<VisualizationSpec> {
    let raw: RawVisualization = serde_json::from_value(entry.clone()).ok()?;

    let categories: Vec<String> = raw.data.iter().map(category_label).collect();

    let metric_names = match raw.metrics {
        Some(names) if !names.is_empty() => names,
        _ => infer_metrics(&raw.data),
    };

    let series = metric_names
        .into_iter()
        .map(|name| {
            let values = raw
                .data
                .iter()
                .map(|row| row.get(&name).and_then(Value::as_f64).unwrap_or(0.0))
                .collect();
            Series { name, values }
        })
        .collect();

    Some(VisualizationSpec {
        title: raw.title,
        chart_kind: raw.chart,
        series,
        categories,
    })
}

fn category_label(row: &Value) -> String {
    match row.get("name") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Metric names inferred from the numeric keys of the first row, in
/// deterministic (sorted) order.
fn infer_metrics(rows: &[Value]) -> Vec<String> {
    let Some(first) = rows.first().and_then(Value::as_object) else {
        return Vec::new();
    };
    first
        .iter()
        .filter(|(key, value)| key.as_str() != "name" && value.is_number())
        .map(|(key, _)| key.clone())
        .collect()
}

// =============================================================================
// Inline object scanning
// =============================================================================

/// Locate balanced top-level `{...}` spans, skipping brace characters inside
/// JSON strings. Braces that never close swallow the rest of the text and
/// produce no span.
fn find_top_level_objects(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' if depth > 0 => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        spans.push((start, i + 1));
                    }
                }
            }
            _ => {}
        }
    }
    spans
}

fn overlaps_any(start: usize, end: usize, spans: &[(usize, usize)]) -> bool {
    spans.iter().any(|&(s, e)| start < e && end > s)
}

// =============================================================================
// Tests
// =============================================================================
