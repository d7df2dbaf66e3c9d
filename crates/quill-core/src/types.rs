use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Output format of a report turn.
///
/// The wire names match what the conversational UI exchanges: a turn with
/// `NONE` is a bare user query still awaiting its answer, `PENDING` is the
/// transient placeholder shown while generation is in flight, and `ERROR`
/// carries a human-readable failure message instead of an answer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFormat {
    None,
    Pending,
    Pdf,
    Docx,
    #[default]
    Markdown,
    Html,
    Error,
}

impl ReportFormat {
    /// Resolve a caller-supplied format name.
    ///
    /// Matching is case-insensitive. Unrecognized names resolve to
    /// `Markdown` so an unknown format can never fail a request.
    pub fn from_request(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "PDF" => ReportFormat::Pdf,
            "DOCX" => ReportFormat::Docx,
            "HTML" => ReportFormat::Html,
            "MARKDOWN" | "MD" => ReportFormat::Markdown,
            _ => ReportFormat::Markdown,
        }
    }

    /// MIME type used when the rendered artifact crosses an HTTP boundary.
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "application/pdf",
            ReportFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            ReportFormat::Html => "text/html",
            ReportFormat::Markdown => "text/markdown",
            _ => "application/json",
        }
    }

    /// Suggested download file name for the rendered artifact.
    pub fn file_name(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "report.pdf",
            ReportFormat::Docx => "report.docx",
            ReportFormat::Html => "report.html",
            ReportFormat::Markdown => "report.md",
            _ => "report",
        }
    }

    /// Whether the rendered artifact is a binary document.
    pub fn is_binary(&self) -> bool {
        matches!(self, ReportFormat::Pdf | ReportFormat::Docx)
    }
}

/// The kind of chart a visualization spec describes.
///
/// Unknown kinds deserialize to `Bar`, matching the chart component's
/// default branch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Area,
    Pie,
    Radar,
    #[default]
    Bar,
}

impl ChartKind {
    /// Resolve a chart kind name; anything unrecognized is `Bar`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "line" => ChartKind::Line,
            "area" => ChartKind::Area,
            "pie" => ChartKind::Pie,
            "radar" => ChartKind::Radar,
            _ => ChartKind::Bar,
        }
    }
}

impl<'de> Deserialize<'de> for ChartKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(ChartKind::from_name(&name))
    }
}

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Unique identifier for a conversation session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// Visualization data
// =============================================================================

/// One named numeric series of a chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

/// A structured description of one chart extracted from AI-generated text.
///
/// Invariant: every series holds one value per category, in category order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VisualizationSpec {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub chart_kind: ChartKind,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub categories: Vec<String>,
}

// =============================================================================
// Conversation entities
// =============================================================================

/// One user query plus its eventual answer (or error).
///
/// The atomic unit appended to a session. `binary_payload` crosses text
/// channels base64-encoded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
    pub format: ReportFormat,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub binary_payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visualizations: Vec<VisualizationSpec>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// A bare user query awaiting an answer.
    pub fn user_query(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer_text: None,
            format: ReportFormat::None,
            binary_payload: None,
            visualizations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// The transient in-flight placeholder for a query being generated.
    pub fn pending(query: impl Into<String>) -> Self {
        Self {
            format: ReportFormat::Pending,
            ..Self::user_query(query)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.format == ReportFormat::Pending
    }
}

/// A titled, ordered collection of conversation turns scoped to a user and
/// project.
///
/// Invariants: turns are strictly ordered by arrival; the title is derived
/// from the first query and immutable once set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub project_id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub turns: Vec<ConversationTurn>,
}

/// The session listing projection consumed by the presentation layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub turn_count: usize,
}

// =============================================================================
// Result envelope
// =============================================================================

/// The uniform result envelope returned by the report pipeline regardless of
/// requested format.
///
/// Invariant: exactly one of `text_content`, `binary_content`, and
/// `error_message` is populated, consistent with `format`. Constructed only
/// through [`ReportResult::text`], [`ReportResult::binary`], and
/// [`ReportResult::error`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportResult {
    pub format: ReportFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Option::is_none")]
    pub binary_content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visualizations: Vec<VisualizationSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ReportResult {
    /// A text artifact (Markdown or HTML).
    pub fn text(
        format: ReportFormat,
        content: impl Into<String>,
        visualizations: Vec<VisualizationSpec>,
    ) -> Self {
        Self {
            format,
            text_content: Some(content.into()),
            binary_content: None,
            visualizations,
            error_message: None,
        }
    }

    /// A binary document artifact (PDF or DOCX).
    pub fn binary(
        format: ReportFormat,
        bytes: Vec<u8>,
        visualizations: Vec<VisualizationSpec>,
    ) -> Self {
        Self {
            format,
            text_content: None,
            binary_content: Some(bytes),
            visualizations,
            error_message: None,
        }
    }

    /// A failed generation with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            format: ReportFormat::Error,
            text_content: None,
            binary_content: None,
            visualizations: Vec::new(),
            error_message: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.format == ReportFormat::Error
    }

    /// Convert this transient envelope into the turn the session records.
    pub fn into_turn(self, query: impl Into<String>) -> ConversationTurn {
        let answer_text = match self.format {
            ReportFormat::Error => self.error_message,
            _ => self.text_content,
        };
        ConversationTurn {
            query: query.into(),
            answer_text,
            format: self.format,
            binary_payload: self.binary_content,
            visualizations: self.visualizations,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Base64 transport encoding for binary payloads
// =============================================================================

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
